//! Byte channel trait for the transport layer

use async_trait::async_trait;
use bincoms_core::{BincomsError, BincomsResult};
use std::time::Duration;

/// Duplex byte stream to a device
///
/// A channel is owned by exactly one session. Reads are bounded by the
/// configured timeout; a read that cannot complete in time fails with
/// [`BincomsError::Timeout`].
#[async_trait]
pub trait ByteChannel: Send {
    /// Set the read timeout
    ///
    /// # Arguments
    ///
    /// * `timeout` - The timeout duration. None means infinite timeout.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> BincomsResult<()>;

    /// Current read timeout
    fn timeout(&self) -> Option<Duration>;

    /// Read available data into `buf`
    ///
    /// # Returns
    ///
    /// Number of bytes read, or 0 if EOF
    async fn read(&mut self, buf: &mut [u8]) -> BincomsResult<usize>;

    /// Read exact number of bytes from the channel
    ///
    /// # Returns
    ///
    /// Returns error if unable to read the exact number of bytes
    async fn read_exact(&mut self, mut buf: &mut [u8]) -> BincomsResult<()> {
        while !buf.is_empty() {
            let n = self.read(buf).await?;
            if n == 0 {
                return Err(BincomsError::Connection(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "Failed to read exact number of bytes",
                )));
            }
            buf = &mut buf[n..];
        }
        Ok(())
    }

    /// Write data to the channel
    ///
    /// # Returns
    ///
    /// Number of bytes written
    async fn write(&mut self, buf: &[u8]) -> BincomsResult<usize>;

    /// Write all data to the channel
    async fn write_all(&mut self, buf: &[u8]) -> BincomsResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(BincomsError::Connection(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "Failed to write all data",
                )));
            }
            written += n;
        }
        Ok(())
    }

    /// Push any buffered output to the device
    async fn flush(&mut self) -> BincomsResult<()>;

    /// Drop whatever input is pending and return it
    ///
    /// Used to resynchronize the link after a framing error.
    async fn discard_input(&mut self) -> BincomsResult<Vec<u8>>;

    /// Check if the channel is closed
    fn is_closed(&self) -> bool;

    /// Close the channel
    async fn close(&mut self) -> BincomsResult<()>;
}
