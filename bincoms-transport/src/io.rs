//! Byte channel over any tokio stream

use crate::stream::ByteChannel;
use async_trait::async_trait;
use bincoms_core::{BincomsError, BincomsResult};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Default wait used when draining pending input
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(20);

/// Upper bound on bytes dropped by a single discard
const MAX_DISCARD: usize = 64 * 1024;

/// Wrapper for the inner stream that implements Debug
struct DebugStream<S>(S);

impl<S> fmt::Debug for DebugStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream").finish()
    }
}

impl<S> Deref for DebugStream<S> {
    type Target = S;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> DerefMut for DebugStream<S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Channel over an already-connected async stream
///
/// Used for the serial port, for pipes in tests, and for any other byte
/// stream that speaks the device protocol.
#[derive(Debug)]
pub struct IoChannel<S> {
    stream: DebugStream<S>,
    timeout: Option<Duration>,
    drain_timeout: Duration,
    closed: bool,
}

impl<S> IoChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Wrap a connected stream
    pub fn new(stream: S, timeout: Option<Duration>) -> Self {
        Self {
            stream: DebugStream(stream),
            timeout,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
            closed: false,
        }
    }

    /// Set how long `discard_input` waits for more bytes before giving up
    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream.0
    }
}

#[async_trait]
impl<S> ByteChannel for IoChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> BincomsResult<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn read(&mut self, buf: &mut [u8]) -> BincomsResult<usize> {
        if self.closed {
            return Err(BincomsError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Channel is closed",
            )));
        }

        let result = if let Some(timeout) = self.timeout {
            tokio::time::timeout(timeout, self.stream.read(buf))
                .await
                .map_err(|_| BincomsError::Timeout)?
                .map_err(BincomsError::Connection)
        } else {
            self.stream.read(buf).await.map_err(BincomsError::Connection)
        };

        match result {
            Ok(0) if !buf.is_empty() => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(BincomsError::Connection(e)) => {
                self.closed = true;
                Err(BincomsError::Connection(e))
            }
            Err(e) => Err(e),
        }
    }

    async fn write(&mut self, buf: &[u8]) -> BincomsResult<usize> {
        if self.closed {
            return Err(BincomsError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Channel is closed",
            )));
        }

        if let Some(timeout) = self.timeout {
            tokio::time::timeout(timeout, self.stream.write(buf))
                .await
                .map_err(|_| BincomsError::Timeout)?
                .map_err(BincomsError::Connection)
        } else {
            self.stream.write(buf).await.map_err(BincomsError::Connection)
        }
    }

    async fn flush(&mut self) -> BincomsResult<()> {
        self.stream.flush().await.map_err(BincomsError::Connection)
    }

    async fn discard_input(&mut self) -> BincomsResult<Vec<u8>> {
        let mut discarded = Vec::new();
        if self.closed {
            return Ok(discarded);
        }

        let mut chunk = [0u8; 256];
        while discarded.len() < MAX_DISCARD {
            match tokio::time::timeout(self.drain_timeout, self.stream.read(&mut chunk)).await {
                Ok(Ok(0)) => {
                    self.closed = true;
                    break;
                }
                Ok(Ok(n)) => discarded.extend_from_slice(&chunk[..n]),
                Ok(Err(e)) => {
                    self.closed = true;
                    return Err(BincomsError::Connection(e));
                }
                Err(_) => break,
            }
        }

        if !discarded.is_empty() {
            log::warn!("Discarded {} unread byte(s): {:02X?}", discarded.len(), discarded);
        }
        Ok(discarded)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> BincomsResult<()> {
        if !self.closed {
            let _ = self.stream.shutdown().await;
        }
        self.closed = true;
        Ok(())
    }
}
