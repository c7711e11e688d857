//! Serial port transport implementation

use crate::io::IoChannel;
use crate::stream::ByteChannel;
use async_trait::async_trait;
use bincoms_core::{BincomsError, BincomsResult};
use std::time::Duration;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};

/// Serial port transport layer settings
#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port_name: String,
    pub baud_rate: u32,
    pub data_bits: tokio_serial::DataBits,
    pub stop_bits: tokio_serial::StopBits,
    pub parity: tokio_serial::Parity,
    pub flow_control: tokio_serial::FlowControl,
    pub timeout: Option<Duration>,
}

impl SerialSettings {
    /// Create new serial settings with default parameters
    pub fn new(port_name: String, baud_rate: u32) -> Self {
        Self {
            port_name,
            baud_rate,
            data_bits: tokio_serial::DataBits::Eight,
            stop_bits: tokio_serial::StopBits::One,
            parity: tokio_serial::Parity::None,
            flow_control: tokio_serial::FlowControl::None,
            timeout: Some(Duration::from_secs(3)),
        }
    }

    /// Create serial settings with timeout
    pub fn with_timeout(port_name: String, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::new(port_name, baud_rate)
        }
    }
}

/// Serial port transport layer implementation
#[derive(Debug)]
pub struct SerialTransport {
    channel: Option<IoChannel<SerialStream>>,
    settings: SerialSettings,
}

impl SerialTransport {
    /// Create a new serial transport layer
    pub fn new(settings: SerialSettings) -> Self {
        Self {
            channel: None,
            settings,
        }
    }

    /// Create serial transport with port name and baud rate
    pub fn new_simple(port_name: String, baud_rate: u32) -> Self {
        Self::new(SerialSettings::new(port_name, baud_rate))
    }

    pub fn settings(&self) -> &SerialSettings {
        &self.settings
    }

    /// Open the serial port
    pub fn open(&mut self) -> BincomsResult<()> {
        if self.channel.is_some() {
            return Err(BincomsError::Connection(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }

        let stream = tokio_serial::new(&self.settings.port_name, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .stop_bits(self.settings.stop_bits)
            .parity(self.settings.parity)
            .flow_control(self.settings.flow_control)
            .open_native_async()
            .map_err(|e| {
                BincomsError::Connection(std::io::Error::other(format!(
                    "Failed to open serial port {}: {}",
                    self.settings.port_name, e
                )))
            })?;

        log::info!(
            "Opened serial port {} at {} baud",
            self.settings.port_name,
            self.settings.baud_rate
        );
        self.channel = Some(IoChannel::new(stream, self.settings.timeout));
        Ok(())
    }

    fn channel(&mut self) -> BincomsResult<&mut IoChannel<SerialStream>> {
        self.channel.as_mut().ok_or_else(|| {
            BincomsError::Connection(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "Serial stream not connected",
            ))
        })
    }
}

#[async_trait]
impl ByteChannel for SerialTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> BincomsResult<()> {
        self.settings.timeout = timeout;
        if let Some(channel) = self.channel.as_mut() {
            channel.set_timeout(timeout).await?;
        }
        Ok(())
    }

    fn timeout(&self) -> Option<Duration> {
        self.settings.timeout
    }

    async fn read(&mut self, buf: &mut [u8]) -> BincomsResult<usize> {
        self.channel()?.read(buf).await
    }

    async fn write(&mut self, buf: &[u8]) -> BincomsResult<usize> {
        self.channel()?.write(buf).await
    }

    async fn flush(&mut self) -> BincomsResult<()> {
        self.channel()?.flush().await
    }

    async fn discard_input(&mut self) -> BincomsResult<Vec<u8>> {
        let channel = self.channel()?;
        let discarded = channel.discard_input().await?;
        // Bytes still sitting in the driver's receive buffer
        channel
            .get_ref()
            .clear(ClearBuffer::Input)
            .map_err(|e| BincomsError::Connection(std::io::Error::other(e.to_string())))?;
        Ok(discarded)
    }

    fn is_closed(&self) -> bool {
        self.channel.as_ref().is_none_or(|c| c.is_closed())
    }

    async fn close(&mut self) -> BincomsResult<()> {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await?;
        }
        Ok(())
    }
}
