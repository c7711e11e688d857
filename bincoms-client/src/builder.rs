//! Connection builder for bincoms devices
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use bincoms_client::ConnectionBuilder;
//! use std::time::Duration;
//!
//! # async fn run() -> bincoms_core::BincomsResult<()> {
//! let gate = ConnectionBuilder::new()
//!     .serial("/dev/ttyACM0", 1_000_000)
//!     .response_timeout(Some(Duration::from_secs(1)))
//!     .connect()
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::gate::DispatchGate;
use bincoms_core::{BincomsError, BincomsResult};
use bincoms_session::{Session, SessionConfig};
use bincoms_transport::{ByteChannel, SerialSettings, SerialTransport};
use std::time::Duration;

/// Builder for a shared device connection
///
/// # Configuration Flow
/// 1. Create builder with `ConnectionBuilder::new()`
/// 2. Configure the serial port (or bring your own channel)
/// 3. Adjust the session settings
/// 4. Open with `connect()` or `connect_with()`
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    serial: Option<SerialSettings>,
    config: SessionConfig,
}

impl ConnectionBuilder {
    /// Create a new connection builder with default settings
    ///
    /// # Default Settings
    /// - Response timeout: 3 s
    /// - Discovery attempts: 2
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the serial port
    ///
    /// # Arguments
    /// * `port_name` - Serial port name (e.g., "/dev/ttyACM0" or "COM1")
    /// * `baud_rate` - Baud rate (e.g., 115200, 1000000)
    pub fn serial(mut self, port_name: &str, baud_rate: u32) -> Self {
        self.serial = Some(SerialSettings::new(port_name.to_string(), baud_rate));
        self
    }

    /// Configure the serial port from complete settings
    pub fn serial_settings(mut self, settings: SerialSettings) -> Self {
        self.serial = Some(settings);
        self
    }

    /// Read timeout for answers; None waits forever
    pub fn response_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Number of handshake attempts before giving up
    pub fn discovery_attempts(mut self, attempts: usize) -> Self {
        self.config.discovery_attempts = attempts;
        self
    }

    pub fn session_config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open the serial port and run the handshake
    ///
    /// # Errors
    /// Returns error if:
    /// - No serial port was configured
    /// - The port cannot be opened
    /// - Capability discovery fails
    pub async fn connect(self) -> BincomsResult<DispatchGate<SerialTransport>> {
        let settings = self.serial.clone().ok_or_else(|| {
            BincomsError::InvalidData("Serial port must be configured".to_string())
        })?;
        let mut transport = SerialTransport::new(settings);
        transport.open()?;
        self.connect_with(transport).await
    }

    /// Run the handshake over an already-open channel
    pub async fn connect_with<C: ByteChannel>(self, channel: C) -> BincomsResult<DispatchGate<C>> {
        let session = Session::open_with_config(channel, self.config).await?;
        Ok(DispatchGate::new(session))
    }
}
