//! Transport layer for the bincoms protocol
//!
//! This crate provides the [`ByteChannel`] abstraction the protocol layers
//! are written against, an implementation over any tokio byte stream, and the
//! serial port transport used to reach real devices.

pub mod io;
pub mod serial;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod stream;

pub use bincoms_core::{BincomsError, BincomsResult};
pub use io::IoChannel;
pub use serial::{SerialSettings, SerialTransport};
pub use stream::ByteChannel;
