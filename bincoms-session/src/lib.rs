//! Session layer for the bincoms protocol
//!
//! A [`Session`] owns one byte channel, runs the capability handshake when it
//! is opened and then invokes the functions the device advertised.
//!
//! # Layers
//!
//! - `frame`: request/response frame layout
//! - `codec`: reading response frames off a channel and decoding payloads
//! - `registry`: capability discovery
//! - `invoker`: one request/response exchange
//! - `stream`: event records streamed during a timed capture

pub mod codec;
pub mod descriptor;
pub mod frame;
pub mod invoker;
pub mod registry;
pub mod session;
pub mod statistics;
pub mod stream;

pub use bincoms_core::{BincomsError, BincomsResult};
pub use codec::FrameCodec;
pub use descriptor::{CapabilityTable, FunctionDescriptor};
pub use frame::{Frame, FrameHeader, HEADER_LENGTH, MARKER, MAX_PAYLOAD_LENGTH};
pub use invoker::CommandInvoker;
pub use registry::CapabilityRegistry;
pub use session::{Session, SessionConfig};
pub use statistics::SessionStatistics;
pub use stream::{EventRecord, SENTINEL_PIN_STATE};
