//! Client-side access to bincoms devices
//!
//! This crate wraps a [`bincoms_session::Session`] in a [`DispatchGate`] so any
//! number of tasks can share one device, and adds the host-side logic timer
//! workflow on top of it.
//!
//! ```rust,no_run
//! use bincoms_client::{ConnectionBuilder, LogicTimer};
//! use std::time::Duration;
//!
//! # async fn run() -> bincoms_core::BincomsResult<()> {
//! let gate = ConnectionBuilder::new()
//!     .serial("/dev/ttyACM0", 1_000_000)
//!     .connect()
//!     .await?;
//! let timer = LogicTimer::new(gate);
//! timer.set_duration(Duration::from_secs(2));
//! let records = timer.get_data().await?;
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod collaborators;
pub mod gate;
pub mod logic_timer;

pub use bincoms_core::{BincomsError, BincomsResult, Value};
pub use builder::ConnectionBuilder;
pub use collaborators::{
    DriftEstimate, DriftFit, JsonRecordStore, LinearDriftFit, RecordStore, TimedRecord,
    estimate_drift,
};
pub use gate::DispatchGate;
pub use logic_timer::{DEFAULT_DURATION, Edge, LogicTimer, START, TICK_SECONDS, timed_records};
