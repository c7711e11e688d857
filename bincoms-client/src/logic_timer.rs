//! Logic timer workflow
//!
//! The logic timer firmware timestamps edges on its input lines with a 2 MHz
//! counter. A capture is started with `start(duration)`; the device answers
//! and then streams `(counter, pin_state)` records until a sentinel.

use crate::collaborators::{RecordStore, TimedRecord};
use crate::gate::DispatchGate;
use bincoms_core::{BincomsResult, Value};
use bincoms_session::EventRecord;
use bincoms_transport::ByteChannel;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Seconds per device counter tick
pub const TICK_SECONDS: f64 = 0.5e-6;

/// Capture duration used until `set_duration` is called
pub const DEFAULT_DURATION: Duration = Duration::from_secs(1);

/// Device function that starts a capture
pub const START: &str = "start";

/// Extra read timeout on top of the capture duration
const STREAM_TIMEOUT_MARGIN: Duration = Duration::from_secs(1);

/// Edge selection for `enable_line`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    pub fn as_byte(self) -> u8 {
        match self {
            Edge::Rising => b'r',
            Edge::Falling => b'f',
            Edge::Both => b'b',
        }
    }
}

/// Host-side driver for the logic timer firmware
///
/// Clones share the gate and the configured duration.
pub struct LogicTimer<C: ByteChannel> {
    gate: DispatchGate<C>,
    duration: Arc<Mutex<Duration>>,
}

impl<C: ByteChannel> LogicTimer<C> {
    pub fn new(gate: DispatchGate<C>) -> Self {
        Self {
            gate,
            duration: Arc::new(Mutex::new(DEFAULT_DURATION)),
        }
    }

    pub fn gate(&self) -> &DispatchGate<C> {
        &self.gate
    }

    pub fn set_duration(&self, duration: Duration) {
        *self.duration.lock().unwrap_or_else(|p| p.into_inner()) = duration;
    }

    pub fn get_duration(&self) -> Duration {
        *self.duration.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Arm an input line for the next capture
    pub async fn enable_line(&self, line: u8, edge: Edge) -> BincomsResult<()> {
        self.gate
            .call("enable_line", &[Value::U8(line), Value::Char(edge.as_byte())])
            .await
            .map(|_| ())
    }

    /// Run one capture and return the recorded edges
    pub async fn get_data(&self) -> BincomsResult<Vec<EventRecord>> {
        let (_, records) = self.capture(self.get_duration()).await?;
        Ok(records)
    }

    /// Run `start(duration)` and return the device answer
    ///
    /// The records that follow are read up to the sentinel and dropped, so
    /// the link is clean for the next caller.
    pub async fn start(&self, duration: Duration) -> BincomsResult<Value> {
        let (ticks, records) = self.capture(duration).await?;
        if !records.is_empty() {
            log::debug!("Dropped {} record(s) of a bare start", records.len());
        }
        Ok(ticks)
    }

    /// Start a capture and read its records while holding the gate
    ///
    /// The read timeout is widened to cover the capture. It is restored here,
    /// or before the next request if this future is dropped midway.
    async fn capture(&self, duration: Duration) -> BincomsResult<(Value, Vec<EventRecord>)> {
        let mut session = self.gate.lock().await;

        let ticks = session
            .call(START, &[Value::F32(duration.as_secs_f32())])
            .await?;
        log::info!("Capture started for {:?}, device answered {}", duration, ticks);

        session
            .widen_timeout(Some(duration + STREAM_TIMEOUT_MARGIN))
            .await?;
        let records = session.collect_events().await;
        session.restore_timeout().await?;

        let records = records?;
        log::info!("Capture returned {} record(s)", records.len());
        Ok((ticks, records))
    }

    /// Run one capture and convert counters to seconds
    pub async fn get_timed_data(&self) -> BincomsResult<Vec<TimedRecord>> {
        Ok(timed_records(&self.get_data().await?))
    }

    /// Run one capture and persist it through `store`
    ///
    /// Returns the number of records written.
    pub async fn save_data<S>(&self, store: &S, path: &Path) -> BincomsResult<usize>
    where
        S: RecordStore + ?Sized,
    {
        let records = self.get_timed_data().await?;
        store.write(path, &records).await?;
        Ok(records.len())
    }
}

impl<C: ByteChannel> Clone for LogicTimer<C> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            duration: Arc::clone(&self.duration),
        }
    }
}

impl<C: ByteChannel> std::fmt::Debug for LogicTimer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicTimer")
            .field("duration", &self.get_duration())
            .finish()
    }
}

/// Convert raw records to seconds since the capture started
pub fn timed_records(records: &[EventRecord]) -> Vec<TimedRecord> {
    records
        .iter()
        .map(|r| TimedRecord {
            counter: r.counter,
            time: r.counter as f64 * TICK_SECONDS,
            pin_state: r.pin_state,
        })
        .collect()
}
