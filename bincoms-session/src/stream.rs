//! Event records streamed during a timed capture

use crate::session::Session;
use bincoms_core::{BincomsError, BincomsResult, FieldCode, ReturnLayout, Value};
use bincoms_transport::ByteChannel;

/// Pin state marking the end of a capture
pub const SENTINEL_PIN_STATE: u8 = 0xFF;

/// One edge seen by the device: tick counter and the state of all lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRecord {
    pub counter: u32,
    pub pin_state: u8,
}

impl EventRecord {
    /// Layout of a record frame (`IB`)
    pub fn layout() -> ReturnLayout {
        ReturnLayout::Fields(vec![FieldCode::U32, FieldCode::U8])
    }

    pub fn is_sentinel(&self) -> bool {
        self.pin_state == SENTINEL_PIN_STATE
    }

    /// State of input line `line` in this record
    pub fn line(&self, line: u8) -> bool {
        line < 8 && self.pin_state & (1 << line) != 0
    }
}

impl TryFrom<Value> for EventRecord {
    type Error = BincomsError;

    fn try_from(value: Value) -> BincomsResult<Self> {
        match value.as_tuple() {
            Some([Value::U32(counter), Value::U8(pin_state)]) => Ok(Self {
                counter: *counter,
                pin_state: *pin_state,
            }),
            _ => Err(BincomsError::InvalidData(format!(
                "Not an event record: {}",
                value
            ))),
        }
    }
}

impl<C: ByteChannel> Session<C> {
    /// Read event frames until the sentinel record
    ///
    /// The sentinel is not part of the result. Reads use the current channel
    /// timeout, so callers capturing for longer than the response timeout
    /// should raise it first. If a read fails the link stays marked dirty and
    /// is drained before the next request.
    pub async fn collect_events(&mut self) -> BincomsResult<Vec<EventRecord>> {
        let layout = EventRecord::layout();
        let mut records = Vec::new();
        loop {
            self.mark_dirty();
            let record = match self.receive(&layout).await.and_then(EventRecord::try_from) {
                Ok(record) => record,
                Err(e) => {
                    self.mark_dirty();
                    return Err(e);
                }
            };
            if record.is_sentinel() {
                log::debug!("Capture finished with {} record(s)", records.len());
                self.statistics_mut()
                    .add_records_received(records.len() as u64);
                return Ok(records);
            }
            records.push(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionConfig;
    use bincoms_transport::sim::SimulatedDevice;
    use std::time::Duration;

    #[test]
    fn test_line_state() {
        let record = EventRecord {
            counter: 10,
            pin_state: 0b10,
        };
        assert!(!record.line(0));
        assert!(record.line(1));
        assert!(!record.line(9));
        assert!(!record.is_sentinel());
    }

    #[tokio::test]
    async fn test_collect_until_sentinel() {
        let (channel, _device) = SimulatedDevice::logic_timer()
            .events(vec![(1, 1), (2, 1), (3, 0), (4, 0xFF)])
            .connect(None);
        let mut session = Session::open_with_config(
            channel,
            SessionConfig {
                response_timeout: Some(Duration::from_millis(200)),
                ..SessionConfig::default()
            },
        )
        .await
        .unwrap();

        session.call("start", &[Value::F32(0.1)]).await.unwrap();
        let records = session.collect_events().await.unwrap();
        assert_eq!(
            records,
            vec![
                EventRecord { counter: 1, pin_state: 1 },
                EventRecord { counter: 2, pin_state: 1 },
                EventRecord { counter: 3, pin_state: 0 },
            ]
        );
        assert!(!session.is_dirty());
        assert_eq!(session.statistics().records_received, 3);
    }

    #[tokio::test]
    async fn test_empty_capture() {
        let (channel, _device) = SimulatedDevice::logic_timer()
            .events(vec![(0, 0xFF)])
            .connect(Some(Duration::from_millis(200)));
        let mut session = Session::open(channel).await.unwrap();

        session.call("start", &[Value::F32(0.1)]).await.unwrap();
        assert!(session.collect_events().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_sentinel_leaves_link_dirty() {
        let (channel, _device) = SimulatedDevice::logic_timer()
            .events(vec![(5, 0x01)])
            .connect(None);
        let mut session = Session::open_with_config(
            channel,
            SessionConfig {
                response_timeout: Some(Duration::from_millis(100)),
                ..SessionConfig::default()
            },
        )
        .await
        .unwrap();

        session.call("start", &[Value::F32(0.1)]).await.unwrap();
        assert!(session.collect_events().await.is_err());
        assert!(session.is_dirty());
    }
}
