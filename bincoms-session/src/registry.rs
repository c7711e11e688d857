//! Capability discovery

use crate::descriptor::{
    CapabilityTable, FunctionDescriptor, SELECT_ARGUMENTS, SELECT_NAME, SELECT_RETURN,
};
use crate::invoker::CommandInvoker;
use crate::statistics::SessionStatistics;
use bincoms_core::{BincomsError, BincomsResult, Value};
use bincoms_transport::ByteChannel;

/// Default number of handshake attempts
pub const DEFAULT_DISCOVERY_ATTEMPTS: usize = 2;

/// Builds a [`CapabilityTable`] by asking the device to describe itself
///
/// Function `0` answers the total count `N`; function `1` answers the name,
/// argument layout and return layout of every id in `2..N`.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    attempts: usize,
}

impl CapabilityRegistry {
    pub fn new(attempts: usize) -> Self {
        Self {
            attempts: attempts.max(1),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Run the handshake, retrying after draining the link
    ///
    /// # Errors
    /// `Handshake` wrapping the error of the last attempt. Connection errors
    /// are not retried.
    pub async fn discover<C>(
        &self,
        channel: &mut C,
        statistics: &mut SessionStatistics,
    ) -> BincomsResult<CapabilityTable>
    where
        C: ByteChannel + ?Sized,
    {
        let mut attempt = 1;
        loop {
            match self.discover_once(channel, statistics).await {
                Ok(table) => {
                    log::info!("Discovered {} function(s)", table.len());
                    return Ok(table);
                }
                Err(e @ BincomsError::Connection(_)) => {
                    return Err(BincomsError::Handshake {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
                Err(e) if attempt >= self.attempts => {
                    log::error!("Capability discovery failed: {}", e);
                    return Err(BincomsError::Handshake {
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    log::warn!(
                        "Capability discovery attempt {}/{} failed: {}",
                        attempt,
                        self.attempts,
                        e
                    );
                    channel.discard_input().await?;
                    statistics.increment_handshake_retries();
                    attempt += 1;
                }
            }
        }
    }

    async fn discover_once<C>(
        &self,
        channel: &mut C,
        statistics: &mut SessionStatistics,
    ) -> BincomsResult<CapabilityTable>
    where
        C: ByteChannel + ?Sized,
    {
        let mut dirty = false;
        let mut invoker = CommandInvoker::new(channel, statistics, &mut dirty);

        let count = match invoker
            .invoke(&FunctionDescriptor::command_count(), &[])
            .await?
        {
            Value::U8(count) => count,
            other => {
                return Err(BincomsError::InvalidData(format!(
                    "Function count answered as {}",
                    other
                )));
            }
        };

        let command_names = FunctionDescriptor::command_names();
        let mut table = CapabilityTable::new();
        for id in 2..count {
            let name = describe(&mut invoker, &command_names, id, SELECT_NAME).await?;
            let arguments = describe(&mut invoker, &command_names, id, SELECT_ARGUMENTS).await?;
            let returns = describe(&mut invoker, &command_names, id, SELECT_RETURN).await?;

            let descriptor = FunctionDescriptor::parse(id, &name, &arguments, &returns)?;
            log::debug!("Found {}", descriptor);
            table.insert(descriptor)?;
        }
        Ok(table)
    }
}

async fn describe<C>(
    invoker: &mut CommandInvoker<'_, C>,
    command_names: &FunctionDescriptor,
    id: u8,
    selector: u8,
) -> BincomsResult<String>
where
    C: ByteChannel + ?Sized,
{
    match invoker
        .invoke(command_names, &[Value::U8(id), Value::U8(selector)])
        .await?
    {
        Value::Text(text) => Ok(text),
        other => Err(BincomsError::InvalidData(format!(
            "Function description answered as {}",
            other
        ))),
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_DISCOVERY_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bincoms_transport::sim::{Reply, SimulatedDevice};
    use std::time::Duration;

    const TIMEOUT: Option<Duration> = Some(Duration::from_millis(200));

    #[tokio::test]
    async fn test_discover_logic_timer() {
        let (mut channel, _device) = SimulatedDevice::logic_timer().connect(TIMEOUT);
        let mut stats = SessionStatistics::new();

        let table = CapabilityRegistry::default()
            .discover(&mut channel, &mut stats)
            .await
            .unwrap();
        assert_eq!(table.names(), vec!["start", "enable_line"]);
        assert_eq!(table.lookup("start").unwrap().signature(), "start(f) -> H");
        assert_eq!(table.lookup("enable_line").unwrap().id, 3);
        // One count request plus three per function
        assert_eq!(stats.requests_sent, 7);
    }

    #[tokio::test]
    async fn test_discover_is_idempotent() {
        let (mut channel, _device) = SimulatedDevice::logic_timer().connect(TIMEOUT);
        let mut stats = SessionStatistics::new();
        let registry = CapabilityRegistry::default();

        let first = registry.discover(&mut channel, &mut stats).await.unwrap();
        let second = registry.discover(&mut channel, &mut stats).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_retry_after_garbled_answer() {
        let device = SimulatedDevice::logic_timer().garble_first(1);
        let log = device.request_log();
        let (mut channel, _device) = device.connect(TIMEOUT);
        let mut stats = SessionStatistics::new();

        let table = CapabilityRegistry::new(2)
            .discover(&mut channel, &mut stats)
            .await
            .unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(stats.handshake_retries, 1);
        assert_eq!(log.lock().unwrap().len(), 8);
    }

    #[tokio::test]
    async fn test_gives_up_after_attempts() {
        let (mut channel, _device) = SimulatedDevice::logic_timer()
            .garble_first(10)
            .connect(TIMEOUT);
        let mut stats = SessionStatistics::new();

        match CapabilityRegistry::new(2)
            .discover(&mut channel, &mut stats)
            .await
        {
            Err(BincomsError::Handshake { attempts, source }) => {
                assert_eq!(attempts, 2);
                assert!(source.is_link_corruption());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_broken_link_is_not_retried() {
        let (device, host) = tokio::io::duplex(64);
        let mut channel = bincoms_transport::IoChannel::new(host, TIMEOUT);
        drop(device);
        let mut stats = SessionStatistics::new();

        match CapabilityRegistry::new(3)
            .discover(&mut channel, &mut stats)
            .await
        {
            Err(BincomsError::Handshake { attempts, source }) => {
                assert_eq!(attempts, 1);
                assert!(matches!(*source, BincomsError::Connection(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(stats.handshake_retries, 0);
    }

    #[tokio::test]
    async fn test_duplicate_function_names() {
        let (mut channel, _device) = SimulatedDevice::new()
            .function("ping", "", "", |_| Reply::Data(Vec::new()))
            .function("ping", "B", "", |_| Reply::Data(Vec::new()))
            .connect(TIMEOUT);
        let mut stats = SessionStatistics::new();

        match CapabilityRegistry::new(1)
            .discover(&mut channel, &mut stats)
            .await
        {
            Err(BincomsError::Handshake { source, .. }) => {
                assert!(matches!(*source, BincomsError::DuplicateFunction(ref n) if n == "ping"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bare_device_has_no_user_functions() {
        let (mut channel, _device) = SimulatedDevice::new().connect(TIMEOUT);
        let mut stats = SessionStatistics::new();

        let table = CapabilityRegistry::default()
            .discover(&mut channel, &mut stats)
            .await
            .unwrap();
        assert!(table.is_empty());
    }
}
