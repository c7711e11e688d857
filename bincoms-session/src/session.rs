//! Device session

use crate::descriptor::{CapabilityTable, FunctionDescriptor};
use crate::invoker::CommandInvoker;
use crate::registry::{CapabilityRegistry, DEFAULT_DISCOVERY_ATTEMPTS};
use crate::statistics::SessionStatistics;
use bincoms_core::{BincomsResult, ReturnLayout, Value};
use bincoms_transport::ByteChannel;
use std::sync::Arc;
use std::time::Duration;

/// Default read timeout applied to the channel when the session opens
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

/// Session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Read timeout applied to the channel. None means wait forever.
    pub response_timeout: Option<Duration>,
    /// Handshake attempts before giving up
    pub discovery_attempts: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            response_timeout: Some(DEFAULT_RESPONSE_TIMEOUT),
            discovery_attempts: DEFAULT_DISCOVERY_ATTEMPTS,
        }
    }
}

/// An open session with one device
///
/// Owns the channel exclusively. Holding `&mut Session` is what makes an
/// exchange atomic; sharing a session between tasks goes through a gate that
/// serializes access.
#[derive(Debug)]
pub struct Session<C: ByteChannel> {
    channel: C,
    capabilities: Arc<CapabilityTable>,
    statistics: SessionStatistics,
    dirty: bool,
    /// Timeout to put back before the next request
    pending_timeout: Option<Option<Duration>>,
    config: SessionConfig,
}

impl<C: ByteChannel> Session<C> {
    /// Open a session with the default configuration
    pub async fn open(channel: C) -> BincomsResult<Self> {
        Self::open_with_config(channel, SessionConfig::default()).await
    }

    /// Apply the configured timeout and run the capability handshake
    pub async fn open_with_config(mut channel: C, config: SessionConfig) -> BincomsResult<Self> {
        channel.set_timeout(config.response_timeout).await?;

        let mut statistics = SessionStatistics::new();
        let capabilities = CapabilityRegistry::new(config.discovery_attempts)
            .discover(&mut channel, &mut statistics)
            .await?;
        log::info!("Session opened: {}", capabilities.names().join(", "));

        Ok(Self {
            channel,
            capabilities: Arc::new(capabilities),
            statistics,
            dirty: false,
            pending_timeout: None,
            config,
        })
    }

    /// Repeat the handshake and replace the capability table
    pub async fn rediscover(&mut self) -> BincomsResult<Arc<CapabilityTable>> {
        self.restore_timeout().await?;
        if self.dirty {
            self.channel.discard_input().await?;
            self.dirty = false;
        }
        let capabilities = CapabilityRegistry::new(self.config.discovery_attempts)
            .discover(&mut self.channel, &mut self.statistics)
            .await?;
        self.capabilities = Arc::new(capabilities);
        Ok(Arc::clone(&self.capabilities))
    }

    pub fn capabilities(&self) -> &Arc<CapabilityTable> {
        &self.capabilities
    }

    /// Look up a function by name
    pub fn descriptor(&self, name: &str) -> BincomsResult<Arc<FunctionDescriptor>> {
        self.capabilities.lookup(name)
    }

    /// Invoke a function by name
    pub async fn call(&mut self, name: &str, args: &[Value]) -> BincomsResult<Value> {
        let descriptor = self.descriptor(name)?;
        self.invoke(&descriptor, args).await
    }

    /// Invoke a function through its descriptor
    pub async fn invoke(
        &mut self,
        descriptor: &FunctionDescriptor,
        args: &[Value],
    ) -> BincomsResult<Value> {
        self.restore_timeout().await?;
        self.invoker().invoke(descriptor, args).await
    }

    /// Read one unsolicited frame decoded with `layout`
    pub async fn receive(&mut self, layout: &ReturnLayout) -> BincomsResult<Value> {
        self.invoker().receive(layout).await
    }

    /// Current channel timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.channel.timeout()
    }

    pub async fn set_timeout(&mut self, timeout: Option<Duration>) -> BincomsResult<()> {
        self.pending_timeout = None;
        self.channel.set_timeout(timeout).await
    }

    /// Use `timeout` for reads until `restore_timeout` is called
    ///
    /// If the caller never gets to restore it (its future was dropped), the
    /// previous timeout is put back before the next request goes out.
    pub async fn widen_timeout(&mut self, timeout: Option<Duration>) -> BincomsResult<()> {
        if self.pending_timeout.is_none() {
            self.pending_timeout = Some(self.channel.timeout());
        }
        self.channel.set_timeout(timeout).await
    }

    /// Undo `widen_timeout`; does nothing if no timeout is pending
    pub async fn restore_timeout(&mut self) -> BincomsResult<()> {
        if let Some(previous) = self.pending_timeout.take() {
            log::debug!("Restoring read timeout {:?}", previous);
            self.channel.set_timeout(previous).await?;
        }
        Ok(())
    }

    pub fn statistics(&self) -> &SessionStatistics {
        &self.statistics
    }

    pub(crate) fn statistics_mut(&mut self) -> &mut SessionStatistics {
        &mut self.statistics
    }

    /// Whether an exchange was left unfinished
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the link as carrying frames that were not read yet
    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }

    /// Close the channel
    pub async fn close(&mut self) -> BincomsResult<()> {
        log::info!("Closing session");
        self.channel.close().await
    }

    fn invoker(&mut self) -> CommandInvoker<'_, C> {
        CommandInvoker::new(&mut self.channel, &mut self.statistics, &mut self.dirty)
    }
}
