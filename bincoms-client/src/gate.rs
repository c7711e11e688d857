//! Serialized access to a shared session

use bincoms_core::{BincomsResult, Value};
use bincoms_session::{CapabilityTable, FunctionDescriptor, Session, SessionStatistics};
use bincoms_transport::ByteChannel;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};

/// Mutual-exclusion boundary around one session
///
/// Every exchange acquires the gate, writes its request, reads the whole
/// answer and releases the gate, whether it succeeded or not. Waiters are
/// served in arrival order. The gate has no timeout of its own; wrap calls in
/// `tokio::time::timeout` to bound them. A call dropped halfway leaves the
/// session dirty and the next holder drains the link first.
///
/// Cloning the gate is cheap and every clone guards the same session.
pub struct DispatchGate<C: ByteChannel> {
    session: Arc<Mutex<Session<C>>>,
    capabilities: Arc<CapabilityTable>,
}

impl<C: ByteChannel> DispatchGate<C> {
    pub fn new(session: Session<C>) -> Self {
        let capabilities = Arc::clone(session.capabilities());
        Self {
            session: Arc::new(Mutex::new(session)),
            capabilities,
        }
    }

    /// Functions advertised by the device; readable without the gate
    pub fn capabilities(&self) -> &Arc<CapabilityTable> {
        &self.capabilities
    }

    /// Invoke a device function by name
    ///
    /// Unknown names fail before the gate is acquired.
    pub async fn call(&self, name: &str, args: &[Value]) -> BincomsResult<Value> {
        let descriptor = self.capabilities.lookup(name)?;
        self.invoke(&descriptor, args).await
    }

    pub async fn invoke(
        &self,
        descriptor: &FunctionDescriptor,
        args: &[Value],
    ) -> BincomsResult<Value> {
        let mut session = self.session.lock().await;
        session.invoke(descriptor, args).await
    }

    /// Hold the gate for a compound operation
    ///
    /// Nothing else reaches the device until the guard is dropped.
    pub async fn lock(&self) -> MutexGuard<'_, Session<C>> {
        self.session.lock().await
    }

    /// Snapshot of the session counters
    pub async fn statistics(&self) -> SessionStatistics {
        self.session.lock().await.statistics().clone()
    }

    /// Close the underlying channel
    pub async fn close(&self) -> BincomsResult<()> {
        self.session.lock().await.close().await
    }
}

impl<C: ByteChannel> Clone for DispatchGate<C> {
    fn clone(&self) -> Self {
        Self {
            session: Arc::clone(&self.session),
            capabilities: Arc::clone(&self.capabilities),
        }
    }
}

impl<C: ByteChannel> std::fmt::Debug for DispatchGate<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchGate")
            .field("functions", &self.capabilities.names())
            .finish()
    }
}
