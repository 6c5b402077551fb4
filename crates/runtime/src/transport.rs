//! Transport trait boundary between the session hub and driver backends.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use mb_protocol::{ChatAddress, TenantId, TransportEvent};

pub type Result<T> = std::result::Result<T, TransportError>;

/// Failures raised by transport implementations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to start transport: {0}")]
    Spawn(String),
    #[error("transport is closed")]
    Closed,
    #[error("malformed driver message: {0}")]
    Protocol(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Handle to one tenant's live connection to the messaging service.
///
/// A transport is exclusively owned by its tenant session and is never
/// shared across sessions.
#[async_trait]
pub trait MessagingTransport: Send + Sync + 'static {
    /// Enqueues an outbound message. Returns once the local enqueue
    /// succeeds; remote delivery is not awaited.
    async fn send_message(&self, chat: &ChatAddress, body: &str) -> Result<()>;

    /// Tears the connection down. Idempotent: repeated calls are no-ops.
    async fn destroy(&self) -> Result<()>;
}

/// A freshly connected transport plus its event stream.
///
/// The receiver is the single consumer of the transport's ordered events;
/// the lifecycle task of the owning session drains it.
pub struct TransportLink {
    pub transport: Arc<dyn MessagingTransport>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Connects transports for tenants.
///
/// Implemented by [`DriverTransportFactory`](crate::driver::DriverTransportFactory)
/// for production and [`FakeTransportFactory`](crate::fake::FakeTransportFactory)
/// for tests.
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
    async fn connect(&self, tenant: &TenantId) -> Result<TransportLink>;
}
