//! Outbound message dispatch for ready sessions.

use std::sync::Arc;

use tracing::debug;

use mb_protocol::{ChatAddress, TenantId};

use crate::error::{Error, Result};
use crate::registry::SessionRegistry;
use crate::session::SessionState;

/// Forwards outbound messages through a tenant's ready session.
pub struct MessageDispatcher {
    registry: Arc<SessionRegistry>,
}

impl MessageDispatcher {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Sends `body` to `number` through the tenant's session.
    ///
    /// Dispatches only when the session is exactly `Ready`; anything else is
    /// a `NotReady` error. Returns once the local enqueue succeeds - remote
    /// delivery is not awaited.
    pub async fn send(&self, tenant: &TenantId, number: &str, body: &str) -> Result<()> {
        let session = self
            .registry
            .session(tenant)
            .ok_or_else(|| Error::SessionNotFound(tenant.clone()))?;

        let state = session.state();
        if !matches!(state, SessionState::Ready) {
            return Err(Error::NotReady {
                tenant: tenant.clone(),
                state: state.name(),
            });
        }

        let chat = ChatAddress::from_msisdn(number)?;
        session.transport().send_message(&chat, body).await?;
        debug!(
            target = "mb.dispatch",
            tenant = %tenant,
            chat = %chat,
            "message enqueued"
        );
        Ok(())
    }
}
