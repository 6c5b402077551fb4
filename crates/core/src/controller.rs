//! Session lifecycle orchestration.
//!
//! The controller is the only component that installs or removes sessions.
//! Registry mutation happens under the tenant's operation lock; waiting for
//! the first pairing/ready signal happens after the lock is released, so a
//! concurrent disconnect can interrupt an in-progress pairing and waiters
//! observe the `Destroyed` transition instead of hanging.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use mb_protocol::TenantId;
use mb_runtime::TransportFactory;

use crate::error::{Error, Result};
use crate::pairing::{PairingArtifact, PairingArtifactProducer};
use crate::registry::{SessionRegistry, TenantEntry};
use crate::session::{SessionState, TenantSession};

/// Outcome of a successful authenticate call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The session is paired and usable; no pairing step is needed.
    Ready,
    /// Pairing is pending; deliver this artifact to the caller.
    Pairing(PairingArtifact),
}

/// Creates, pairs, observes, and tears down tenant sessions.
pub struct SessionLifecycleController {
    registry: Arc<SessionRegistry>,
    factory: Arc<dyn TransportFactory>,
    producer: Arc<PairingArtifactProducer>,
}

impl SessionLifecycleController {
    pub fn new(
        registry: Arc<SessionRegistry>,
        factory: Arc<dyn TransportFactory>,
        producer: Arc<PairingArtifactProducer>,
    ) -> Self {
        Self {
            registry,
            factory,
            producer,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Ensures a session exists for `tenant` and reports how to proceed.
    ///
    /// An already-paired session answers `Ready` and an already-issued
    /// artifact is returned as-is, both without touching the transport.
    /// Otherwise the caller waits for the session's first pairing or ready
    /// signal - including callers that arrive while another request's
    /// initialization is still in flight; a second initialization is never
    /// started.
    pub async fn authenticate(&self, tenant: &TenantId) -> Result<AuthOutcome> {
        let entry = self.registry.entry(tenant);
        let mut state_rx = {
            let _guard = entry.op_lock().lock().await;
            match entry.session() {
                Some(session) => match session.state() {
                    SessionState::Ready => return Ok(AuthOutcome::Ready),
                    SessionState::AwaitingPairing { artifact } => {
                        return Ok(AuthOutcome::Pairing(artifact));
                    }
                    SessionState::Initializing | SessionState::Disconnecting => {
                        session.subscribe()
                    }
                    SessionState::Failed { reason } => {
                        warn!(
                            target = "mb.session",
                            tenant = %tenant,
                            %reason,
                            "replacing failed session"
                        );
                        session.shutdown().await;
                        entry.take();
                        self.start_session(tenant, &entry).await?
                    }
                    SessionState::Destroyed => {
                        entry.take();
                        self.start_session(tenant, &entry).await?
                    }
                },
                None => self.start_session(tenant, &entry).await?,
            }
        };
        wait_first_signal(tenant, &mut state_rx).await
    }

    /// Destroys the tenant's session, then immediately re-enters pairing.
    /// Disconnect is destroy-and-re-pair, not a bare teardown.
    pub async fn disconnect(&self, tenant: &TenantId) -> Result<AuthOutcome> {
        let entry = self
            .registry
            .get(tenant)
            .ok_or_else(|| Error::SessionNotFound(tenant.clone()))?;
        {
            let _guard = entry.op_lock().lock().await;
            let session = entry
                .take()
                .ok_or_else(|| Error::SessionNotFound(tenant.clone()))?;
            info!(target = "mb.session", tenant = %tenant, "disconnecting session");
            session.shutdown().await;
        }
        self.authenticate(tenant).await
    }

    /// Whether the tenant currently holds an approved, usable session.
    pub fn verify(&self, tenant: &TenantId) -> bool {
        self.registry
            .session(tenant)
            .is_some_and(|session| session.is_ready())
    }

    async fn start_session(
        &self,
        tenant: &TenantId,
        entry: &TenantEntry,
    ) -> Result<watch::Receiver<SessionState>> {
        info!(target = "mb.session", tenant = %tenant, "starting session");
        let session = TenantSession::spawn(
            tenant.clone(),
            self.factory.as_ref(),
            Arc::clone(&self.producer),
        )
        .await?;
        let state_rx = session.subscribe();
        entry.install(session);
        Ok(state_rx)
    }
}

/// Resolves once the session publishes its first actionable state: the
/// pairing artifact, readiness, or a failure. Suspends between transitions;
/// never polls.
async fn wait_first_signal(
    tenant: &TenantId,
    state_rx: &mut watch::Receiver<SessionState>,
) -> Result<AuthOutcome> {
    loop {
        let state = state_rx.borrow_and_update().clone();
        match state {
            SessionState::Ready => return Ok(AuthOutcome::Ready),
            SessionState::AwaitingPairing { artifact } => {
                return Ok(AuthOutcome::Pairing(artifact));
            }
            SessionState::Failed { reason } => return Err(Error::TransportInit(reason)),
            SessionState::Destroyed => return Err(Error::SessionClosed(tenant.clone())),
            SessionState::Initializing | SessionState::Disconnecting => {}
        }
        if state_rx.changed().await.is_err() {
            return Err(Error::SessionClosed(tenant.clone()));
        }
    }
}
