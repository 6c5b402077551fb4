//! Tenant session state machine and its lifecycle task.
//!
//! A session is one tenant id, one exclusively-owned transport, and one
//! spawned task consuming that transport's ordered event stream. State is
//! published through a `tokio::sync::watch` channel: the lifecycle task and
//! [`TenantSession::shutdown`] are the only writers, and waiters are woken
//! exactly by the transition they are waiting for. There is no polling
//! anywhere.

use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use mb_protocol::{ChatAddress, TenantId, TransportEvent};
use mb_runtime::{MessagingTransport, TransportFactory};

use crate::error::{Error, Result};
use crate::pairing::{PairingArtifact, PairingArtifactProducer};

/// Lifecycle states of a tenant session.
///
/// The pairing artifact lives inside [`SessionState::AwaitingPairing`]; a
/// session never regenerates it once issued for the current attempt.
#[derive(Debug, Clone)]
pub enum SessionState {
    Initializing,
    AwaitingPairing { artifact: PairingArtifact },
    Ready,
    Disconnecting,
    Destroyed,
    Failed { reason: String },
}

impl SessionState {
    /// Short state name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initializing => "initializing",
            Self::AwaitingPairing { .. } => "awaiting_pairing",
            Self::Ready => "ready",
            Self::Disconnecting => "disconnecting",
            Self::Destroyed => "destroyed",
            Self::Failed { .. } => "failed",
        }
    }
}

struct SessionShared {
    tenant: TenantId,
    transport: Arc<dyn MessagingTransport>,
    state: watch::Sender<SessionState>,
    created_at: SystemTime,
    ready_at: OnceLock<SystemTime>,
}

/// One tenant's live session: transport handle, state machine, lifecycle
/// task.
pub struct TenantSession {
    shared: Arc<SessionShared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TenantSession {
    /// Connects the transport for `tenant` and spawns the lifecycle task
    /// that drives the state machine from the event stream.
    pub(crate) async fn spawn(
        tenant: TenantId,
        factory: &dyn TransportFactory,
        producer: Arc<PairingArtifactProducer>,
    ) -> Result<Arc<Self>> {
        let link = factory
            .connect(&tenant)
            .await
            .map_err(|e| Error::TransportInit(e.to_string()))?;

        let (state, _) = watch::channel(SessionState::Initializing);
        let shared = Arc::new(SessionShared {
            tenant,
            transport: link.transport,
            state,
            created_at: SystemTime::now(),
            ready_at: OnceLock::new(),
        });
        let task = tokio::spawn(run_lifecycle(Arc::clone(&shared), link.events, producer));
        Ok(Arc::new(Self {
            shared,
            task: Mutex::new(Some(task)),
        }))
    }

    pub fn tenant(&self) -> &TenantId {
        &self.shared.tenant
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.shared.state.borrow().clone()
    }

    /// Subscribes to state transitions; the receiver wakes on every change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.shared.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.shared.state.borrow(), SessionState::Ready)
    }

    pub fn created_at(&self) -> SystemTime {
        self.shared.created_at
    }

    /// When the session reached `Ready`, if it has.
    pub fn ready_at(&self) -> Option<SystemTime> {
        self.shared.ready_at.get().copied()
    }

    pub(crate) fn transport(&self) -> &Arc<dyn MessagingTransport> {
        &self.shared.transport
    }

    /// Destroys the transport and drives the session to its terminal state,
    /// waking every waiter. Idempotent. A session that already `Failed`
    /// keeps that state; everything else ends `Destroyed`.
    pub(crate) async fn shutdown(&self) {
        let failed = matches!(&*self.shared.state.borrow(), SessionState::Failed { .. });
        if !failed {
            self.shared.state.send_if_modified(|state| {
                if matches!(state, SessionState::Destroyed) {
                    return false;
                }
                *state = SessionState::Disconnecting;
                true
            });
        }

        let _ = self.shared.transport.destroy().await;

        let task = self.task.lock().take();
        if let Some(task) = task {
            task.abort();
            let _ = task.await;
        }

        if !failed {
            self.shared.state.send_if_modified(|state| {
                if matches!(state, SessionState::Destroyed) {
                    return false;
                }
                *state = SessionState::Destroyed;
                true
            });
        }
        debug!(target = "mb.session", tenant = %self.shared.tenant, "session shut down");
    }
}

async fn run_lifecycle(
    shared: Arc<SessionShared>,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    producer: Arc<PairingArtifactProducer>,
) {
    while let Some(event) = events.recv().await {
        match event {
            TransportEvent::PairingCode { payload } => {
                handle_pairing_code(&shared, &producer, &payload);
            }
            TransportEvent::Ready => handle_ready(&shared),
            TransportEvent::Message { from, body } => handle_message(&shared, from, &body).await,
            TransportEvent::Error { message } => handle_error(&shared, message),
        }
    }

    // Stream closed by the transport. Expected while disconnecting;
    // otherwise the driver died underneath us.
    let failed = shared.state.send_if_modified(|state| match state {
        SessionState::Disconnecting | SessionState::Destroyed | SessionState::Failed { .. } => {
            false
        }
        _ => {
            *state = SessionState::Failed {
                reason: "transport event stream closed".to_string(),
            };
            true
        }
    });
    if failed {
        warn!(
            target = "mb.session",
            tenant = %shared.tenant,
            "transport event stream closed unexpectedly"
        );
    }
}

fn handle_pairing_code(
    shared: &SessionShared,
    producer: &PairingArtifactProducer,
    payload: &str,
) {
    // Only the first payload of an attempt becomes an artifact; the remote
    // refreshes the code periodically while unscanned.
    if !matches!(&*shared.state.borrow(), SessionState::Initializing) {
        debug!(
            target = "mb.session",
            tenant = %shared.tenant,
            "ignoring repeat pairing payload"
        );
        return;
    }

    let artifact = match producer.produce(&shared.tenant, payload) {
        Ok(artifact) => artifact,
        Err(err) => {
            warn!(
                target = "mb.session",
                tenant = %shared.tenant,
                error = %err,
                "pairing artifact production failed"
            );
            fail(shared, format!("pairing artifact failed: {err}"));
            return;
        }
    };

    let issued = shared.state.send_if_modified(|state| match state {
        SessionState::Initializing => {
            *state = SessionState::AwaitingPairing { artifact: artifact.clone() };
            true
        }
        _ => false,
    });
    if issued {
        info!(target = "mb.session", tenant = %shared.tenant, "pairing code issued");
    }
}

fn handle_ready(shared: &SessionShared) {
    let became_ready = shared.state.send_if_modified(|state| match state {
        SessionState::Initializing | SessionState::AwaitingPairing { .. } => {
            *state = SessionState::Ready;
            true
        }
        _ => false,
    });
    if became_ready {
        let _ = shared.ready_at.set(SystemTime::now());
        info!(target = "mb.session", tenant = %shared.tenant, "session ready");
    }
}

async fn handle_message(shared: &SessionShared, from: ChatAddress, body: &str) {
    debug!(
        target = "mb.session",
        tenant = %shared.tenant,
        from = %from,
        "incoming message"
    );
    if body == "!ping" {
        if let Err(err) = shared.transport.send_message(&from, "pong").await {
            warn!(
                target = "mb.session",
                tenant = %shared.tenant,
                error = %err,
                "ping reply failed"
            );
        }
    }
}

fn handle_error(shared: &SessionShared, message: String) {
    let failed = shared.state.send_if_modified(|state| match state {
        SessionState::Initializing | SessionState::AwaitingPairing { .. } => {
            *state = SessionState::Failed {
                reason: message.clone(),
            };
            true
        }
        _ => false,
    });
    if failed {
        warn!(
            target = "mb.session",
            tenant = %shared.tenant,
            error = %message,
            "transport failed before pairing completed"
        );
    } else {
        // Errors on an established session are logged and contained; they
        // must not take the session (or the process) down.
        warn!(
            target = "mb.session",
            tenant = %shared.tenant,
            error = %message,
            "transport error"
        );
    }
}

fn fail(shared: &SessionShared, reason: String) {
    shared.state.send_if_modified(|state| match state {
        SessionState::Initializing | SessionState::AwaitingPairing { .. } => {
            *state = SessionState::Failed { reason: reason.clone() };
            true
        }
        _ => false,
    });
}
