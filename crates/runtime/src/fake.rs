//! In-memory transport for exercising the session lifecycle without drivers.
//!
//! [`FakeTransportFactory::new`] returns the factory plus a
//! [`FakeTransportController`] for injecting events and inspecting what the
//! hub did: how often it connected, what it sent, what it destroyed. Events
//! emitted before the tenant connects are buffered and delivered with the
//! connection, so tests can script a whole session up front.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use mb_protocol::{ChatAddress, TenantId, TransportEvent};

use crate::transport::{MessagingTransport, Result, TransportError, TransportFactory, TransportLink};

#[derive(Default)]
struct FakeState {
    connects: Vec<TenantId>,
    fail_next: Option<String>,
    channels: HashMap<TenantId, mpsc::UnboundedSender<TransportEvent>>,
    pending: HashMap<TenantId, mpsc::UnboundedReceiver<TransportEvent>>,
    sent: HashMap<TenantId, Vec<(ChatAddress, String)>>,
    destroys: HashMap<TenantId, usize>,
}

/// Test transport factory; every connect yields an in-memory transport fed
/// by the paired [`FakeTransportController`].
pub struct FakeTransportFactory {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransportFactory {
    /// Creates the factory and its controller.
    pub fn new() -> (Self, FakeTransportController) {
        let state = Arc::new(Mutex::new(FakeState::default()));
        let controller = FakeTransportController {
            state: Arc::clone(&state),
        };
        (Self { state }, controller)
    }
}

#[async_trait]
impl TransportFactory for FakeTransportFactory {
    async fn connect(&self, tenant: &TenantId) -> Result<TransportLink> {
        let (tx, events) = {
            let mut state = self.state.lock();
            if let Some(message) = state.fail_next.take() {
                return Err(TransportError::Spawn(message));
            }
            state.connects.push(tenant.clone());

            let buffered = state.pending.remove(tenant);
            match (buffered, state.channels.get(tenant).cloned()) {
                // Events were emitted before the connect; hand over the
                // buffered stream.
                (Some(events), Some(tx)) => (tx, events),
                _ => {
                    let (tx, events) = mpsc::unbounded_channel();
                    state.channels.insert(tenant.clone(), tx.clone());
                    (tx, events)
                }
            }
        };

        let transport = Arc::new(FakeTransport {
            tenant: tenant.clone(),
            state: Arc::clone(&self.state),
            events: Mutex::new(Some(tx)),
            closed: AtomicBool::new(false),
        });
        Ok(TransportLink { transport, events })
    }
}

struct FakeTransport {
    tenant: TenantId,
    state: Arc<Mutex<FakeState>>,
    events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
    closed: AtomicBool,
}

#[async_trait]
impl MessagingTransport for FakeTransport {
    async fn send_message(&self, chat: &ChatAddress, body: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.state
            .lock()
            .sent
            .entry(self.tenant.clone())
            .or_default()
            .push((chat.clone(), body.to_string()));
        Ok(())
    }

    async fn destroy(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let mine = self.events.lock().take();
        let mut state = self.state.lock();
        *state.destroys.entry(self.tenant.clone()).or_default() += 1;
        // Drop every sender for this connection so its event stream closes,
        // without ever touching a successor's channel.
        if let Some(mine) = mine {
            if state
                .channels
                .get(&self.tenant)
                .is_some_and(|tx| tx.same_channel(&mine))
            {
                state.channels.remove(&self.tenant);
            }
        }
        Ok(())
    }
}

/// Injects events into fake transports and inspects their use.
pub struct FakeTransportController {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransportController {
    /// Total number of factory connects across all tenants.
    pub fn connect_count(&self) -> usize {
        self.state.lock().connects.len()
    }

    /// Tenants connected so far, in order.
    pub fn connects(&self) -> Vec<TenantId> {
        self.state.lock().connects.clone()
    }

    /// Makes the next connect fail with a spawn error.
    pub fn fail_next_connect(&self, message: &str) {
        self.state.lock().fail_next = Some(message.to_string());
    }

    /// Emits an event on the tenant's current connection, buffering it if
    /// the tenant has not connected yet.
    pub fn emit(&self, tenant: &TenantId, event: TransportEvent) {
        let mut state = self.state.lock();
        if let Some(tx) = state.channels.get(tenant) {
            let _ = tx.send(event);
            return;
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(event);
        state.channels.insert(tenant.clone(), tx);
        state.pending.insert(tenant.clone(), rx);
    }

    pub fn emit_pairing(&self, tenant: &TenantId, payload: &str) {
        self.emit(
            tenant,
            TransportEvent::PairingCode {
                payload: payload.to_string(),
            },
        );
    }

    pub fn emit_ready(&self, tenant: &TenantId) {
        self.emit(tenant, TransportEvent::Ready);
    }

    pub fn emit_error(&self, tenant: &TenantId, message: &str) {
        self.emit(
            tenant,
            TransportEvent::Error {
                message: message.to_string(),
            },
        );
    }

    pub fn emit_message(&self, tenant: &TenantId, from: &ChatAddress, body: &str) {
        self.emit(
            tenant,
            TransportEvent::Message {
                from: from.clone(),
                body: body.to_string(),
            },
        );
    }

    /// Messages sent through the tenant's transports, in order.
    pub fn sent_messages(&self, tenant: &TenantId) -> Vec<(ChatAddress, String)> {
        self.state.lock().sent.get(tenant).cloned().unwrap_or_default()
    }

    /// How many transports for the tenant have been destroyed.
    pub fn destroy_count(&self, tenant: &TenantId) -> usize {
        self.state.lock().destroys.get(tenant).copied().unwrap_or(0)
    }
}
