//! Concurrency-safe store of per-tenant sessions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Mutex;

use mb_protocol::TenantId;

use crate::session::TenantSession;

/// One registry slot: the per-tenant operation lock plus the current
/// session.
///
/// Entries are stable for the life of the process so the lock identity for
/// a tenant never changes; removing a session clears the slot but keeps the
/// entry. Under concurrent create attempts for the same tenant, exactly one
/// caller installs a session while the others observe it through the lock.
pub struct TenantEntry {
    op_lock: Mutex<()>,
    session: RwLock<Option<Arc<TenantSession>>>,
}

impl TenantEntry {
    fn new() -> Self {
        Self {
            op_lock: Mutex::new(()),
            session: RwLock::new(None),
        }
    }

    /// Lock serializing authenticate/disconnect for this tenant. Operations
    /// on other tenants never contend on it.
    pub(crate) fn op_lock(&self) -> &Mutex<()> {
        &self.op_lock
    }

    /// Current session in this slot, if any.
    pub fn session(&self) -> Option<Arc<TenantSession>> {
        self.session.read().clone()
    }

    /// Installs `session` as the slot's current session. Callers hold the
    /// operation lock.
    pub(crate) fn install(&self, session: Arc<TenantSession>) {
        *self.session.write() = Some(session);
    }

    /// Clears and returns the slot's session. Callers hold the operation
    /// lock.
    pub(crate) fn take(&self) -> Option<Arc<TenantSession>> {
        self.session.write().take()
    }
}

/// Mapping tenant id → entry, safe under arbitrary concurrent callers.
#[derive(Default)]
pub struct SessionRegistry {
    entries: RwLock<HashMap<TenantId, Arc<TenantEntry>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `tenant`, creating it if absent. At most one
    /// entry ever exists per tenant.
    pub fn entry(&self, tenant: &TenantId) -> Arc<TenantEntry> {
        if let Some(entry) = self.entries.read().get(tenant) {
            return Arc::clone(entry);
        }
        let mut entries = self.entries.write();
        Arc::clone(
            entries
                .entry(tenant.clone())
                .or_insert_with(|| Arc::new(TenantEntry::new())),
        )
    }

    /// Entry lookup without creation.
    pub fn get(&self, tenant: &TenantId) -> Option<Arc<TenantEntry>> {
        self.entries.read().get(tenant).cloned()
    }

    /// Current session for `tenant`, if any.
    pub fn session(&self, tenant: &TenantId) -> Option<Arc<TenantSession>> {
        self.get(tenant).and_then(|entry| entry.session())
    }

    /// Number of tenants currently holding a session.
    pub fn active_count(&self) -> usize {
        self.entries
            .read()
            .values()
            .filter(|entry| entry.session.read().is_some())
            .count()
    }
}
