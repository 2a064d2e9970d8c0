//! Device-local fast-path store.
//!
//! Same-process consumers read the current payload here without touching the
//! database. Backed by a
//! `watch` channel per (tenant, terminal) so `set` doubles as the change
//! notification.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::watch;
use uuid::Uuid;

use crate::models::DisplayPayload;

#[derive(Clone, Debug)]
pub struct FastPathCache {
    entries: Arc<DashMap<(Uuid, Uuid), watch::Sender<Option<DisplayPayload>>>>,
}

impl FastPathCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
        }
    }

    fn slot(&self, tenant_id: Uuid, terminal_id: Uuid) -> watch::Sender<Option<DisplayPayload>> {
        self.entries
            .entry((tenant_id, terminal_id))
            .or_insert_with(|| watch::channel(None).0)
            .clone()
    }

    /// Replace the cached payload and notify watchers. `None` clears.
    pub fn set(&self, tenant_id: Uuid, terminal_id: Uuid, payload: Option<DisplayPayload>) {
        self.slot(tenant_id, terminal_id).send_replace(payload);
    }

    /// Current cached payload; an expired payload reads as empty.
    pub fn get(&self, tenant_id: Uuid, terminal_id: Uuid) -> Option<DisplayPayload> {
        let slot = self.slot(tenant_id, terminal_id);
        let current = slot.borrow().clone();
        current.filter(|p| !p.is_expired(Utc::now()))
    }

    /// Subscribe to changes for one terminal. The receiver starts at the
    /// current value.
    pub fn watch(&self, tenant_id: Uuid, terminal_id: Uuid) -> watch::Receiver<Option<DisplayPayload>> {
        self.slot(tenant_id, terminal_id).subscribe()
    }
}

impl Default for FastPathCache {
    fn default() -> Self {
        Self::new()
    }
}
