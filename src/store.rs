use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::context::ContextSnapshot;

/// Store tuning.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// How long a context survives after its last write.
    pub expiration: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            expiration: Duration::from_secs(60 * 60),
        }
    }
}

struct Entry {
    record: ContextSnapshot,
    expires_at: Instant,
}

/// Keyed TTL storage for context records.
///
/// A pure storage primitive: it raises no business errors. An expired record
/// is logically absent even before it is physically reclaimed, so lazy
/// expiration on access is all that correctness needs; `purge_expired` only
/// frees memory. Readers get consistent copies, never the live record.
pub struct StateStore {
    expiration: Duration,
    entries: RwLock<HashMap<String, Entry>>,
}

impl StateStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            expiration: config.expiration,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Read-only snapshot of a context, or `None` if never created or expired.
    pub fn get(&self, name: &str) -> Option<ContextSnapshot> {
        let entries = self.entries.read();
        let entry = entries.get(name)?;
        if entry.expires_at <= Instant::now() {
            trace!(context = name, "context expired");
            return None;
        }
        Some(entry.record.clone())
    }

    /// Insert or replace a record, resetting its expiration clock to
    /// now + TTL.
    pub fn put(&self, record: ContextSnapshot) {
        let expires_at = Instant::now() + self.expiration;
        let mut entries = self.entries.write();
        trace!(context = %record.name, "stored context");
        entries.insert(record.name.clone(), Entry { record, expires_at });
    }

    /// Remove a record immediately, regardless of TTL.
    pub fn delete(&self, name: &str) {
        if self.entries.write().remove(name).is_some() {
            debug!(context = name, "removed context");
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        let entries = self.entries.read();
        entries
            .get(name)
            .map_or(false, |entry| entry.expires_at > Instant::now())
    }

    /// Physically reclaim expired records; returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "purged expired contexts");
        }
        removed
    }
}
