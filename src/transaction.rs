use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::context::ContextSnapshot;
use crate::store::StateStore;

/// A single staged write against one context.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    SetProperty { name: String, value: Value },
    PushEntry { list: String, position: Position, entry: Value },
}

/// Which end of a list an entry is pushed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    First,
    Last,
}

/// In-flight, uncommitted mutations of a single context, plus the snapshot
/// readers keep observing until commit.
pub struct Transaction {
    context: String,
    base: Option<ContextSnapshot>,
    staged: Vec<Mutation>,
}

impl Transaction {
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Snapshot captured at `begin`, or `None` if the context did not exist.
    pub fn base(&self) -> Option<&ContextSnapshot> {
        self.base.as_ref()
    }

    /// Accumulate a pending write. The store is untouched until commit.
    pub fn stage(&mut self, mutation: Mutation) {
        self.staged.push(mutation);
    }
}

/// Makes the mutations of one triggering event atomically visible.
///
/// Commits on the same context name are serialized through one lock slot per
/// context, so two committed transactions never interleave their writes: the
/// net effect equals applying them in commit order, each all-or-nothing.
/// Unrelated contexts share nothing but the slot map itself.
pub struct TransactionManager {
    store: Arc<StateStore>,
    slots: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TransactionManager {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self {
            store,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn begin(&self, context: &str) -> Transaction {
        Transaction {
            context: context.to_string(),
            base: self.store.get(context),
            staged: Vec::new(),
        }
    }

    /// Apply all staged mutations as one visible update. The update counter
    /// moves by exactly one per commit, no matter how many mutations were
    /// staged.
    pub fn commit(&self, txn: Transaction) {
        let slot = self.slot(&txn.context);
        let _guard = slot.lock();
        // Re-read under the slot lock: another commit may have landed since
        // begin, and its writes must survive this one.
        let mut record = self
            .store
            .get(&txn.context)
            .unwrap_or_else(|| ContextSnapshot::new(&txn.context));
        for mutation in &txn.staged {
            record.apply(mutation);
        }
        record.update_count += 1;
        record.last_written_at = Utc::now();
        debug!(
            context = %txn.context,
            mutations = txn.staged.len(),
            update_count = record.update_count,
            "committed transaction"
        );
        self.store.put(record);
    }

    /// Discard staged mutations; the store is left exactly as before.
    pub fn abort(&self, txn: Transaction) {
        trace!(context = %txn.context, discarded = txn.staged.len(), "aborted transaction");
    }

    fn slot(&self, context: &str) -> Arc<Mutex<()>> {
        self.slots
            .lock()
            .entry(context.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn manager() -> (Arc<StateStore>, TransactionManager) {
        let store = Arc::new(StateStore::new(StoreConfig::default()));
        let txns = TransactionManager::new(Arc::clone(&store));
        (store, txns)
    }

    fn set(name: &str, value: &str) -> Mutation {
        Mutation::SetProperty {
            name: name.into(),
            value: json!(value),
        }
    }

    #[test]
    fn commit_applies_all_mutations_and_bumps_counter_once() {
        let (store, txns) = manager();
        let mut txn = txns.begin("ctx");
        txn.stage(set("one", "1"));
        txn.stage(set("two", "2"));
        txns.commit(txn);

        let record = store.get("ctx").unwrap();
        assert_eq!(record.update_count, 1);
        assert_eq!(record.properties.get("one"), Some(&json!("1")));
        assert_eq!(record.properties.get("two"), Some(&json!("2")));
    }

    #[test]
    fn staged_mutations_are_invisible_until_commit() {
        let (store, txns) = manager();
        let mut txn = txns.begin("ctx");
        txn.stage(set("v", "X"));
        assert_eq!(store.get("ctx"), None);
        txns.commit(txn);
        assert!(store.get("ctx").is_some());
    }

    #[test]
    fn abort_leaves_the_store_unchanged() {
        let (store, txns) = manager();
        let mut first = txns.begin("ctx");
        first.stage(set("v", "X"));
        txns.commit(first);
        let before = store.get("ctx").unwrap();

        let mut second = txns.begin("ctx");
        second.stage(set("v", "clobbered"));
        assert_eq!(second.base(), Some(&before));
        txns.abort(second);

        assert_eq!(store.get("ctx").unwrap(), before);
    }

    #[test]
    fn overlapping_transactions_both_take_effect() {
        let (store, txns) = manager();
        let mut a = txns.begin("ctx");
        let mut b = txns.begin("ctx");
        a.stage(set("a", "1"));
        b.stage(set("b", "2"));
        txns.commit(a);
        txns.commit(b);

        let record = store.get("ctx").unwrap();
        assert_eq!(record.update_count, 2);
        assert_eq!(record.properties.get("a"), Some(&json!("1")));
        assert_eq!(record.properties.get("b"), Some(&json!("2")));
    }

    #[test]
    fn contexts_are_independent() {
        let (store, txns) = manager();
        let mut a = txns.begin("a");
        a.stage(set("v", "1"));
        txns.commit(a);

        assert_eq!(store.get("b"), None);
        assert_eq!(store.get("a").unwrap().update_count, 1);
    }
}
