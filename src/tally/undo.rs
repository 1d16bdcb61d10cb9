//! One-shot undo for destructive actions.
//!
//! The destructive change is applied and persisted first; the pending undo
//! only remembers the collection as it was. The browser arms a timer with the
//! returned token and reports back through [`UndoSlot::expire`]; the deadline
//! is also checked on [`UndoSlot::invoke`] so a late or lost timer cannot
//! resurrect an old snapshot.

use log::debug;

use crate::tally::entity::Entity;
use crate::tally::store::EntityStore;

/// The destructive action a pending undo can reverse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestructiveAction {
    Remove { name: String },
    ClearAll,
}

#[derive(Debug, Clone)]
pub struct PendingUndo {
    pub token: u64,
    pub action: DestructiveAction,
    pub snapshot: Vec<Entity>,
    /// Milliseconds since the epoch after which undo is no longer possible.
    pub deadline_ms: f64,
}

/// What the renderer needs to arm the browser-side timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoTicket {
    pub token: u64,
    pub window_ms: u32,
}

#[derive(Debug, Default)]
pub struct UndoSlot {
    pending: Option<PendingUndo>,
    next_token: u64,
}

impl UndoSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending(&self) -> Option<&PendingUndo> {
        self.pending.as_ref()
    }

    /// Open an undo window for `snapshot`, superseding any pending undo.
    pub fn begin(
        &mut self,
        snapshot: Vec<Entity>,
        action: DestructiveAction,
        window_ms: u32,
        now_ms: f64,
    ) -> UndoTicket {
        self.next_token += 1;
        let token = self.next_token;
        if let Some(old) = self.pending.take() {
            debug!("undo {} superseded by {}", old.token, token);
        }
        self.pending = Some(PendingUndo {
            token,
            action,
            snapshot,
            deadline_ms: now_ms + f64::from(window_ms),
        });
        UndoTicket { token, window_ms }
    }

    /// Timer fired for `token`. Returns true if that undo was still pending.
    pub fn expire(&mut self, token: u64) -> bool {
        match &self.pending {
            Some(p) if p.token == token => {
                self.pending = None;
                true
            }
            _ => false,
        }
    }

    /// Restore the pending snapshot into `store`. Returns true if anything was restored.
    pub fn invoke(&mut self, store: &mut EntityStore, now_ms: f64) -> bool {
        let Some(pending) = self.pending.take() else {
            return false;
        };
        if now_ms >= pending.deadline_ms {
            debug!("undo {} requested after its window closed", pending.token);
            return false;
        }
        store.replace(pending.snapshot);
        true
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tally::storage::MemoryStorage;

    fn store_with(names: &[(&str, u32)]) -> EntityStore {
        let mut store = EntityStore::new("players", Box::new(MemoryStorage::new()));
        for (name, count) in names {
            store.add(name);
            store.set_count(name, *count);
        }
        store
    }

    fn remove_with_undo(
        store: &mut EntityStore,
        slot: &mut UndoSlot,
        name: &str,
        now: f64,
    ) -> UndoTicket {
        let snapshot = store.entities().to_vec();
        store.remove(name);
        slot.begin(
            snapshot,
            DestructiveAction::Remove { name: name.to_string() },
            5000,
            now,
        )
    }

    #[test]
    fn undo_within_window_restores_entity() {
        let mut store = store_with(&[("Ann", 2), ("Bob", 5)]);
        let mut slot = UndoSlot::new();
        remove_with_undo(&mut store, &mut slot, "Bob", 1000.0);
        assert!(store.get("Bob").is_none());

        assert!(slot.invoke(&mut store, 2000.0));
        assert_eq!(store.get("Bob").map(|e| e.count), Some(5));
        assert!(slot.pending().is_none());

        // Restore was persisted
        let reopened = EntityStore::new("players", store.into_storage());
        assert_eq!(reopened.get("Bob").map(|e| e.count), Some(5));
    }

    #[test]
    fn undo_after_window_is_noop() {
        let mut store = store_with(&[("Bob", 5)]);
        let mut slot = UndoSlot::new();
        remove_with_undo(&mut store, &mut slot, "Bob", 1000.0);

        assert!(!slot.invoke(&mut store, 6000.0));
        assert!(store.get("Bob").is_none());
        assert!(slot.pending().is_none());
    }

    #[test]
    fn undo_after_expire_is_noop() {
        let mut store = store_with(&[("Bob", 5)]);
        let mut slot = UndoSlot::new();
        let ticket = remove_with_undo(&mut store, &mut slot, "Bob", 1000.0);

        assert!(slot.expire(ticket.token));
        assert!(!slot.invoke(&mut store, 1001.0));
        assert!(store.get("Bob").is_none());
    }

    #[test]
    fn second_begin_supersedes_first() {
        let mut store = store_with(&[("Ann", 1), ("Bob", 2)]);
        let mut slot = UndoSlot::new();
        let first = remove_with_undo(&mut store, &mut slot, "Ann", 0.0);
        let second = remove_with_undo(&mut store, &mut slot, "Bob", 10.0);
        assert_ne!(first.token, second.token);

        // The first timer firing late must not clear the second window
        assert!(!slot.expire(first.token));
        assert!(slot.invoke(&mut store, 20.0));
        assert_eq!(store.get("Bob").map(|e| e.count), Some(2));
        assert!(store.get("Ann").is_none());
        assert!(!slot.invoke(&mut store, 30.0));
    }

    #[test]
    fn undo_clear_all_restores_everything() {
        let mut store = store_with(&[("C", 3), ("A", 1)]);
        let mut slot = UndoSlot::new();
        let snapshot = store.entities().to_vec();
        store.clear_all();
        slot.begin(snapshot.clone(), DestructiveAction::ClearAll, 5000, 0.0);

        assert!(slot.invoke(&mut store, 100.0));
        assert_eq!(store.entities(), snapshot.as_slice());
    }

    #[test]
    fn invoke_and_expire_without_pending_are_noops() {
        let mut store = store_with(&[("Ann", 1)]);
        let mut slot = UndoSlot::new();
        assert!(!slot.invoke(&mut store, 0.0));
        assert!(!slot.expire(1));
        slot.cancel();
        slot.cancel();
        assert_eq!(store.len(), 1);
    }
}
