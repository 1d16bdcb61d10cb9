//! Per-session state: config, entity store and undo slot.
//!
//! Uses `thread_local!` + `RefCell` for safe mutable access in single-threaded
//! WASM. The Web Worker keeps the module alive, so the session persists across
//! `handle_request` calls for the whole page lifetime. Everything below the
//! WASM boundary takes `&mut Session` instead of reaching for the global.

use std::cell::RefCell;

use log::info;

use crate::tally::config::TallyConfig;
use crate::tally::entity::Entity;
use crate::tally::storage::{KeyValueStorage, MirroredStorage};
use crate::tally::store::EntityStore;
use crate::tally::undo::{DestructiveAction, UndoSlot, UndoTicket};

pub struct Session {
    pub config: TallyConfig,
    pub store: EntityStore,
    pub undo: UndoSlot,
}

impl Session {
    pub fn new(config: TallyConfig, storage: Box<dyn KeyValueStorage>) -> Self {
        let store = EntityStore::new(config.storage_key(), storage);
        info!(
            "tally session on '{}' loaded {} {}",
            store.key(),
            store.len(),
            config.kind.plural_label().to_lowercase()
        );
        Self {
            config,
            store,
            undo: UndoSlot::new(),
        }
    }

    /// Remove `name` and open an undo window. Returns `None` if nothing was removed
    /// or undo is disabled.
    pub fn remove_with_undo(&mut self, name: &str, now_ms: f64) -> Option<UndoTicket> {
        if self.store.get(name).is_none() {
            return None;
        }
        let snapshot = self.store.entities().to_vec();
        self.store.remove(name);
        self.arm_undo(
            snapshot,
            DestructiveAction::Remove {
                name: name.to_string(),
            },
            now_ms,
        )
    }

    /// Delete everything and open an undo window. Returns `None` if the
    /// collection was already empty or undo is disabled; either way any
    /// older pending undo is dropped.
    pub fn clear_all_with_undo(&mut self, now_ms: f64) -> Option<UndoTicket> {
        let snapshot = self.store.entities().to_vec();
        self.store.clear_all();
        if snapshot.is_empty() {
            self.undo.cancel();
            return None;
        }
        self.arm_undo(snapshot, DestructiveAction::ClearAll, now_ms)
    }

    fn arm_undo(
        &mut self,
        snapshot: Vec<Entity>,
        action: DestructiveAction,
        now_ms: f64,
    ) -> Option<UndoTicket> {
        if !self.config.undo_enabled() {
            self.undo.cancel();
            return None;
        }
        Some(
            self.undo
                .begin(snapshot, action, self.config.undo_window_ms, now_ms),
        )
    }

    pub fn undo_last(&mut self, now_ms: f64) -> bool {
        self.undo.invoke(&mut self.store, now_ms)
    }
}

thread_local! {
    static SESSION: RefCell<Option<Session>> = const { RefCell::new(None) };
}

/// Install `session` as the live session, replacing any previous one.
pub fn install(session: Session) {
    SESSION.with(|s| {
        *s.borrow_mut() = Some(session);
    });
}

/// Drop the live session (tests use this to start clean).
pub fn teardown() {
    SESSION.with(|s| {
        *s.borrow_mut() = None;
    });
}

/// Execute a closure with mutable access to the live session, creating a
/// default one over an empty mirror if `init_tally` was never called.
pub fn with_session<F, R>(f: F) -> R
where
    F: FnOnce(&mut Session) -> R,
{
    SESSION.with(|s| {
        let mut slot = s.borrow_mut();
        let session = slot.get_or_insert_with(|| {
            Session::new(TallyConfig::default(), Box::new(MirroredStorage::new()))
        });
        f(session)
    })
}
