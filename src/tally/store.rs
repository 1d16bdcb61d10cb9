//! Authoritative entity collection with write-through persistence.
//!
//! The collection is stored under a single key as a JSON array of
//! `{"name": ..., "count": ...}` records. Every mutating call persists the
//! whole array before returning. Storage failures never reach the caller:
//! a bad read falls back to an empty collection and a failed write is
//! logged while the in-memory copy keeps serving the session.

use log::{debug, error, warn};

use crate::tally::entity::Entity;
use crate::tally::error::{Result, TallyError};
use crate::tally::storage::{KeyValueStorage, StorageOp};

pub struct EntityStore {
    key: String,
    storage: Box<dyn KeyValueStorage>,
    entities: Vec<Entity>,
}

impl EntityStore {
    /// Create a store over `key` and hydrate it from `storage`.
    pub fn new(key: impl Into<String>, storage: Box<dyn KeyValueStorage>) -> Self {
        let mut store = Self {
            key: key.into(),
            storage,
            entities: Vec::new(),
        };
        store.load();
        store
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Hand back the storage backend, e.g. to reopen it as a fresh store.
    pub fn into_storage(self) -> Box<dyn KeyValueStorage> {
        self.storage
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Reload from storage. Absent, empty or malformed data yields an empty collection.
    pub fn load(&mut self) {
        self.entities = match self.read() {
            Ok(entities) => entities,
            Err(e) => {
                warn!("discarding stored '{}' collection: {}", self.key, e);
                Vec::new()
            }
        };
    }

    fn read(&self) -> Result<Vec<Entity>> {
        match self.storage.get(&self.key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(parse_collection(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    /// Write the full collection in one `set`. Failures are logged, not retried.
    pub fn save(&mut self) {
        if let Err(e) = self.write() {
            error!("failed to persist '{}' collection: {}", self.key, e);
        }
    }

    fn write(&mut self) -> Result<()> {
        let json = self.to_json()?;
        self.storage.set(&self.key, &json)?;
        Ok(())
    }

    /// Writes the host still has to apply to its own storage.
    pub fn take_storage_ops(&mut self) -> Vec<StorageOp> {
        self.storage.take_ops()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.entities).map_err(TallyError::from)
    }

    // ── Mutations ──────────────────────────────────────────────────

    /// Append a new entity with count 0. Returns false for a blank or duplicate name.
    pub fn add(&mut self, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() || self.get(name).is_some() {
            return false;
        }
        self.entities.push(Entity::new(name));
        self.save();
        true
    }

    /// Set the count of `name`. Unknown names are ignored.
    pub fn set_count(&mut self, name: &str, value: u32) {
        match self.entities.iter_mut().find(|e| e.name == name) {
            Some(entity) => {
                entity.count = value;
                self.save();
            }
            None => debug!("set_count: no entity named '{}'", name),
        }
    }

    pub fn remove(&mut self, name: &str) {
        let before = self.entities.len();
        self.entities.retain(|e| e.name != name);
        if self.entities.len() == before {
            debug!("remove: no entity named '{}'", name);
        }
        self.save();
    }

    pub fn reset_all(&mut self) {
        for entity in &mut self.entities {
            entity.count = 0;
        }
        self.save();
    }

    /// Empty the collection and drop the storage key entirely.
    pub fn clear_all(&mut self) {
        self.entities.clear();
        if let Err(e) = self.storage.remove(&self.key) {
            error!("failed to remove '{}' from storage: {}", self.key, e);
        }
    }

    /// Replace the whole collection (undo restore) and persist it.
    pub fn replace(&mut self, entities: Vec<Entity>) {
        self.entities = entities;
        self.save();
    }
}

/// Parse a stored collection, rejecting duplicate names.
fn parse_collection(raw: &str) -> Result<Vec<Entity>> {
    let entities: Vec<Entity> = serde_json::from_str(raw)?;
    for (i, entity) in entities.iter().enumerate() {
        if entities[..i].iter().any(|e| e.name == entity.name) {
            return Err(TallyError::Malformed(serde::de::Error::custom(format!(
                "duplicate entity name '{}'",
                entity.name
            ))));
        }
    }
    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tally::entity::CountAction;
    use crate::tally::storage::{MemoryStorage, MirroredStorage};

    fn empty_store() -> EntityStore {
        EntityStore::new("players", Box::new(MemoryStorage::new()))
    }

    fn stored(store: &EntityStore) -> Option<String> {
        store.storage.get(store.key()).unwrap()
    }

    fn names(store: &EntityStore) -> Vec<&str> {
        store.entities().iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn add_trims_and_rejects_blank() {
        let mut store = empty_store();
        assert!(store.add("  Alice  "));
        assert_eq!(names(&store), vec!["Alice"]);
        assert!(!store.add("   "));
        assert!(!store.add(""));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn add_twice_keeps_one() {
        let mut store = empty_store();
        assert!(store.add("Alice"));
        assert!(!store.add("Alice"));
        assert!(!store.add(" Alice "));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn names_are_case_sensitive() {
        let mut store = empty_store();
        assert!(store.add("alice"));
        assert!(store.add("Alice"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn alice_scenario() {
        let mut store = empty_store();
        assert!(store.add("Alice"));
        store.set_count("Alice", 3);
        assert!(!store.add("Alice"));
        assert_eq!(store.entities(), &[Entity { name: "Alice".into(), count: 3 }]);
        assert_eq!(stored(&store).as_deref(), Some(r#"[{"name":"Alice","count":3}]"#));
    }

    #[test]
    fn remove_preserves_order() {
        let mut store = empty_store();
        store.add("Bob");
        store.add("Ann");
        store.remove("Bob");
        assert_eq!(store.entities(), &[Entity::new("Ann")]);
        assert_eq!(stored(&store), Some(store.to_json().unwrap()));
    }

    #[test]
    fn remove_survives_reload() {
        let mut store = empty_store();
        store.add("Bob");
        store.add("Ann");
        store.set_count("Ann", 2);
        store.remove("Bob");

        let reopened = EntityStore::new("players", store.into_storage());
        assert_eq!(reopened.entities(), &[Entity { name: "Ann".into(), count: 2 }]);
    }

    #[test]
    fn unknown_names_are_ignored() {
        let mut store = empty_store();
        store.add("Ann");
        store.set_count("Nobody", 9);
        store.remove("Nobody");
        assert_eq!(store.entities(), &[Entity::new("Ann")]);
    }

    #[test]
    fn decrement_never_goes_below_zero() {
        let mut store = empty_store();
        store.add("Ann");
        store.set_count("Ann", 1);
        for _ in 0..3 {
            let current = store.get("Ann").unwrap().count;
            store.set_count("Ann", CountAction::Decrement.apply(current));
        }
        assert_eq!(store.get("Ann").unwrap().count, 0);
    }

    #[test]
    fn reset_all_keeps_names_and_order() {
        let mut store = empty_store();
        store.add("C");
        store.add("A");
        store.add("B");
        store.set_count("C", 4);
        store.set_count("B", 2);
        store.reset_all();
        assert_eq!(names(&store), vec!["C", "A", "B"]);
        assert!(store.entities().iter().all(|e| e.count == 0));
        assert_eq!(stored(&store), Some(store.to_json().unwrap()));
    }

    #[test]
    fn clear_all_removes_key() {
        let mut store = empty_store();
        store.add("Ann");
        assert!(stored(&store).is_some());
        store.clear_all();
        assert!(store.is_empty());
        assert_eq!(stored(&store), None);

        let reopened = EntityStore::new("players", store.into_storage());
        assert!(reopened.is_empty());
    }

    #[test]
    fn save_then_reload_roundtrip() {
        let mut store = empty_store();
        store.add("Zoë 🎲");
        store.add("Ann");
        store.add("\"quoted\" <b>");
        store.set_count("Ann", 7);

        let expected = store.entities().to_vec();
        let reopened = EntityStore::new("players", store.into_storage());
        assert_eq!(reopened.entities(), expected.as_slice());
    }

    #[test]
    fn malformed_data_loads_empty() {
        for raw in ["not json", r#"{"name":"x"}"#, r#"[{"name":"x","count":-1}]"#, ""] {
            let storage = MemoryStorage::new().with_item("players", raw);
            let store = EntityStore::new("players", Box::new(storage));
            assert!(store.is_empty(), "expected empty for {:?}", raw);
        }
    }

    #[test]
    fn duplicate_names_in_storage_are_malformed() {
        let raw = r#"[{"name":"A","count":1},{"name":"A","count":2}]"#;
        let storage = MemoryStorage::new().with_item("players", raw);
        let store = EntityStore::new("players", Box::new(storage));
        assert!(store.is_empty());
    }

    #[test]
    fn stores_with_different_keys_are_independent() {
        let storage = MemoryStorage::new().with_item("counters", r#"[{"name":"Laps","count":2}]"#);
        let store = EntityStore::new("players", Box::new(storage));
        assert!(store.is_empty());
        let store = EntityStore::new("counters", store.into_storage());
        assert_eq!(store.get("Laps").map(|e| e.count), Some(2));
    }

    #[test]
    fn quota_failure_keeps_memory_state() {
        let mut store = EntityStore::new("players", Box::new(MemoryStorage::with_quota(40)));
        assert!(store.add("Ann"));
        assert!(store.add("A name long enough to blow the quota"));
        assert_eq!(store.len(), 2);
        // Storage still holds the last write that fit
        assert_eq!(stored(&store).as_deref(), Some(r#"[{"name":"Ann","count":0}]"#));
    }

    #[test]
    fn mutations_are_handed_to_the_host() {
        let mut store = EntityStore::new("players", Box::new(MirroredStorage::new()));
        store.add("Ann");
        store.set_count("Ann", 1);
        assert_eq!(
            store.take_storage_ops(),
            vec![StorageOp::Set {
                key: "players".into(),
                value: r#"[{"name":"Ann","count":1}]"#.into(),
            }]
        );
        store.clear_all();
        assert_eq!(
            store.take_storage_ops(),
            vec![StorageOp::Remove { key: "players".into() }]
        );
    }
}
