//! Change tracker: the identity map of one unit of work.
//!
//! Entries are keyed by (entity type, primary key). Tracking an instance
//! whose key is already present is idempotent and hands back the instance
//! that was tracked first, so every query in a session observes one
//! instance per identity.

use chrono::Utc;
use rawsql_core::{Entity, EntityKey, MaterializationError, RawSqlResult, Timestamp, Value};
use std::any::Any;
use std::collections::HashMap;
use tracing::debug;

/// State of an entity relative to a change tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityState {
    /// Not tracked.
    Detached,
    /// Tracked as loaded, with no pending changes.
    Unchanged,
}

/// Public view of a tracked entry.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    pub key: EntityKey,
    pub state: EntityState,
    pub tracked_at: Timestamp,
}

struct TrackedEntry {
    instance: Box<dyn Any + Send + Sync>,
    state: EntityState,
    tracked_at: Timestamp,
    sequence: u64,
}

/// Identity map owned by a session.
#[derive(Default)]
pub struct ChangeTracker {
    entries: HashMap<EntityKey, TrackedEntry>,
    next_sequence: u64,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track an entity, resolving identity against existing entries.
    ///
    /// Returns the already-tracked instance when the key is present,
    /// otherwise stores and returns `entity`.
    pub fn track<T: Entity>(&mut self, entity: T) -> RawSqlResult<T> {
        let key = entity.entity_key();
        if let Some(tracked) = self.lookup::<T>(&key)? {
            return Ok(tracked);
        }
        self.insert(key, Box::new(entity.clone()));
        Ok(entity)
    }

    /// Tracked instance for `key`, without tracking anything.
    ///
    /// Fails with `IdentityConflict` when the key is tracked under another
    /// Rust type.
    pub fn lookup<T: Entity>(&self, key: &EntityKey) -> RawSqlResult<Option<T>> {
        match self.entries.get(key) {
            Some(entry) => entry
                .instance
                .downcast_ref::<T>()
                .cloned()
                .map(Some)
                .ok_or_else(|| MaterializationError::IdentityConflict { key: key.clone() }.into()),
            None => Ok(None),
        }
    }

    /// Apply a batch staged by [`PendingTracking`]. New keys are tracked in
    /// staging order; already-tracked keys get the staged instance. Returns
    /// how many entries were added.
    pub fn commit(&mut self, staged: StagedEntries) -> usize {
        let StagedEntries { mut instances, order } = staged;
        let mut added = 0;
        for key in order {
            let Some(instance) = instances.remove(&key) else {
                continue;
            };
            match self.entries.get_mut(&key) {
                Some(entry) => entry.instance = instance,
                None => {
                    self.insert(key, instance);
                    added += 1;
                }
            }
        }
        added
    }

    fn insert(&mut self, key: EntityKey, instance: Box<dyn Any + Send + Sync>) {
        debug!(%key, "tracking entity");
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.entries.insert(
            key,
            TrackedEntry {
                instance,
                state: EntityState::Unchanged,
                tracked_at: Utc::now(),
                sequence,
            },
        );
    }

    /// Replace the stored instance of an already-tracked entity, e.g. after
    /// its navigations were loaded. Returns whether the entity was tracked.
    pub fn refresh<T: Entity>(&mut self, entity: &T) -> RawSqlResult<bool> {
        let key = entity.entity_key();
        match self.entries.get_mut(&key) {
            Some(entry) if entry.instance.is::<T>() => {
                entry.instance = Box::new(entity.clone());
                Ok(true)
            }
            Some(_) => Err(MaterializationError::IdentityConflict { key }.into()),
            None => Ok(false),
        }
    }

    /// Find a tracked entity by primary key.
    pub fn find<T: Entity>(&self, key: impl Into<Value>) -> Option<T> {
        let key = EntityKey::new(T::ENTITY_NAME, key.into());
        self.entries
            .get(&key)
            .and_then(|entry| entry.instance.downcast_ref::<T>())
            .cloned()
    }

    pub fn is_tracked(&self, key: &EntityKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn state_of(&self, key: &EntityKey) -> EntityState {
        self.entries
            .get(key)
            .map(|entry| entry.state)
            .unwrap_or(EntityState::Detached)
    }

    /// Number of distinct tracked entities.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of tracked entities of one type.
    pub fn entries_of<T: Entity>(&self) -> usize {
        self.entries
            .keys()
            .filter(|key| key.entity() == T::ENTITY_NAME)
            .count()
    }

    /// Tracked entries in the order they were first tracked.
    pub fn entries(&self) -> Vec<EntryInfo> {
        let mut listed: Vec<(&EntityKey, &TrackedEntry)> = self.entries.iter().collect();
        listed.sort_by_key(|(_, entry)| entry.sequence);
        listed
            .into_iter()
            .map(|(key, entry)| EntryInfo {
                key: key.clone(),
                state: entry.state,
                tracked_at: entry.tracked_at,
            })
            .collect()
    }

    /// Stop tracking everything. Returns how many entries were dropped.
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }
}

/// Entities a query resolved against a tracker but has not tracked yet.
///
/// Identity resolution sees both the tracker and everything staged so far,
/// so a batch behaves like a series of [`ChangeTracker::track`] calls that
/// only take effect on [`ChangeTracker::commit`]. Dropping the batch leaves
/// the tracker unchanged.
pub struct PendingTracking<'t> {
    tracker: &'t ChangeTracker,
    staged: StagedEntries,
}

/// Owned result of a [`PendingTracking`] batch, ready to commit.
#[derive(Default)]
pub struct StagedEntries {
    instances: HashMap<EntityKey, Box<dyn Any + Send + Sync>>,
    order: Vec<EntityKey>,
}

impl<'t> PendingTracking<'t> {
    pub fn new(tracker: &'t ChangeTracker) -> Self {
        Self {
            tracker,
            staged: StagedEntries::default(),
        }
    }

    /// Resolve `entity` like [`ChangeTracker::track`] would, staging it when
    /// its identity is new.
    pub fn stage<T: Entity>(&mut self, entity: T) -> RawSqlResult<T> {
        let key = entity.entity_key();
        if let Some(tracked) = self.tracker.lookup::<T>(&key)? {
            return Ok(tracked);
        }
        if let Some(staged) = self.staged.instances.get(&key) {
            return staged
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| MaterializationError::IdentityConflict { key }.into());
        }
        self.staged.instances.insert(key.clone(), Box::new(entity.clone()));
        self.staged.order.push(key);
        Ok(entity)
    }

    /// Stage the final instance of an entity resolved earlier, e.g. after
    /// its navigations were loaded.
    pub fn update<T: Entity>(&mut self, entity: &T) {
        let key = entity.entity_key();
        if !self.staged.instances.contains_key(&key) {
            self.staged.order.push(key.clone());
        }
        self.staged.instances.insert(key, Box::new(entity.clone()));
    }

    /// Number of identities this batch would add or replace.
    pub fn len(&self) -> usize {
        self.staged.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.staged.order.is_empty()
    }

    pub fn into_staged(self) -> StagedEntries {
        self.staged
    }
}

impl std::fmt::Debug for ChangeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeTracker")
            .field("entry_count", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rawsql_core::{RawSqlError, Row, RowReader};

    #[derive(Debug, Clone, PartialEq)]
    struct Supplier {
        id: i64,
        name: String,
    }

    impl Entity for Supplier {
        const ENTITY_NAME: &'static str = "Supplier";
        const TABLE: &'static str = "Suppliers";

        fn primary_key(&self) -> Value {
            Value::Int(self.id)
        }

        fn from_row(row: &Row) -> RawSqlResult<Self> {
            let r = RowReader::new(row, Self::ENTITY_NAME);
            Ok(Self {
                id: r.int("SupplierID")?,
                name: r.text("CompanyName")?,
            })
        }

        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "SupplierID" => Some(Value::Int(self.id)),
                "CompanyName" => Some(Value::from(self.name.clone())),
                _ => None,
            }
        }
    }

    // Same entity name as `Supplier`, different Rust type.
    #[derive(Debug, Clone)]
    struct Impostor(i64);

    impl Entity for Impostor {
        const ENTITY_NAME: &'static str = "Supplier";
        const TABLE: &'static str = "Suppliers";

        fn primary_key(&self) -> Value {
            Value::Int(self.0)
        }

        fn from_row(row: &Row) -> RawSqlResult<Self> {
            Ok(Self(RowReader::new(row, Self::ENTITY_NAME).int("SupplierID")?))
        }

        fn field(&self, _name: &str) -> Option<Value> {
            None
        }
    }

    fn supplier(id: i64, name: &str) -> Supplier {
        Supplier {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_track_is_idempotent_and_resolves_identity() {
        let mut tracker = ChangeTracker::new();
        let first = tracker.track(supplier(1, "Exotic Liquids")).unwrap();
        let again = tracker.track(supplier(1, "Renamed In Database")).unwrap();

        assert_eq!(tracker.entry_count(), 1);
        assert_eq!(again, first);
        assert_eq!(again.name, "Exotic Liquids");
    }

    #[test]
    fn test_find_state_and_listing() {
        let mut tracker = ChangeTracker::new();
        tracker.track(supplier(2, "New Orleans Cajun Delights")).unwrap();
        tracker.track(supplier(1, "Exotic Liquids")).unwrap();

        assert_eq!(tracker.find::<Supplier>(1i64).unwrap().name, "Exotic Liquids");
        assert!(tracker.find::<Supplier>(3i64).is_none());

        let key = EntityKey::new("Supplier", Value::Int(2));
        assert!(tracker.is_tracked(&key));
        assert_eq!(tracker.state_of(&key), EntityState::Unchanged);
        assert_eq!(
            tracker.state_of(&EntityKey::new("Supplier", Value::Int(9))),
            EntityState::Detached
        );

        let listed: Vec<Value> = tracker.entries().into_iter().map(|e| e.key.key().clone()).collect();
        assert_eq!(listed, vec![Value::Int(2), Value::Int(1)]);
        assert_eq!(tracker.entries_of::<Supplier>(), 2);
    }

    #[test]
    fn test_refresh_replaces_tracked_instance_only() {
        let mut tracker = ChangeTracker::new();
        tracker.track(supplier(1, "Exotic Liquids")).unwrap();

        assert!(tracker.refresh(&supplier(1, "Exotic Liquids Ltd")).unwrap());
        assert!(!tracker.refresh(&supplier(5, "Untracked")).unwrap());
        assert_eq!(tracker.find::<Supplier>(1i64).unwrap().name, "Exotic Liquids Ltd");
        assert_eq!(tracker.entry_count(), 1);
    }

    #[test]
    fn test_identity_conflict_between_types() {
        let mut tracker = ChangeTracker::new();
        tracker.track(supplier(1, "Exotic Liquids")).unwrap();
        let err = tracker.track(Impostor(1)).unwrap_err();
        assert!(matches!(
            err,
            RawSqlError::Materialization(MaterializationError::IdentityConflict { .. })
        ));
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut tracker = ChangeTracker::new();
        tracker.track(supplier(1, "a")).unwrap();
        tracker.track(supplier(2, "b")).unwrap();
        assert_eq!(tracker.clear(), 2);
        assert_eq!(tracker.entry_count(), 0);
    }

    #[test]
    fn test_pending_batch_resolves_without_tracking() {
        let mut tracker = ChangeTracker::new();
        tracker.track(supplier(1, "Exotic Liquids")).unwrap();

        let mut pending = PendingTracking::new(&tracker);
        let resolved = pending.stage(supplier(1, "Renamed In Database")).unwrap();
        let fresh = pending.stage(supplier(2, "Tokyo Traders")).unwrap();
        let duplicate = pending.stage(supplier(2, "Tokyo Traders Again")).unwrap();

        assert_eq!(resolved.name, "Exotic Liquids");
        assert_eq!(duplicate, fresh);
        assert_eq!(pending.len(), 1);
        drop(pending);

        assert_eq!(tracker.entry_count(), 1);
        assert!(tracker.find::<Supplier>(2i64).is_none());
    }

    #[test]
    fn test_commit_adds_new_and_replaces_updated_entries() {
        let mut tracker = ChangeTracker::new();
        tracker.track(supplier(1, "Exotic Liquids")).unwrap();

        let mut pending = PendingTracking::new(&tracker);
        pending.stage(supplier(3, "Grandma Kelly's Homestead")).unwrap();
        pending.stage(supplier(2, "Tokyo Traders")).unwrap();
        pending.update(&supplier(1, "Exotic Liquids Ltd"));
        let staged = pending.into_staged();

        assert_eq!(tracker.commit(staged), 2);
        assert_eq!(tracker.entry_count(), 3);
        assert_eq!(tracker.find::<Supplier>(1i64).unwrap().name, "Exotic Liquids Ltd");

        let listed: Vec<Value> = tracker.entries().into_iter().map(|e| e.key.key().clone()).collect();
        assert_eq!(listed, vec![Value::Int(1), Value::Int(3), Value::Int(2)]);
    }

    #[test]
    fn test_pending_batch_reports_identity_conflicts() {
        let mut tracker = ChangeTracker::new();
        tracker.track(supplier(1, "Exotic Liquids")).unwrap();

        let mut pending = PendingTracking::new(&tracker);
        assert!(pending.stage(Impostor(1)).is_err());
        pending.stage(supplier(4, "Cooperativa de Quesos")).unwrap();
        assert!(matches!(
            pending.stage(Impostor(4)).unwrap_err(),
            RawSqlError::Materialization(MaterializationError::IdentityConflict { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_entry_count_equals_distinct_keys(ids in prop::collection::vec(0i64..20, 0..60)) {
            let mut tracker = ChangeTracker::new();
            for id in &ids {
                tracker.track(supplier(*id, "s")).unwrap();
            }
            let distinct: std::collections::HashSet<i64> = ids.iter().copied().collect();
            prop_assert_eq!(tracker.entry_count(), distinct.len());
        }
    }
}
