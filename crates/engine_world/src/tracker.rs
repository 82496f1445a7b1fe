//! The entity tracker: every column, every archetype group, and the
//! lifecycle state machine that moves entities between them.
//!
//! All structural state sits behind one reader/writer lock. Queries gather
//! under the shared lock and write back under the exclusive one; every
//! structural operation takes the exclusive lock.
//!
//! Entity creation and destruction are two-phase:
//!
//! - [`Tracker::create_with`] builds an entity in the **nursery**, where no
//!   query can see it, until [`Tracker::graduate`] merges it into main storage.
//! - [`Tracker::kill_entity`] only marks an entity as **doomed**; it stays
//!   fully queryable until [`Tracker::finalize_kills`] removes it.
//!
//! Lifecycle hooks run while the exclusive lock is held and must not call
//! back into the tracker.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::panic::Location;
use std::time::Duration;

use engine_component::{
    Component, ComponentStore, ComponentTypeId, Context, EcsError, Entity, EntityAllocator, Hooks,
    Signature, Store, violation,
};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use crate::bundle::Bundle;
use crate::storage::Storage;
use crate::timing::Timing;

/// Structural state guarded by the tracker lock.
pub(crate) struct TrackerState {
    pub(crate) main: Storage,
    pub(crate) nursery: Storage,
    doomed: BTreeSet<Entity>,
    allocator: EntityAllocator,
    names: HashMap<ComponentTypeId, &'static str>,
}

impl TrackerState {
    /// The storage currently holding `entity`, main first.
    fn holding(&self, entity: Entity) -> Option<&Storage> {
        if self.main.contains(entity) {
            Some(&self.main)
        } else if self.nursery.contains(entity) {
            Some(&self.nursery)
        } else {
            None
        }
    }

    #[track_caller]
    fn holding_mut(&mut self, entity: Entity) -> &mut Storage {
        if self.main.contains(entity) {
            &mut self.main
        } else if self.nursery.contains(entity) {
            &mut self.nursery
        } else {
            violation(EcsError::UnknownEntity(entity))
        }
    }
}

/// Owns all component storage and the entity lifecycle.
pub struct Tracker {
    state: RwLock<TrackerState>,
    exec_times: Mutex<BTreeMap<&'static Location<'static>, Timing>>,
}

impl Tracker {
    /// Create a tracker with no registered component types.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: RwLock::new(TrackerState {
                main: Storage::new(),
                nursery: Storage::new(),
                doomed: BTreeSet::new(),
                allocator: EntityAllocator::new(),
                names: HashMap::new(),
            }),
            exec_times: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, TrackerState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, TrackerState> {
        self.state.write()
    }

    pub(crate) fn record_exec(&self, caller: &'static Location<'static>, elapsed: Duration) {
        self.exec_times.lock().entry(caller).or_default().record(elapsed);
    }

    // ── Registration ───────────────────────────────────────────────────

    /// Register the column for `T` with no-op lifecycle hooks.
    pub fn add_source<T: Component>(&self) {
        self.add_source_with_hooks::<T>(Hooks::new());
    }

    /// Register the column for `T` with the given lifecycle hooks.
    ///
    /// Registering the same type again is a no-op that keeps the original
    /// hooks. A different type hashing to the same id is fatal.
    #[track_caller]
    pub fn add_source_with_hooks<T: Component>(&self, hooks: Hooks<T>) {
        let ty = T::component_type_id();
        let mut state = self.write();

        if let Some(&existing) = state.names.get(&ty) {
            let same_type = state.main.column(ty).as_any().is::<T::Store>();
            if existing != T::type_name() || !same_type {
                violation(EcsError::TypeIdCollision {
                    id: ty,
                    existing,
                    incoming: T::type_name(),
                });
            }
            debug!(component = T::type_name(), "component already registered");
            return;
        }

        let column = <T::Store as Store>::with_hooks(hooks);
        state.nursery.register(column.empty_like());
        state.main.register(Box::new(column));
        state.names.insert(ty, T::type_name());
        info!(
            component = T::type_name(),
            type_id = %ty,
            multi = <T::Store as Store>::MULTI,
            "registered component"
        );
    }

    /// Whether a column is registered for `T`.
    #[must_use]
    pub fn has_source<T: Component>(&self) -> bool {
        self.read().main.has_column(T::component_type_id())
    }

    /// Registered type names keyed by id.
    #[must_use]
    pub fn type_names(&self) -> HashMap<ComponentTypeId, &'static str> {
        self.read().names.clone()
    }

    // ── Lifecycle ──────────────────────────────────────────────────────

    /// Create `count` entities with default-valued components directly in
    /// main storage and return the first id. The ids are contiguous.
    ///
    /// Init hooks run for every type on every new entity. Fatal if a type in
    /// `signature` is unregistered or a non-multi type repeats.
    ///
    /// A `count` of zero allocates nothing and returns [`Entity::INVALID`].
    #[track_caller]
    pub fn create(&self, ctx: &mut Context, signature: &Signature, count: usize) -> Entity {
        let mut state = self.write();
        state.main.validate(signature);
        if count == 0 {
            return Entity::INVALID;
        }

        let first = state.allocator.allocate_range(count as u64);
        let ids: Vec<Entity> = (0..count as u64).map(|i| first.offset(i)).collect();

        for ty in signature.distinct() {
            let instances = signature.count(ty);
            let column = state.main.column_mut(ty);
            column.reserve(count * instances);
            for &id in &ids {
                for _ in 0..instances {
                    column.add(id);
                }
            }
        }
        state.main.place_all(&ids, signature);

        for ty in signature.distinct() {
            let column = state.main.column_mut(ty);
            for &id in &ids {
                column.init_component(ctx, id);
            }
        }

        debug!(count, first = %first, signature = %signature, "created entities");
        first
    }

    /// Build one entity from `bundle` in the nursery and return its id.
    ///
    /// The entity is invisible to queries until the next [`graduate`](Self::graduate).
    #[track_caller]
    pub fn create_with<B: Bundle>(&self, ctx: &mut Context, bundle: B) -> Entity {
        let signature = B::signature();
        let mut state = self.write();
        state.nursery.validate(&signature);

        let id = state.allocator.allocate();
        bundle.push_into(&mut state.nursery, id);
        for ty in signature.distinct() {
            state.nursery.column_mut(ty).init_component(ctx, id);
        }
        state.nursery.place(id, signature);
        id
    }

    /// Attach `value` to `entity`, moving it to the group for its new signature.
    ///
    /// Works on main and nursery entities alike. Fatal if the entity is
    /// unknown or already holds a non-multi `T`.
    #[track_caller]
    pub fn add_component<T: Component>(&self, ctx: &mut Context, entity: Entity, value: T) {
        let ty = T::component_type_id();
        let mut state = self.write();
        let storage = state.holding_mut(entity);

        let Some(signature) = storage.signature_of(entity).map(|s| s.with(ty)) else {
            violation(EcsError::UnknownEntity(entity));
        };
        storage.validate(&signature);

        let column = storage.typed_mut::<T>();
        column.push(entity, value);
        column.init_newest(ctx, entity);
        storage.relocate(entity, signature);
    }

    /// Detach every `T` from `entity`, running the delete hook first.
    ///
    /// Fatal if the entity is unknown or holds no `T`.
    #[track_caller]
    pub fn remove_component<T: Component>(&self, ctx: &mut Context, entity: Entity) {
        let ty = T::component_type_id();
        let mut state = self.write();
        let storage = state.holding_mut(entity);

        let Some(current) = storage.signature_of(entity) else {
            violation(EcsError::UnknownEntity(entity));
        };
        if !current.contains(ty) {
            violation(EcsError::MissingComponent {
                name: T::type_name(),
                entity,
            });
        }
        let signature = current.without(ty);

        let column = storage.column_mut(ty);
        column.delete_component(ctx, entity);
        column.remove(entity);
        storage.relocate(entity, signature);
    }

    /// Mark `entity` for removal at the next [`finalize_kills`](Self::finalize_kills).
    pub fn kill_entity(&self, entity: Entity) {
        self.write().doomed.insert(entity);
    }

    /// Remove every doomed entity, running delete hooks for each of its
    /// components first. Returns how many were removed.
    ///
    /// Ids that are no longer stored anywhere are skipped with a warning.
    pub fn finalize_kills(&self, ctx: &mut Context) -> usize {
        let mut state = self.write();
        let doomed = std::mem::take(&mut state.doomed);
        let mut removed = 0;

        for entity in doomed {
            let storage = if state.main.contains(entity) {
                &mut state.main
            } else if state.nursery.contains(entity) {
                &mut state.nursery
            } else {
                warn!(entity = %entity, "kill requested for unknown entity");
                continue;
            };
            let Some(signature) = storage.forget(entity) else {
                continue;
            };
            for ty in signature.distinct() {
                let column = storage.column_mut(ty);
                column.delete_component(ctx, entity);
                column.remove(entity);
            }
            removed += 1;
        }

        if removed > 0 {
            debug!(removed, "finalized kills");
        }
        removed
    }

    /// Merge the nursery into main storage. Returns how many entities moved.
    pub fn graduate(&self) -> usize {
        let mut state = self.write();
        let moved = state.nursery.entity_count();
        if moved == 0 {
            return 0;
        }
        let TrackerState { main, nursery, .. } = &mut *state;
        main.graduate_from(nursery);
        debug!(moved, "graduated nursery");
        moved
    }

    // ── Inspection ─────────────────────────────────────────────────────

    /// Whether `entity` is stored in main storage or the nursery.
    ///
    /// Doomed entities stay alive until their kill is finalized.
    #[must_use]
    pub fn alive(&self, entity: Entity) -> bool {
        self.read().holding(entity).is_some()
    }

    /// The current signature of `entity`, if it is alive.
    #[must_use]
    pub fn signature_of(&self, entity: Entity) -> Option<Signature> {
        let state = self.read();
        state
            .holding(entity)
            .and_then(|storage| storage.signature_of(entity))
            .cloned()
    }

    /// A copy of what `entity` holds of `T`: the component, or for multi
    /// types every instance.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> Option<<T::Store as Store>::Value> {
        let state = self.read();
        let storage = state.holding(entity)?;
        if !storage.has_column(T::component_type_id()) {
            return None;
        }
        storage.typed::<T>().value_of(entity)
    }

    /// Overwrite what `entity` holds of `T`. The arity must match exactly.
    #[track_caller]
    pub fn set<T: Component>(&self, entity: Entity, value: <T::Store as Store>::Value) {
        let mut state = self.write();
        state.holding_mut(entity).typed_mut::<T>().set_value(entity, value);
    }

    /// Number of entities in main storage.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.read().main.entity_count()
    }

    /// Number of entities waiting in the nursery.
    #[must_use]
    pub fn nursery_count(&self) -> usize {
        self.read().nursery.entity_count()
    }

    /// Number of entities marked for removal.
    #[must_use]
    pub fn doomed_count(&self) -> usize {
        self.read().doomed.len()
    }

    /// Number of archetype groups in main storage.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.read().main.groups().len()
    }

    /// Ids in main storage whose signature is a superset of `signature`.
    #[must_use]
    pub fn matching(&self, signature: &Signature) -> Vec<Entity> {
        self.read().main.matching(signature)
    }

    /// Verify every storage invariant, plus that no entity is in both main
    /// storage and the nursery.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn check_consistency(&self) -> Result<(), EcsError> {
        let state = self.read();
        state.main.check_consistency()?;
        state.nursery.check_consistency()?;
        for (_, members) in state.nursery.groups().iter() {
            if let Some(&entity) = members.iter().find(|e| state.main.contains(**e)) {
                return Err(EcsError::IndexCorruption {
                    name: "tracker",
                    detail: format!("{entity} is in both main storage and the nursery"),
                });
            }
        }
        Ok(())
    }

    /// Log every archetype group at debug level.
    pub fn dump(&self) {
        let state = self.read();
        debug!(
            entities = state.main.entity_count(),
            groups = state.main.groups().len(),
            nursery = state.nursery.entity_count(),
            doomed = state.doomed.len(),
            "tracker state"
        );
        for (signature, members) in state.main.groups().iter() {
            debug!(
                signature = %signature.display(&state.names),
                entities = members.len(),
                "archetype group"
            );
        }
    }

    /// Timing of query gather and writeback, keyed by the source location
    /// of each [`Exec::run`](crate::Exec::run) call.
    #[must_use]
    pub fn exec_times(&self) -> BTreeMap<&'static Location<'static>, Timing> {
        self.exec_times.lock().clone()
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Tracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.read();
        f.debug_struct("Tracker")
            .field("main", &state.main)
            .field("nursery", &state.nursery)
            .field("doomed", &state.doomed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use engine_component::{Column, MultiColumn, signature};

    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }

    impl Component for Position {
        type Store = Column<Self>;

        fn type_name() -> &'static str {
            "Position"
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Health(i32);

    impl Component for Health {
        type Store = Column<Self>;

        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Marker(u32);

    impl Component for Marker {
        type Store = MultiColumn<Self>;

        fn type_name() -> &'static str {
            "Marker"
        }
    }

    fn tracker() -> Tracker {
        let tracker = Tracker::new();
        tracker.add_source::<Position>();
        tracker.add_source::<Health>();
        tracker.add_source::<Marker>();
        tracker
    }

    #[test]
    fn test_create_allocates_contiguous_ids() {
        let tracker = tracker();
        let first = tracker.create(&mut (), &signature![Position, Health], 3);

        assert_eq!(tracker.entity_count(), 3);
        assert_eq!(tracker.group_count(), 1);
        for i in 0..3 {
            let id = first.offset(i);
            assert!(tracker.alive(id));
            assert_eq!(tracker.get::<Position>(id), Some(Position::default()));
        }
        tracker.check_consistency().unwrap();
    }

    #[test]
    fn test_create_zero_allocates_nothing() {
        let tracker = tracker();
        let none = tracker.create(&mut (), &signature![Health], 0);

        assert_eq!(none, Entity::INVALID);
        assert!(!tracker.alive(none));
        assert_eq!(tracker.group_count(), 0);
        assert_eq!(tracker.entity_count(), 0);

        let first = tracker.create(&mut (), &signature![Health], 1);
        assert_ne!(first, none);
        assert!(first.is_valid());
        assert_eq!(tracker.group_count(), 1);
        tracker.check_consistency().unwrap();
    }

    #[test]
    fn test_create_runs_init_hooks() {
        let tracker = Tracker::new();
        tracker.add_source_with_hooks(Hooks::<Health>::new().on_init(|_, _, h| h.0 = 100));

        let first = tracker.create(&mut (), &signature![Health], 2);

        assert_eq!(tracker.get::<Health>(first), Some(Health(100)));
        assert_eq!(tracker.get::<Health>(first.offset(1)), Some(Health(100)));
    }

    #[test]
    fn test_create_with_waits_for_graduation() {
        let tracker = tracker();
        let id = tracker.create_with(&mut (), (Position { x: 1.0, y: 2.0 },));

        assert!(tracker.alive(id));
        assert_eq!(tracker.entity_count(), 0);
        assert_eq!(tracker.nursery_count(), 1);
        assert!(tracker.matching(&signature![Position]).is_empty());

        assert_eq!(tracker.graduate(), 1);
        assert_eq!(tracker.matching(&signature![Position]), vec![id]);
        assert_eq!(tracker.get::<Position>(id), Some(Position { x: 1.0, y: 2.0 }));
        assert_eq!(tracker.nursery_count(), 0);
        tracker.check_consistency().unwrap();
    }

    #[test]
    #[should_panic(expected = "not multi")]
    fn test_create_with_duplicate_single_type_is_fatal() {
        let tracker = tracker();
        tracker.create_with(&mut (), (Health(1), Health(2)));
    }

    #[test]
    #[should_panic(expected = "no column registered")]
    fn test_create_with_unregistered_type_is_fatal() {
        let tracker = Tracker::new();
        tracker.create(&mut (), &signature![Position], 1);
    }

    #[test]
    fn test_add_and_remove_component_relocate() {
        let tracker = tracker();
        let id = tracker.create(&mut (), &signature![Position], 1);

        tracker.add_component(&mut (), id, Health(5));
        assert_eq!(tracker.signature_of(id), Some(signature![Position, Health]));
        assert_eq!(tracker.group_count(), 1);

        tracker.remove_component::<Position>(&mut (), id);
        assert_eq!(tracker.signature_of(id), Some(signature![Health]));
        assert_eq!(tracker.get::<Position>(id), None);
        assert_eq!(tracker.get::<Health>(id), Some(Health(5)));
        tracker.check_consistency().unwrap();
    }

    #[test]
    fn test_multi_component_add_and_remove() {
        let tracker = tracker();
        let id = tracker.create_with(&mut (), (Marker(1), Marker(2)));
        tracker.add_component(&mut (), id, Marker(3));

        assert_eq!(tracker.signature_of(id).unwrap().count(Marker::component_type_id()), 3);
        assert_eq!(tracker.get::<Marker>(id), Some(vec![Marker(1), Marker(2), Marker(3)]));

        tracker.set::<Marker>(id, vec![Marker(7), Marker(8), Marker(9)]);
        assert_eq!(tracker.get::<Marker>(id), Some(vec![Marker(7), Marker(8), Marker(9)]));

        tracker.remove_component::<Marker>(&mut (), id);
        assert_eq!(tracker.signature_of(id), Some(Signature::new()));
        tracker.check_consistency().unwrap();
    }

    #[test]
    #[should_panic(expected = "appears more than once")]
    fn test_add_duplicate_component_is_fatal() {
        let tracker = tracker();
        let id = tracker.create(&mut (), &signature![Health], 1);
        tracker.add_component(&mut (), id, Health(2));
    }

    #[test]
    fn test_kill_is_deferred_until_finalize() {
        let deletes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&deletes);
        let tracker = Tracker::new();
        tracker.add_source_with_hooks(Hooks::<Health>::new().on_delete(move |_, _, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let first = tracker.create(&mut (), &signature![Health], 3);

        tracker.kill_entity(first);
        tracker.kill_entity(first.offset(2));
        assert_eq!(tracker.doomed_count(), 2);
        assert!(tracker.alive(first));
        assert_eq!(tracker.matching(&signature![Health]).len(), 3);

        assert_eq!(tracker.finalize_kills(&mut ()), 2);
        assert!(!tracker.alive(first));
        assert!(tracker.alive(first.offset(1)));
        assert_eq!(tracker.doomed_count(), 0);
        assert_eq!(deletes.load(Ordering::SeqCst), 2);
        tracker.check_consistency().unwrap();
    }

    #[test]
    fn test_finalize_skips_unknown_and_handles_nursery() {
        let tracker = tracker();
        let id = tracker.create_with(&mut (), (Position::default(),));

        tracker.kill_entity(id);
        tracker.kill_entity(Entity(999));

        assert_eq!(tracker.finalize_kills(&mut ()), 1);
        assert!(!tracker.alive(id));
        assert_eq!(tracker.graduate(), 0);
        tracker.check_consistency().unwrap();
    }

    #[test]
    fn test_add_source_is_idempotent() {
        let tracker = tracker();
        tracker.add_source::<Position>();
        assert!(tracker.has_source::<Position>());
        assert_eq!(tracker.type_names().len(), 3);
    }

    #[test]
    #[should_panic(expected = "is shared by")]
    fn test_type_id_collision_is_fatal() {
        #[derive(Debug, Clone, Default)]
        struct Impostor;

        impl Component for Impostor {
            type Store = Column<Self>;

            fn type_name() -> &'static str {
                "Position"
            }
        }

        let tracker = tracker();
        tracker.add_source::<Impostor>();
    }
}
