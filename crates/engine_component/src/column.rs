//! Dense, type-erased component columns.
//!
//! A column owns a dense array of one component type plus two index maps:
//! entity → array index and array index → entity. The maps are exact
//! inverses and the array never has holes; removal moves the last element
//! into the vacated slot.
//!
//! [`ComponentStore`] is the object-safe face the tracker works through.
//! [`Store`] adds the typed operations the query harness needs, and
//! [`Column`] is the one-instance-per-entity implementation. The
//! several-instances-per-entity flavour lives in
//! [`multi`](crate::multi::MultiColumn).

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::component::{Component, ComponentTypeId, Context, Hooks};
use crate::entity::Entity;
use crate::error::{EcsError, violation};

/// Type-erased column interface.
pub trait ComponentStore: Any + Send + Sync {
    /// Identifier of the stored component type.
    fn component_type(&self) -> ComponentTypeId;

    /// Name of the stored component type.
    fn type_name(&self) -> &'static str;

    /// Whether an entity may hold several instances.
    fn is_multi(&self) -> bool;

    /// Number of instances `entity` holds: 0, 1, or (multi) N.
    fn has(&self, entity: Entity) -> usize;

    /// Append a default-valued instance for `entity`.
    ///
    /// Fatal for single-instance columns if `entity` is already present.
    fn add(&mut self, entity: Entity);

    /// Remove every instance `entity` holds. Fatal if it holds none.
    fn remove(&mut self, entity: Entity);

    /// Reserve room for `more` additional instances.
    fn reserve(&mut self, more: usize);

    /// Absorb all of `other`'s instances, leaving it empty.
    ///
    /// Fatal if `other` is a different concrete column type or shares an
    /// entity with `self`.
    fn graduate_from(&mut self, other: &mut dyn ComponentStore);

    /// Run the init hook on every instance `entity` holds.
    fn init_component(&mut self, ctx: &mut Context, entity: Entity);

    /// Run the delete hook on every instance `entity` holds.
    fn delete_component(&mut self, ctx: &mut Context, entity: Entity);

    /// Number of live instances.
    fn len(&self) -> usize;

    /// Returns `true` if the column holds no instances.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Distinct entities holding at least one instance, sorted.
    fn entities(&self) -> Vec<Entity>;

    /// A new, empty column of the same concrete type sharing this column's hooks.
    fn empty_like(&self) -> Box<dyn ComponentStore>;

    /// Verify density and that the index maps are exact inverses.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::IndexCorruption`] describing the first mismatch.
    fn check_consistency(&self) -> Result<(), EcsError>;

    /// Upcast for downcasting to the concrete column.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting to the concrete column.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Typed column operations used by entity construction and queries.
pub trait Store: ComponentStore + Default + Sized {
    /// The component type stored.
    type Component: Component;

    /// What one entity holds: the component itself, or a list of instances.
    type Value: Clone + Send + Sync + 'static;

    /// Whether several instances per entity are allowed.
    const MULTI: bool;

    /// An empty column running `hooks` on instance creation/destruction.
    fn with_hooks(hooks: Hooks<Self::Component>) -> Self;

    /// Append `value` as a new instance for `entity`.
    fn push(&mut self, entity: Entity, value: Self::Component);

    /// Run the init hook on the instance most recently added for `entity`.
    fn init_newest(&mut self, ctx: &mut Context, entity: Entity);

    /// Clone out everything `entity` holds, or `None` if it holds nothing.
    fn value_of(&self, entity: Entity) -> Option<Self::Value>;

    /// Overwrite everything `entity` holds. The arity must match exactly.
    fn set_value(&mut self, entity: Entity, value: Self::Value);
}

/// Borrow a type-erased column as its concrete type. Fatal on mismatch.
#[track_caller]
pub fn downcast_ref<S: Store>(store: &dyn ComponentStore) -> &S {
    match store.as_any().downcast_ref::<S>() {
        Some(typed) => typed,
        None => violation(EcsError::ColumnTypeMismatch {
            expected: <S::Component as Component>::type_name(),
            actual: store.type_name(),
        }),
    }
}

/// Mutably borrow a type-erased column as its concrete type. Fatal on mismatch.
#[track_caller]
pub fn downcast_mut<S: Store>(store: &mut dyn ComponentStore) -> &mut S {
    let actual = store.type_name();
    match store.as_any_mut().downcast_mut::<S>() {
        Some(typed) => typed,
        None => violation(EcsError::ColumnTypeMismatch {
            expected: <S::Component as Component>::type_name(),
            actual,
        }),
    }
}

/// Dense storage holding exactly one `T` per entity.
pub struct Column<T: Component> {
    /// Dense component array.
    items: Vec<T>,
    /// Entity → index into `items`.
    id_to_low: HashMap<Entity, usize>,
    /// Index into `items` → entity.
    low_to_id: Vec<Entity>,
    hooks: Hooks<T>,
}

impl<T: Component> Column<T> {
    /// Create a new, empty column with no-op hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hooks(Hooks::new())
    }

    /// The component of `entity`. Fatal if absent.
    #[track_caller]
    #[must_use]
    pub fn for_id(&self, entity: Entity) -> &T {
        match self.opt_for_id(entity) {
            Some(value) => value,
            None => violation(self.missing(entity)),
        }
    }

    /// The component of `entity`, if present.
    #[must_use]
    pub fn opt_for_id(&self, entity: Entity) -> Option<&T> {
        self.id_to_low.get(&entity).map(|&low| &self.items[low])
    }

    /// Mutable access to the component of `entity`. Fatal if absent.
    #[track_caller]
    pub fn for_id_mut(&mut self, entity: Entity) -> &mut T {
        match self.id_to_low.get(&entity) {
            Some(&low) => &mut self.items[low],
            None => violation(self.missing(entity)),
        }
    }

    /// Overwrite the component of `entity`.
    ///
    /// Fatal with [`EcsError::ArityMismatch`] if the entity holds none.
    #[track_caller]
    pub fn set_for_id(&mut self, entity: Entity, value: T) {
        match self.id_to_low.get(&entity) {
            Some(&low) => self.items[low] = value,
            None => violation(EcsError::ArityMismatch {
                name: T::type_name(),
                entity,
                expected: 0,
                actual: 1,
            }),
        }
    }

    /// Append `value` for `entity`. Fatal if `entity` already has one.
    #[track_caller]
    pub fn insert(&mut self, entity: Entity, value: T) {
        if self.id_to_low.contains_key(&entity) {
            violation(EcsError::DuplicateEntity {
                name: T::type_name(),
                entity,
            });
        }
        self.id_to_low.insert(entity, self.items.len());
        self.low_to_id.push(entity);
        self.items.push(value);
    }

    /// The dense component array, in storage order.
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    /// Iterate `(entity, component)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.low_to_id.iter().copied().zip(self.items.iter())
    }

    fn missing(&self, entity: Entity) -> EcsError {
        EcsError::MissingComponent {
            name: T::type_name(),
            entity,
        }
    }
}

impl<T: Component> Default for Column<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("type", &T::type_name())
            .field("len", &self.items.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl<T: Component> ComponentStore for Column<T> {
    fn component_type(&self) -> ComponentTypeId {
        T::component_type_id()
    }

    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn is_multi(&self) -> bool {
        false
    }

    fn has(&self, entity: Entity) -> usize {
        usize::from(self.id_to_low.contains_key(&entity))
    }

    fn add(&mut self, entity: Entity) {
        self.insert(entity, T::default());
    }

    fn remove(&mut self, entity: Entity) {
        let Some(low) = self.id_to_low.remove(&entity) else {
            violation(self.missing(entity));
        };
        self.items.swap_remove(low);
        self.low_to_id.swap_remove(low);
        // The former last element now sits at `low`.
        if let Some(&moved) = self.low_to_id.get(low) {
            self.id_to_low.insert(moved, low);
        }
    }

    fn reserve(&mut self, more: usize) {
        self.items.reserve(more);
        self.low_to_id.reserve(more);
        self.id_to_low.reserve(more);
    }

    fn graduate_from(&mut self, other: &mut dyn ComponentStore) {
        let other = downcast_mut::<Self>(other);
        let offset = self.items.len();
        for (low, entity) in other.low_to_id.iter().copied().enumerate() {
            if self.id_to_low.insert(entity, offset + low).is_some() {
                violation(EcsError::DuplicateEntity {
                    name: T::type_name(),
                    entity,
                });
            }
        }
        self.low_to_id.append(&mut other.low_to_id);
        self.items.append(&mut other.items);
        other.id_to_low.clear();
    }

    fn init_component(&mut self, ctx: &mut Context, entity: Entity) {
        let Some(&low) = self.id_to_low.get(&entity) else {
            violation(self.missing(entity));
        };
        self.hooks.run_init(ctx, entity, &mut self.items[low]);
    }

    fn delete_component(&mut self, ctx: &mut Context, entity: Entity) {
        let Some(&low) = self.id_to_low.get(&entity) else {
            violation(self.missing(entity));
        };
        self.hooks.run_delete(ctx, entity, &mut self.items[low]);
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn entities(&self) -> Vec<Entity> {
        let mut entities = self.low_to_id.clone();
        entities.sort_unstable();
        entities
    }

    fn empty_like(&self) -> Box<dyn ComponentStore> {
        Box::new(Self::with_hooks(self.hooks.clone()))
    }

    fn check_consistency(&self) -> Result<(), EcsError> {
        let corrupt = |detail: String| EcsError::IndexCorruption {
            name: T::type_name(),
            detail,
        };
        if self.items.len() != self.low_to_id.len() || self.items.len() != self.id_to_low.len() {
            return Err(corrupt(format!(
                "{} items, {} reverse entries, {} forward entries",
                self.items.len(),
                self.low_to_id.len(),
                self.id_to_low.len()
            )));
        }
        for (low, entity) in self.low_to_id.iter().enumerate() {
            if self.id_to_low.get(entity) != Some(&low) {
                return Err(corrupt(format!("{entity} at index {low} maps elsewhere")));
            }
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl<T: Component> Store for Column<T> {
    type Component = T;
    type Value = T;

    const MULTI: bool = false;

    fn with_hooks(hooks: Hooks<T>) -> Self {
        Self {
            items: Vec::new(),
            id_to_low: HashMap::new(),
            low_to_id: Vec::new(),
            hooks,
        }
    }

    fn push(&mut self, entity: Entity, value: T) {
        self.insert(entity, value);
    }

    fn init_newest(&mut self, ctx: &mut Context, entity: Entity) {
        self.init_component(ctx, entity);
    }

    fn value_of(&self, entity: Entity) -> Option<T> {
        self.opt_for_id(entity).cloned()
    }

    fn set_value(&mut self, entity: Entity, value: T) {
        self.set_for_id(entity, value);
    }
}

#[cfg(test)]
mod tests {
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

    fn pos(x: f32) -> Position {
        Position { x, y: -x }
    }

    fn filled(ids: &[u64]) -> Column<Position> {
        let mut col = Column::new();
        for &id in ids {
            col.insert(Entity(id), pos(id as f32));
        }
        col
    }

    #[test]
    fn test_add_then_remove_restores_length() {
        let mut col = filled(&[1, 2, 3]);
        let before = col.len();

        col.add(Entity(9));
        assert_eq!(col.has(Entity(9)), 1);
        assert_eq!(col.for_id(Entity(9)), &Position::default());

        col.remove(Entity(9));
        assert_eq!(col.has(Entity(9)), 0);
        assert_eq!(col.len(), before);
        col.check_consistency().unwrap();
    }

    #[test]
    fn test_remove_compacts_with_last_element() {
        let mut col = filled(&[1, 2, 3, 4]);
        col.remove(Entity(2));

        assert_eq!(col.len(), 3);
        // Entity 4 was moved into the hole left by entity 2.
        assert_eq!(col.as_slice()[1], pos(4.0));
        assert_eq!(col.for_id(Entity(4)), &pos(4.0));
        assert_eq!(col.for_id(Entity(1)), &pos(1.0));
        assert_eq!(col.for_id(Entity(3)), &pos(3.0));
        col.check_consistency().unwrap();
    }

    #[test]
    fn test_remove_last_element() {
        let mut col = filled(&[1, 2]);
        col.remove(Entity(2));
        col.remove(Entity(1));
        assert!(col.is_empty());
        col.check_consistency().unwrap();
    }

    #[test]
    fn test_set_and_opt_for_id() {
        let mut col = filled(&[1]);
        col.set_for_id(Entity(1), pos(7.0));
        assert_eq!(col.opt_for_id(Entity(1)), Some(&pos(7.0)));
        assert_eq!(col.opt_for_id(Entity(2)), None);
        col.for_id_mut(Entity(1)).x = 8.0;
        assert_eq!(col.value_of(Entity(1)).unwrap().x, 8.0);
    }

    #[test]
    #[should_panic(expected = "already holds a `Position`")]
    fn test_duplicate_add_is_fatal() {
        let mut col = filled(&[1]);
        col.add(Entity(1));
    }

    #[test]
    #[should_panic(expected = "arity mismatch")]
    fn test_set_for_absent_entity_is_fatal() {
        let mut col = filled(&[1]);
        col.set_for_id(Entity(2), pos(0.0));
    }

    #[test]
    #[should_panic(expected = "has no `Position`")]
    fn test_for_id_absent_is_fatal() {
        let col = filled(&[1]);
        let _ = col.for_id(Entity(5));
    }

    #[test]
    fn test_graduate_from_appends_and_empties_source() {
        let mut main = filled(&[1, 2]);
        let mut nursery = filled(&[10, 11, 12]);

        main.graduate_from(&mut nursery);

        assert_eq!(main.len(), 5);
        assert!(nursery.is_empty());
        assert_eq!(nursery.has(Entity(10)), 0);
        for id in [1, 2, 10, 11, 12] {
            assert_eq!(main.for_id(Entity(id)), &pos(id as f32));
        }
        main.check_consistency().unwrap();
        nursery.check_consistency().unwrap();
    }

    #[test]
    #[should_panic(expected = "column type mismatch")]
    fn test_graduate_from_other_type_is_fatal() {
        #[derive(Debug, Clone, Default)]
        struct Health(f32);
        impl Component for Health {
            type Store = Column<Self>;

            fn type_name() -> &'static str {
                "Health"
            }
        }

        let mut main = filled(&[1]);
        let mut other: Column<Health> = Column::new();
        other.add(Entity(2));
        main.graduate_from(&mut other);
    }

    #[test]
    fn test_hooks_survive_empty_like() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let inits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&inits);
        let main: Column<Position> = Column::with_hooks(Hooks::<Position>::new().on_init(move |_, _, p| {
            counter.fetch_add(1, Ordering::SeqCst);
            p.x = 42.0;
        }));

        let mut nursery = main.empty_like();
        nursery.add(Entity(3));
        nursery.init_component(&mut (), Entity(3));

        assert_eq!(inits.load(Ordering::SeqCst), 1);
        let typed = downcast_ref::<Column<Position>>(&*nursery);
        assert_eq!(typed.for_id(Entity(3)).x, 42.0);
    }
}
