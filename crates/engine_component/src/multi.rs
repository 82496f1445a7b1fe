//! Columns holding several instances of one component type per entity.
//!
//! Instances of one entity are not contiguous: each entity keeps an ordered
//! list of indices into the dense array. Removing an entity walks its indices
//! from the highest down, so every swap pulls in an element that belongs to a
//! different entity and only that entity's index list needs patching.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use crate::column::{ComponentStore, Store, downcast_mut};
use crate::component::{Component, ComponentTypeId, Context, Hooks};
use crate::entity::Entity;
use crate::error::{EcsError, violation};

/// Dense storage holding any number of `T` instances per entity.
pub struct MultiColumn<T: Component> {
    items: Vec<T>,
    /// Entity → indices into `items`, in instance order.
    id_to_low: HashMap<Entity, Vec<usize>>,
    /// Index into `items` → entity.
    low_to_id: Vec<Entity>,
    hooks: Hooks<T>,
}

impl<T: Component> MultiColumn<T> {
    /// Create a new, empty column with no-op hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hooks(Hooks::new())
    }

    /// Iterate the instances of `entity` in insertion order. Fatal if it holds none.
    #[track_caller]
    pub fn for_id(&self, entity: Entity) -> impl Iterator<Item = &T> + '_ {
        match self.opt_for_id(entity) {
            Some(instances) => instances,
            None => violation(self.missing(entity)),
        }
    }

    /// Iterate the instances of `entity`, or `None` if it holds none.
    pub fn opt_for_id(&self, entity: Entity) -> Option<impl Iterator<Item = &T> + '_> {
        self.id_to_low
            .get(&entity)
            .map(|lows| lows.iter().map(|&low| &self.items[low]))
    }

    /// Overwrite every instance of `entity`, in instance order.
    ///
    /// `values` must have exactly as many elements as the entity holds.
    #[track_caller]
    pub fn set_for_id(&mut self, entity: Entity, values: Vec<T>) {
        let held = self.id_to_low.get(&entity).map_or(0, Vec::len);
        if held != values.len() || held == 0 {
            violation(EcsError::ArityMismatch {
                name: T::type_name(),
                entity,
                expected: held,
                actual: values.len(),
            });
        }
        if let Some(lows) = self.id_to_low.get(&entity) {
            for (&low, value) in lows.iter().zip(values) {
                self.items[low] = value;
            }
        }
    }

    /// Append one more instance for `entity`.
    pub fn insert(&mut self, entity: Entity, value: T) {
        let low = self.items.len();
        self.items.push(value);
        self.low_to_id.push(entity);
        self.id_to_low.entry(entity).or_default().push(low);
    }

    /// Iterate `(entity, instance)` pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.low_to_id.iter().copied().zip(self.items.iter())
    }

    fn missing(&self, entity: Entity) -> EcsError {
        EcsError::MissingComponent {
            name: T::type_name(),
            entity,
        }
    }

    fn corrupt(detail: String) -> EcsError {
        EcsError::IndexCorruption {
            name: T::type_name(),
            detail,
        }
    }
}

impl<T: Component> Default for MultiColumn<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> fmt::Debug for MultiColumn<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiColumn")
            .field("type", &T::type_name())
            .field("len", &self.items.len())
            .field("entities", &self.id_to_low.len())
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl<T: Component> ComponentStore for MultiColumn<T> {
    fn component_type(&self) -> ComponentTypeId {
        T::component_type_id()
    }

    fn type_name(&self) -> &'static str {
        T::type_name()
    }

    fn is_multi(&self) -> bool {
        true
    }

    fn has(&self, entity: Entity) -> usize {
        self.id_to_low.get(&entity).map_or(0, Vec::len)
    }

    fn add(&mut self, entity: Entity) {
        self.insert(entity, T::default());
    }

    fn remove(&mut self, entity: Entity) {
        let Some(mut lows) = self.id_to_low.remove(&entity) else {
            violation(self.missing(entity));
        };
        // Highest first: every index still owed by `entity` is below the
        // slot being vacated, so the element swapped in is never one of ours.
        lows.sort_unstable_by(|a, b| b.cmp(a));
        for low in lows {
            let last = self.items.len() - 1;
            self.items.swap_remove(low);
            self.low_to_id.swap_remove(low);
            if low == last {
                continue;
            }
            let moved = self.low_to_id[low];
            let slot = self
                .id_to_low
                .get_mut(&moved)
                .and_then(|slots| slots.iter_mut().find(|slot| **slot == last));
            match slot {
                Some(slot) => *slot = low,
                None => violation(Self::corrupt(format!(
                    "{moved} does not own index {last} while removing {entity}"
                ))),
            }
        }
    }

    fn reserve(&mut self, more: usize) {
        self.items.reserve(more);
        self.low_to_id.reserve(more);
    }

    fn graduate_from(&mut self, other: &mut dyn ComponentStore) {
        let other = downcast_mut::<Self>(other);
        let offset = self.items.len();
        for (entity, lows) in other.id_to_low.drain() {
            let shifted = lows.into_iter().map(|low| low + offset).collect();
            if self.id_to_low.insert(entity, shifted).is_some() {
                violation(EcsError::DuplicateEntity {
                    name: T::type_name(),
                    entity,
                });
            }
        }
        self.low_to_id.append(&mut other.low_to_id);
        self.items.append(&mut other.items);
    }

    fn init_component(&mut self, ctx: &mut Context, entity: Entity) {
        let Some(lows) = self.id_to_low.get(&entity) else {
            violation(self.missing(entity));
        };
        for &low in lows {
            self.hooks.run_init(ctx, entity, &mut self.items[low]);
        }
    }

    fn delete_component(&mut self, ctx: &mut Context, entity: Entity) {
        let Some(lows) = self.id_to_low.get(&entity) else {
            violation(self.missing(entity));
        };
        for &low in lows {
            self.hooks.run_delete(ctx, entity, &mut self.items[low]);
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.id_to_low.keys().copied().collect();
        entities.sort_unstable();
        entities
    }

    fn empty_like(&self) -> Box<dyn ComponentStore> {
        Box::new(Self::with_hooks(self.hooks.clone()))
    }

    fn check_consistency(&self) -> Result<(), EcsError> {
        if self.items.len() != self.low_to_id.len() {
            return Err(Self::corrupt(format!(
                "{} items but {} reverse entries",
                self.items.len(),
                self.low_to_id.len()
            )));
        }
        let forward: usize = self.id_to_low.values().map(Vec::len).sum();
        if forward != self.items.len() {
            return Err(Self::corrupt(format!(
                "{} forward entries for {} items",
                forward,
                self.items.len()
            )));
        }
        for (entity, lows) in &self.id_to_low {
            if lows.is_empty() {
                return Err(Self::corrupt(format!("{entity} has an empty index list")));
            }
            for &low in lows {
                if self.low_to_id.get(low) != Some(entity) {
                    return Err(Self::corrupt(format!(
                        "{entity} lists index {low} owned by someone else"
                    )));
                }
            }
        }
        for (low, entity) in self.low_to_id.iter().enumerate() {
            let listed = self
                .id_to_low
                .get(entity)
                .is_some_and(|lows| lows.contains(&low));
            if !listed {
                return Err(Self::corrupt(format!("index {low} is not listed by {entity}")));
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

impl<T: Component> Store for MultiColumn<T> {
    type Component = T;
    type Value = Vec<T>;

    const MULTI: bool = true;

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
        let Some(&low) = self.id_to_low.get(&entity).and_then(|lows| lows.last()) else {
            violation(self.missing(entity));
        };
        self.hooks.run_init(ctx, entity, &mut self.items[low]);
    }

    fn value_of(&self, entity: Entity) -> Option<Vec<T>> {
        self.opt_for_id(entity)
            .map(|instances| instances.cloned().collect())
    }

    fn set_value(&mut self, entity: Entity, value: Vec<T>) {
        self.set_for_id(entity, value);
    }
}
