//! Core [`Component`] trait, type identity, and lifecycle hooks.
//!
//! Every piece of data stored in the tracker must implement [`Component`].
//! The trait requires `Clone + Default + Send + Sync + 'static` so column
//! slots can be default-initialised, gathered into query buffers by value,
//! and shared across threads behind the tracker lock.
//!
//! ## Type Identity
//!
//! [`ComponentTypeId`] is derived from the component's **string name** using
//! the FNV-1a 64-bit hash algorithm. The hash is computed once per type with
//! no registry lookup, and its numeric order is the canonical ordering used
//! by [`Signature`](crate::Signature).

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::column::Store;
use crate::entity::Entity;

/// The opaque context handed to lifecycle hooks and systems.
///
/// Collaborators (physics, rendering, input) put whatever they need behind
/// it; the core only passes it along.
pub type Context = dyn Any;

/// A unique identifier for a component type, derived from its string name
/// using the FNV-1a 64-bit hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] from a component's string name using
    /// the FNV-1a 64-bit hash algorithm.
    ///
    /// # Algorithm (FNV-1a 64-bit)
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325          (offset basis)
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3  (prime)
    /// return hash
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }

    /// Compute the [`ComponentTypeId`] for a Rust component type `T`.
    #[must_use]
    pub fn of<T: Component>() -> Self {
        T::component_type_id()
    }
}

impl fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// The core component trait.
///
/// # Examples
///
/// ```rust
/// use engine_component::{Column, Component};
///
/// #[derive(Debug, Clone, Default)]
/// struct Health {
///     current: f32,
///     max: f32,
/// }
///
/// impl Component for Health {
///     type Store = Column<Self>;
///
///     fn type_name() -> &'static str { "Health" }
/// }
/// ```
pub trait Component: Clone + Default + Send + Sync + 'static {
    /// The column kind holding this component: [`Column`](crate::Column)
    /// for one instance per entity, [`MultiColumn`](crate::MultiColumn)
    /// for several.
    type Store: Store<Component = Self>;

    /// A human-readable name for this component type.
    fn type_name() -> &'static str;

    /// Returns the [`ComponentTypeId`] for this component.
    ///
    /// The default implementation hashes [`Component::type_name()`] with
    /// FNV-1a 64-bit.
    fn component_type_id() -> ComponentTypeId {
        ComponentTypeId::from_name(Self::type_name())
    }
}

/// Signature of a lifecycle hook: `(context, entity, instance)`.
pub type HookFn<T> = dyn Fn(&mut Context, Entity, &mut T) + Send + Sync;

/// Per-type lifecycle hooks run when an instance is created or destroyed.
///
/// Registration code supplies them (e.g. to build or release an external
/// physics body); both default to no-ops. Hooks are reference counted so
/// nursery columns share them with their main counterparts.
pub struct Hooks<T> {
    init: Option<Arc<HookFn<T>>>,
    delete: Option<Arc<HookFn<T>>>,
}

impl<T> Hooks<T> {
    /// No-op hooks.
    #[must_use]
    pub fn new() -> Self {
        Self {
            init: None,
            delete: None,
        }
    }

    /// Set the hook run after an instance is added.
    #[must_use]
    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context, Entity, &mut T) + Send + Sync + 'static,
    {
        self.init = Some(Arc::new(hook));
        self
    }

    /// Set the hook run before an instance is removed.
    #[must_use]
    pub fn on_delete<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Context, Entity, &mut T) + Send + Sync + 'static,
    {
        self.delete = Some(Arc::new(hook));
        self
    }

    /// Run the init hook, if any.
    pub fn run_init(&self, ctx: &mut Context, entity: Entity, value: &mut T) {
        if let Some(hook) = &self.init {
            hook(ctx, entity, value);
        }
    }

    /// Run the delete hook, if any.
    pub fn run_delete(&self, ctx: &mut Context, entity: Entity, value: &mut T) {
        if let Some(hook) = &self.delete {
            hook(ctx, entity, value);
        }
    }
}

impl<T> Default for Hooks<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Hooks<T> {
    fn clone(&self) -> Self {
        Self {
            init: self.init.clone(),
            delete: self.delete.clone(),
        }
    }
}

impl<T> fmt::Debug for Hooks<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("init", &self.init.is_some())
            .field("delete", &self.delete.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Column;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Health {
        current: f32,
        max: f32,
    }

    impl Component for Health {
        type Store = Column<Self>;

        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[test]
    fn test_component_type_id_is_stable() {
        let id1 = Health::component_type_id();
        let id2 = Health::component_type_id();
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_component_type_id_matches_from_name() {
        assert_eq!(Health::component_type_id(), ComponentTypeId::from_name("Health"));
        assert_eq!(ComponentTypeId::of::<Health>(), ComponentTypeId::from_name("Health"));
    }

    #[test]
    fn test_component_type_id_differs_between_types() {
        #[derive(Debug, Clone, Default)]
        struct Velocity {
            x: f32,
            y: f32,
        }
        impl Component for Velocity {
            type Store = Column<Self>;

            fn type_name() -> &'static str {
                "Velocity"
            }
        }

        assert_ne!(Health::component_type_id(), Velocity::component_type_id());
    }

    #[test]
    fn test_fnv1a_known_vector() {
        // FNV-1a 64-bit of empty string is the offset basis itself.
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
        // FNV-1a 64-bit of "a".
        assert_eq!(
            ComponentTypeId::from_name("a"),
            ComponentTypeId(0xaf63_dc4c_8601_ec8c)
        );
    }

    #[test]
    fn test_hooks_default_to_noop() {
        let hooks: Hooks<Health> = Hooks::default();
        let mut value = Health::default();
        hooks.run_init(&mut (), Entity(1), &mut value);
        hooks.run_delete(&mut (), Entity(1), &mut value);
        assert_eq!(value, Health::default());
    }

    #[test]
    fn test_hooks_receive_context_and_entity() {
        let hooks = Hooks::<Health>::new()
            .on_init(|ctx, entity, value| {
                let spawned = ctx.downcast_mut::<Vec<Entity>>().unwrap();
                spawned.push(entity);
                value.current = value.max;
            })
            .on_delete(|ctx, entity, _| {
                let spawned = ctx.downcast_mut::<Vec<Entity>>().unwrap();
                spawned.retain(|e| *e != entity);
            });

        let mut log: Vec<Entity> = Vec::new();
        let mut value = Health {
            current: 0.0,
            max: 10.0,
        };
        hooks.run_init(&mut log, Entity(5), &mut value);
        assert_eq!(log, vec![Entity(5)]);
        assert_eq!(value.current, 10.0);

        hooks.clone().run_delete(&mut log, Entity(5), &mut value);
        assert!(log.is_empty());
    }
}
