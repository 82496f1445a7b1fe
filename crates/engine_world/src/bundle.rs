//! Typed component lists for building a single entity.
//!
//! A [`Bundle`] is a tuple of component values. Its signature is derived from
//! the tuple's types, so `(Position, Velocity)` always builds a
//! `{Position, Velocity}` entity. A multi component type may appear more than
//! once; each occurrence adds one instance.

use engine_component::{Component, Entity, Signature, Store};

use crate::storage::Storage;

/// A tuple of components that can be written into a [`Storage`] for one entity.
pub trait Bundle: Send + 'static {
    /// The signature the built entity will have.
    fn signature() -> Signature;

    /// Push every value into its column for `entity`.
    fn push_into(self, storage: &mut Storage, entity: Entity);
}

macro_rules! impl_bundle {
    ($($T:ident),+) => {
        impl<$($T: Component),+> Bundle for ($($T,)+) {
            fn signature() -> Signature {
                Signature::from_types([$($T::component_type_id()),+])
            }

            #[allow(non_snake_case)]
            fn push_into(self, storage: &mut Storage, entity: Entity) {
                let ($($T,)+) = self;
                $(storage.typed_mut::<$T>().push(entity, $T);)+
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);
impl_bundle!(A, B, C, D, E);
impl_bundle!(A, B, C, D, E, F);
impl_bundle!(A, B, C, D, E, F, G);
impl_bundle!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use engine_component::{Column, MultiColumn, signature};

    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Health(i32);

    impl Component for Health {
        type Store = Column<Self>;

        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Buff(u8);

    impl Component for Buff {
        type Store = MultiColumn<Self>;

        fn type_name() -> &'static str {
            "Buff"
        }
    }

    #[test]
    fn test_signature_follows_tuple_types() {
        assert_eq!(<(Health, Buff)>::signature(), signature![Buff, Health]);
        assert_eq!(<(Buff, Buff)>::signature().count(Buff::component_type_id()), 2);
    }

    #[test]
    fn test_push_into_writes_each_value() {
        let mut storage = Storage::new();
        storage.register(Box::new(Column::<Health>::new()));
        storage.register(Box::new(MultiColumn::<Buff>::new()));

        (Health(9), Buff(1), Buff(2)).push_into(&mut storage, Entity(3));

        assert_eq!(storage.typed::<Health>().value_of(Entity(3)), Some(Health(9)));
        assert_eq!(storage.typed::<Buff>().value_of(Entity(3)), Some(vec![Buff(1), Buff(2)]));
    }
}
