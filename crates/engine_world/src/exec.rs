//! The gather → callback → writeback query protocol.
//!
//! A query is a tuple of access markers, [`Read<T>`] or [`Write<T>`], called a
//! *pack*. [`Exec::run`] copies the matching entities' data out of the tracker
//! under the shared lock, hands it to the caller with no lock held, and then
//! copies the `Write` columns back under the exclusive lock.
//!
//! Several packs can be serviced by one call with [`Packs`]. The first pack
//! selects the entity set; later packs claim, in order, the entities that
//! match them, and the first pack keeps whatever nobody claimed:
//!
//! ```rust
//! use engine_component::{Column, Component, signature};
//! use engine_world::{Exec, Packs, Read, Tracker, Write};
//!
//! #[derive(Debug, Clone, Default)]
//! struct Fuel(f32);
//! impl Component for Fuel {
//!     type Store = Column<Self>;
//!     fn type_name() -> &'static str { "Fuel" }
//! }
//!
//! #[derive(Debug, Clone, Default)]
//! struct Engine(f32);
//! impl Component for Engine {
//!     type Store = Column<Self>;
//!     fn type_name() -> &'static str { "Engine" }
//! }
//!
//! let tracker = Tracker::new();
//! tracker.add_source::<Fuel>();
//! tracker.add_source::<Engine>();
//! tracker.create(&mut (), &signature![Fuel], 2);
//! tracker.create(&mut (), &signature![Fuel, Engine], 3);
//!
//! Exec::<Packs<((Write<Fuel>,), (Write<Fuel>, Read<Engine>))>>::run(&tracker, |(idle, burning)| {
//!     assert_eq!(idle.len(), 2);
//!     assert_eq!(burning.len(), 3);
//!     let (_, (fuel, engine)) = burning.parts();
//!     for (fuel, engine) in fuel.iter_mut().zip(engine) {
//!         fuel.0 -= engine.0;
//!     }
//! });
//! ```

use std::any::type_name;
use std::panic::Location;
use std::collections::HashSet;
use std::marker::PhantomData;
use std::time::Instant;

use engine_component::{
    Component, EcsError, Entity, QueryDescriptor, Signature, Store, violation,
};
use tracing::trace;

use crate::storage::Storage;
use crate::tracker::Tracker;

/// What one entity holds of `T`: the component, or every instance for multi types.
pub type ValueOf<T> = <<T as Component>::Store as Store>::Value;

/// Read-only access to `T`. Gathered but never written back.
pub struct Read<T>(PhantomData<fn() -> T>);

/// Mutable access to `T`. Gathered and written back.
pub struct Write<T>(PhantomData<fn() -> T>);

/// One column of a pack.
pub trait Access: 'static {
    /// The component type accessed.
    type Component: Component;

    /// What the callback sees: a shared or a mutable slice.
    type View<'a>;

    /// Whether the buffer is written back.
    const WRITES: bool;

    /// Borrow the gathered buffer as this access kind's view.
    fn view(buffer: &mut Vec<ValueOf<Self::Component>>) -> Self::View<'_>;

    /// Copy the values of `ids`, in order, out of their column.
    #[track_caller]
    fn gather(storage: &Storage, ids: &[Entity]) -> Vec<ValueOf<Self::Component>> {
        let column = storage.typed::<Self::Component>();
        ids.iter()
            .map(|&id| match column.value_of(id) {
                Some(value) => value,
                None => violation(EcsError::MissingComponent {
                    name: <Self::Component as Component>::type_name(),
                    entity: id,
                }),
            })
            .collect()
    }

    /// Store `buffer` back into the column if this access writes.
    #[track_caller]
    fn write_back(storage: &mut Storage, ids: &[Entity], buffer: Vec<ValueOf<Self::Component>>) {
        if !Self::WRITES {
            return;
        }
        if buffer.len() != ids.len() {
            violation(EcsError::BufferLength {
                name: <Self::Component as Component>::type_name(),
                expected: ids.len(),
                actual: buffer.len(),
            });
        }
        let column = storage.typed_mut::<Self::Component>();
        for (&id, value) in ids.iter().zip(buffer) {
            column.set_value(id, value);
        }
    }
}

impl<T: Component> Access for Read<T> {
    type Component = T;
    type View<'a> = &'a [ValueOf<T>];

    const WRITES: bool = false;

    fn view(buffer: &mut Vec<ValueOf<T>>) -> Self::View<'_> {
        buffer.as_slice()
    }
}

impl<T: Component> Access for Write<T> {
    type Component = T;
    type View<'a> = &'a mut [ValueOf<T>];

    const WRITES: bool = true;

    fn view(buffer: &mut Vec<ValueOf<T>>) -> Self::View<'_> {
        buffer.as_mut_slice()
    }
}

/// A tuple of [`Access`] markers gathered together for one id list.
pub trait Pack: 'static {
    /// One dense buffer per access, in declaration order.
    type Buffers: 'static;

    /// The callback's view of the buffers.
    type Views<'a>;

    /// The types an entity must hold to match.
    fn signature() -> Signature;

    /// Reads and writes this pack declares.
    fn descriptor() -> QueryDescriptor;

    /// Fill every buffer for `ids`.
    fn gather(storage: &Storage, ids: &[Entity]) -> Self::Buffers;

    /// Borrow the buffers as views.
    fn views(buffers: &mut Self::Buffers) -> Self::Views<'_>;

    /// Write every `Write` buffer back.
    fn write_back(storage: &mut Storage, ids: &[Entity], buffers: Self::Buffers);
}

/// Something [`Exec`] can run: a single pack, or several via [`Packs`].
pub trait Query: 'static {
    /// What the callback receives.
    type Batches;

    /// Reads and writes across every pack.
    fn descriptor() -> QueryDescriptor;

    /// Collect ids and buffers from main storage.
    fn gather(storage: &Storage) -> Self::Batches;

    /// Write the mutable buffers back into main storage.
    fn write_back(storage: &mut Storage, batches: Self::Batches);
}

/// The ids claimed by one pack and its gathered buffers.
pub struct Batch<P: Pack> {
    ids: Vec<Entity>,
    buffers: P::Buffers,
}

impl<P: Pack> Batch<P> {
    fn gather(storage: &Storage, ids: Vec<Entity>) -> Self {
        let buffers = P::gather(storage, &ids);
        Self { ids, buffers }
    }

    fn write_back(self, storage: &mut Storage) {
        P::write_back(storage, &self.ids, self.buffers);
    }

    /// The claimed ids. Element `i` of every buffer belongs to `ids()[i]`.
    #[must_use]
    pub fn ids(&self) -> &[Entity] {
        &self.ids
    }

    /// Number of claimed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if no entity was claimed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The buffers as a tuple of views.
    pub fn columns(&mut self) -> P::Views<'_> {
        P::views(&mut self.buffers)
    }

    /// The ids and the views together.
    pub fn parts(&mut self) -> (&[Entity], P::Views<'_>) {
        (&self.ids, P::views(&mut self.buffers))
    }
}

impl<P: Pack> std::fmt::Debug for Batch<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Batch")
            .field("pack", &type_name::<P>())
            .field("ids", &self.ids)
            .finish()
    }
}

macro_rules! impl_pack {
    ($($A:ident),+) => {
        impl<$($A: Access),+> Pack for ($($A,)+) {
            type Buffers = ($(Vec<ValueOf<$A::Component>>,)+);
            type Views<'a> = ($($A::View<'a>,)+);

            fn signature() -> Signature {
                Signature::from_types([$(<$A::Component as Component>::component_type_id()),+])
            }

            fn descriptor() -> QueryDescriptor {
                let descriptor = QueryDescriptor::new();
                $(
                    let id = <$A::Component as Component>::component_type_id();
                    let descriptor = if $A::WRITES { descriptor.write(id) } else { descriptor.read(id) };
                )+
                descriptor
            }

            fn gather(storage: &Storage, ids: &[Entity]) -> Self::Buffers {
                ($($A::gather(storage, ids),)+)
            }

            #[allow(non_snake_case)]
            fn views(buffers: &mut Self::Buffers) -> Self::Views<'_> {
                let ($($A,)+) = buffers;
                ($(<$A as Access>::view($A),)+)
            }

            #[allow(non_snake_case)]
            fn write_back(storage: &mut Storage, ids: &[Entity], buffers: Self::Buffers) {
                let ($($A,)+) = buffers;
                $(<$A as Access>::write_back(storage, ids, $A);)+
            }
        }

        impl<$($A: Access),+> Query for ($($A,)+) {
            type Batches = Batch<Self>;

            fn descriptor() -> QueryDescriptor {
                <Self as Pack>::descriptor()
            }

            fn gather(storage: &Storage) -> Self::Batches {
                Batch::<Self>::gather(storage, storage.matching(&<Self as Pack>::signature()))
            }

            fn write_back(storage: &mut Storage, batches: Self::Batches) {
                batches.write_back(storage);
            }
        }
    };
}

impl_pack!(A);
impl_pack!(A, B);
impl_pack!(A, B, C);
impl_pack!(A, B, C, D);
impl_pack!(A, B, C, D, E);
impl_pack!(A, B, C, D, E, F);
impl_pack!(A, B, C, D, E, F, G);
impl_pack!(A, B, C, D, E, F, G, H);

/// Several packs serviced by one [`Exec`] call.
///
/// `T` is a tuple of packs. The callback receives a tuple of [`Batch`]es in
/// the same order.
pub struct Packs<T>(PhantomData<fn() -> T>);

/// Ids from `canonical` matching `P` that no earlier pack claimed.
fn claim<P: Pack>(storage: &Storage, canonical: &[Entity], claimed: &mut HashSet<Entity>) -> Vec<Entity> {
    let signature = P::signature();
    let mut ids = Vec::new();
    for &id in canonical {
        if claimed.contains(&id) {
            continue;
        }
        if storage
            .signature_of(id)
            .is_some_and(|held| held.is_superset_of(&signature))
        {
            claimed.insert(id);
            ids.push(id);
        }
    }
    ids
}

macro_rules! impl_packs {
    ($($P:ident),+) => {
        impl<P0: Pack, $($P: Pack),+> Query for Packs<(P0, $($P,)+)> {
            type Batches = (Batch<P0>, $(Batch<$P>,)+);

            fn descriptor() -> QueryDescriptor {
                P0::descriptor()$(.merge($P::descriptor()))+
            }

            #[allow(non_snake_case)]
            fn gather(storage: &Storage) -> Self::Batches {
                let canonical = storage.matching(&P0::signature());
                let mut claimed = HashSet::new();
                $(let $P = claim::<$P>(storage, &canonical, &mut claimed);)+
                let primary: Vec<Entity> = canonical
                    .into_iter()
                    .filter(|id| !claimed.contains(id))
                    .collect();
                (
                    Batch::<P0>::gather(storage, primary),
                    $(Batch::<$P>::gather(storage, $P),)+
                )
            }

            #[allow(non_snake_case)]
            fn write_back(storage: &mut Storage, batches: Self::Batches) {
                let (primary, $($P,)+) = batches;
                primary.write_back(storage);
                $($P.write_back(storage);)+
            }
        }
    };
}

impl_packs!(P1);
impl_packs!(P1, P2);
impl_packs!(P1, P2, P3);

/// Runs a [`Query`] against a [`Tracker`].
pub struct Exec<Q: Query>(PhantomData<fn() -> Q>);

impl<Q: Query> Exec<Q> {
    /// Gather, call `f` with no lock held, then write back.
    ///
    /// `f` may request structural changes through the tracker
    /// (`create_with`, `kill_entity`); they are deferred and do not affect
    /// the gathered entities. Gather and writeback time is accumulated per
    /// call site, see [`Tracker::exec_times`].
    #[track_caller]
    pub fn run<F, R>(tracker: &Tracker, f: F) -> R
    where
        F: FnOnce(&mut Q::Batches) -> R,
    {
        let caller = Location::caller();
        let started = Instant::now();
        let mut batches = {
            let state = tracker.read();
            Q::gather(&state.main)
        };
        let gathered = started.elapsed();

        let result = f(&mut batches);

        let resumed = Instant::now();
        {
            let mut state = tracker.write();
            Q::write_back(&mut state.main, batches);
        }
        let elapsed = gathered + resumed.elapsed();

        trace!(%caller, query = type_name::<Q>(), ?elapsed, "exec");
        tracker.record_exec(caller, elapsed);
        result
    }

    /// The reads and writes this query declares.
    #[must_use]
    pub fn descriptor() -> QueryDescriptor {
        Q::descriptor()
    }
}
