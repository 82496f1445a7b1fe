//! # engine_component
//!
//! The "C" in ECS: defines what a component is and how it is stored.
//!
//! This crate provides:
//!
//! - [`Component`] trait, the contract all ECS data must satisfy.
//! - [`Entity`] and [`EntityAllocator`], lightweight `u64` identifiers.
//! - [`Column`] and [`MultiColumn`], dense type-erased column storage.
//! - [`Signature`] and [`ArchetypeGroups`], entities grouped by type set.
//! - [`QueryDescriptor`], declarative data access requirements for systems.
//! - [`EcsError`] and [`violation`], the fatal contract-violation path.

pub mod archetype;
pub mod column;
pub mod component;
pub mod entity;
pub mod error;
pub mod multi;
pub mod query;

pub use archetype::{ArchetypeGroups, Signature, SignatureDisplay};
pub use column::{Column, ComponentStore, Store, downcast_mut, downcast_ref};
pub use component::{Component, ComponentTypeId, Context, HookFn, Hooks};
pub use entity::{Entity, EntityAllocator};
pub use error::{EcsError, violation};
pub use multi::MultiColumn;
pub use query::QueryDescriptor;
