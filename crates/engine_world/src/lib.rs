//! # engine_world
//!
//! Entity storage and the query harness built on top of `engine_component`.
//!
//! - [`Tracker`] owns every column and archetype group behind one
//!   reader/writer lock, and runs the entity lifecycle: bulk and nursery
//!   creation, component add/remove, deferred kills, graduation.
//! - [`Exec`] runs a query: gather under the shared lock, call user code with
//!   no lock, write back under the exclusive lock.
//! - [`Bundle`] turns a tuple of component values into one entity.

pub mod bundle;
pub mod exec;
pub mod storage;
pub mod timing;
pub mod tracker;

pub use bundle::Bundle;
pub use exec::{Access, Batch, Exec, Pack, Packs, Query, Read, ValueOf, Write};
pub use storage::Storage;
pub use timing::Timing;
pub use tracker::Tracker;
