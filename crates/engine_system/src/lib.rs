//! # engine_system
//!
//! Systems and the loop that runs them.
//!
//! A [`System`] is named per-tick logic that queries the
//! [`Tracker`](engine_world::Tracker). The [`SystemManager`] runs systems
//! sequentially in registration order, and the [`TickLoop`] wraps it with the
//! per-tick synchronization point: graduate the nursery, then finalize kills.
//!
//! ## Usage
//!
//! ```rust
//! use engine_component::{Column, Component, QueryDescriptor, signature};
//! use engine_system::{FnSystem, TickConfig, TickLoop};
//! use engine_world::{Exec, Write};
//!
//! #[derive(Debug, Clone, Default)]
//! struct Counter(u64);
//!
//! impl Component for Counter {
//!     type Store = Column<Self>;
//!     fn type_name() -> &'static str { "Counter" }
//! }
//!
//! let mut tick_loop = TickLoop::new(TickConfig { tick_rate: 1000.0, max_ticks: 3 });
//! tick_loop.tracker().add_source::<Counter>();
//! tick_loop.tracker().create(&mut (), &signature![Counter], 10);
//! tick_loop.add_system(FnSystem::new(
//!     "count",
//!     QueryDescriptor::new().writing::<Counter>(),
//!     |_, tracker, _| {
//!         Exec::<(Write<Counter>,)>::run(tracker, |batch| {
//!             for counter in batch.columns().0 {
//!                 counter.0 += 1;
//!             }
//!         });
//!         Ok(())
//!     },
//! ));
//! tick_loop.run(&mut ()).unwrap();
//! ```

pub mod config;
pub mod manager;
pub mod system;
pub mod tick;

pub use config::TickConfig;
pub use manager::SystemManager;
pub use system::{FnSystem, System};
pub use tick::TickLoop;
