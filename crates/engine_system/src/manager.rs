//! Ordered, sequential execution of registered systems.
//!
//! Systems run one after another in registration order, every tick. There is
//! no dependency graph and no parallelism between systems.

use std::time::Instant;

use anyhow::{Context as _, Result};
use engine_component::{Context, QueryDescriptor};
use engine_world::{Timing, Tracker};
use tracing::{debug, info};

use crate::system::System;

struct Entry {
    system: Box<dyn System>,
    query: QueryDescriptor,
    timing: Timing,
    initialized: bool,
}

/// Holds systems in registration order and runs them each tick.
#[derive(Default)]
pub struct SystemManager {
    entries: Vec<Entry>,
}

impl SystemManager {
    /// An empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a system. It runs after every system added before it.
    pub fn add_system(&mut self, system: impl System + 'static) -> &mut Self {
        let query = system.query();
        info!(
            system = system.name(),
            reads = query.reads.len(),
            writes = query.writes.len(),
            "system added"
        );
        self.entries.push(Entry {
            system: Box::new(system),
            query,
            timing: Timing::default(),
            initialized: false,
        });
        self
    }

    /// Initialise every system not yet initialised, in order.
    ///
    /// Each system's [`System::init`] runs exactly once; [`execute`](Self::execute)
    /// calls this itself if needed.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system. Systems after it stay uninitialised.
    pub fn init(&mut self, ctx: &mut Context, tracker: &Tracker) -> Result<()> {
        for entry in self.entries.iter_mut().filter(|e| !e.initialized) {
            entry
                .system
                .init(ctx, tracker)
                .with_context(|| format!("system `{}` failed to initialise", entry.system.name()))?;
            entry.initialized = true;
            debug!(system = entry.system.name(), "system initialised");
        }
        Ok(())
    }

    /// Run every system once, in registration order, timing each.
    ///
    /// # Errors
    ///
    /// Stops at the first failing system; later systems do not run this tick.
    pub fn execute(&mut self, ctx: &mut Context, tracker: &Tracker, dt: f64) -> Result<()> {
        self.init(ctx, tracker)?;
        for entry in &mut self.entries {
            let started = Instant::now();
            entry
                .system
                .execute(ctx, tracker, dt)
                .with_context(|| format!("system `{}` failed", entry.system.name()))?;
            entry.timing.record(started.elapsed());
        }
        Ok(())
    }

    /// Number of registered systems.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no system is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names and declared queries in registration order.
    pub fn systems(&self) -> impl Iterator<Item = (&str, &QueryDescriptor)> {
        self.entries
            .iter()
            .map(|entry| (entry.system.name(), &entry.query))
    }

    /// Accumulated execution time per system, in registration order.
    pub fn times(&self) -> impl Iterator<Item = (&str, Timing)> {
        self.entries
            .iter()
            .map(|entry| (entry.system.name(), entry.timing))
    }

    /// Log per-system timings, then the tracker's per-query timings.
    pub fn dump_times(&self, tracker: &Tracker) {
        for (name, timing) in self.times() {
            info!(
                system = name,
                calls = timing.calls,
                total_ms = timing.total.as_secs_f64() * 1000.0,
                avg_us = timing.average().as_secs_f64() * 1_000_000.0,
                "system timing"
            );
        }
        for (caller, timing) in tracker.exec_times() {
            info!(
                query = %caller,
                calls = timing.calls,
                total_ms = timing.total.as_secs_f64() * 1000.0,
                "exec timing"
            );
        }
    }
}

impl std::fmt::Debug for SystemManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|entry| entry.system.name()))
            .finish()
    }
}
