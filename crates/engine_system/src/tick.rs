//! Fixed-timestep tick loop.
//!
//! One tick is:
//!
//! 1. Run every system in registration order.
//! 2. Graduate the nursery, making entities created this tick visible.
//! 3. Finalize kills, removing entities doomed this tick.
//! 4. Advance the tick counter.
//!
//! Steps 2 and 3 are the only points where deferred structural changes take
//! effect.

use std::time::{Duration, Instant};

use anyhow::Result;
use engine_component::Context;
use engine_world::Tracker;
use tracing::{debug, info, warn};

use crate::config::TickConfig;
use crate::manager::SystemManager;
use crate::system::System;

/// Owns the tracker and the systems, and drives them tick by tick.
#[derive(Debug)]
pub struct TickLoop {
    /// Current tick counter.
    tick_id: u64,
    /// Tick configuration.
    config: TickConfig,
    /// All entity state.
    tracker: Tracker,
    /// Systems run each tick.
    systems: SystemManager,
}

impl TickLoop {
    /// Create a tick loop with an empty tracker and no systems.
    #[must_use]
    pub fn new(config: TickConfig) -> Self {
        Self {
            tick_id: 0,
            config,
            tracker: Tracker::new(),
            systems: SystemManager::new(),
        }
    }

    /// Returns the current tick counter.
    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.tick_id
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TickConfig {
        &self.config
    }

    /// Returns the tracker.
    #[must_use]
    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    /// Returns the system manager.
    #[must_use]
    pub fn systems(&self) -> &SystemManager {
        &self.systems
    }

    /// Append a system to run every tick.
    pub fn add_system(&mut self, system: impl System + 'static) -> &mut Self {
        self.systems.add_system(system);
        self
    }

    /// Initialise systems ahead of the first tick.
    ///
    /// # Errors
    ///
    /// Returns the first system initialisation error.
    pub fn init(&mut self, ctx: &mut Context) -> Result<()> {
        self.systems.init(ctx, &self.tracker)
    }

    /// Run one tick with timestep `dt` seconds.
    ///
    /// # Errors
    ///
    /// Returns the first system error. Graduation and kill finalization are
    /// skipped for a failed tick.
    pub fn tick(&mut self, ctx: &mut Context, dt: f64) -> Result<()> {
        debug!(tick_id = self.tick_id + 1, dt, "tick start");

        self.systems.execute(ctx, &self.tracker, dt)?;
        let graduated = self.tracker.graduate();
        let killed = self.tracker.finalize_kills(ctx);
        self.tick_id += 1;

        debug!(
            tick_id = self.tick_id,
            graduated,
            killed,
            entities = self.tracker.entity_count(),
            "tick end"
        );
        Ok(())
    }

    /// Run the tick loop for the configured number of ticks, or indefinitely.
    ///
    /// Sleeps off whatever is left of each tick's budget and warns when a
    /// tick overruns it.
    ///
    /// # Errors
    ///
    /// Returns the first tick error.
    pub fn run(&mut self, ctx: &mut Context) -> Result<()> {
        let tick_duration = Duration::from_secs_f64(self.config.tick_seconds());
        let mut tick_count = 0u64;

        info!(
            tick_rate = self.config.tick_rate,
            max_ticks = self.config.max_ticks,
            systems = self.systems.len(),
            "starting tick loop"
        );
        self.init(ctx)?;

        loop {
            let start = Instant::now();

            self.tick(ctx, tick_duration.as_secs_f64())?;

            tick_count += 1;
            if self.config.max_ticks > 0 && tick_count >= self.config.max_ticks {
                info!(ticks = tick_count, "tick loop complete");
                break;
            }

            let elapsed = start.elapsed();
            if elapsed < tick_duration {
                std::thread::sleep(tick_duration - elapsed);
            } else {
                warn!(
                    tick_id = self.tick_id,
                    elapsed_ms = elapsed.as_millis() as u64,
                    budget_ms = tick_duration.as_millis() as u64,
                    "tick exceeded time budget"
                );
            }
        }
        Ok(())
    }
}
