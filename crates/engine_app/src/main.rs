//! # engine_app
//!
//! A small particle simulation exercising the tracker end to end.
//!
//! ## Startup Sequence
//!
//! 1. Read the tick configuration from `ENGINE_TICK_RATE` / `ENGINE_MAX_TICKS`.
//! 2. Register the simulation systems; their init registers the columns.
//! 3. Seed an initial population, then run the fixed-timestep tick loop.
//! 4. Log per-system and per-query timings and the final tracker layout.

mod sim;

use anyhow::Result;
use engine_system::config::MAX_TICKS_ENV;
use engine_system::{TickConfig, TickLoop};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Ticks run when `ENGINE_MAX_TICKS` is not set.
const DEFAULT_DEMO_TICKS: u64 = 240;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("engine_app=info".parse()?))
        .init();

    let mut config = TickConfig::from_env()?;
    if std::env::var_os(MAX_TICKS_ENV).is_none() {
        config.max_ticks = DEFAULT_DEMO_TICKS;
    }
    info!(?config, "engine demo starting");

    let mut state = sim::SimState::new(0x5eed);
    let mut tick_loop = TickLoop::new(config);
    sim::install(&mut tick_loop);

    tick_loop.init(&mut state)?;
    sim::seed(tick_loop.tracker(), &mut state, 64);
    tick_loop.run(&mut state)?;

    tick_loop.systems().dump_times(tick_loop.tracker());
    tick_loop.tracker().dump();
    info!(
        ticks = tick_loop.tick_id(),
        spawned = state.spawned,
        expired = state.expired,
        alive = tick_loop.tracker().entity_count(),
        "engine demo finished"
    );
    Ok(())
}
