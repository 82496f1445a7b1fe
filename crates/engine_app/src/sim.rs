//! Bouncing particles with finite lifetimes and a short position trail.
//!
//! Seeded particles carry `{Position, Velocity, Transform3D, Lifetime}`.
//! Particles spawned during the run also carry [`TRAIL_LEN`] [`Waypoint`]
//! instances, so the census query splits the population into two packs.

use anyhow::{Context as _, Result};
use engine_component::{Column, Component, Context, Entity, Hooks, MultiColumn, QueryDescriptor, signature};
use engine_math::motion::integrate_all;
use engine_math::{Position, Transform3D, Vec3, Velocity};
use engine_system::{FnSystem, TickLoop};
use engine_world::{Exec, Packs, Read, Tracker, Write};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

/// Half-size of the box particles bounce around in.
const ARENA_HALF_EXTENT: Vec3 = Vec3::new(50.0, 50.0, 50.0);

/// Fastest initial speed along any axis, units per second.
const MAX_SPEED: f32 = 20.0;

/// Lifetime range in seconds.
const LIFETIME_RANGE: (f32, f32) = (1.0, 4.0);

/// Seconds between spawn bursts.
const SPAWN_INTERVAL: f64 = 0.25;

/// Particles per spawn burst.
const SPAWN_BURST: usize = 4;

/// Waypoints carried by each spawned particle.
pub const TRAIL_LEN: usize = 3;

/// Census runs every this many ticks.
const CENSUS_EVERY: u64 = 60;

/// Seconds left before the particle is killed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Lifetime(pub f32);

impl Component for Lifetime {
    type Store = Column<Self>;

    fn type_name() -> &'static str {
        "Lifetime"
    }
}

/// One recent position. Spawned particles hold several, oldest first.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Waypoint(pub Vec3);

impl Component for Waypoint {
    type Store = MultiColumn<Self>;

    fn type_name() -> &'static str {
        "Waypoint"
    }
}

/// Simulation state handed to systems and hooks as the context.
#[derive(Debug)]
pub struct SimState {
    rng: StdRng,
    since_spawn: f64,
    ticks: u64,
    /// Particles created by the spawner.
    pub spawned: u64,
    /// Particles whose lifetime ran out and were removed.
    pub expired: u64,
}

impl SimState {
    /// Fresh state with a deterministic random stream.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            since_spawn: 0.0,
            ticks: 0,
            spawned: 0,
            expired: 0,
        }
    }

    fn next_velocity(&mut self) -> Velocity {
        let mut axis = || self.rng.gen_range(-MAX_SPEED..MAX_SPEED);
        Velocity(Vec3::new(axis(), axis(), axis()))
    }

    fn next_lifetime(&mut self) -> Lifetime {
        let (shortest, longest) = LIFETIME_RANGE;
        Lifetime(self.rng.gen_range(shortest..=longest))
    }
}

fn sim_state(ctx: &mut Context) -> Result<&mut SimState> {
    ctx.downcast_mut::<SimState>()
        .context("simulation context is not a SimState")
}

/// Register the simulation systems in run order.
pub fn install(tick_loop: &mut TickLoop) {
    tick_loop
        .add_system(
            FnSystem::new(
                "motion",
                QueryDescriptor::new()
                    .writing::<Position>()
                    .writing::<Velocity>(),
                |_, tracker, dt| {
                    move_particles(tracker, dt as f32);
                    Ok(())
                },
            )
            .with_init(|_, tracker| {
                tracker.add_source::<Position>();
                tracker.add_source::<Velocity>();
                Ok(())
            }),
        )
        .add_system(
            FnSystem::new(
                "facing",
                QueryDescriptor::new()
                    .reading::<Position>()
                    .reading::<Velocity>()
                    .writing::<Transform3D>(),
                |_, tracker, _| {
                    face_heading(tracker);
                    Ok(())
                },
            )
            .with_init(|_, tracker| {
                tracker.add_source::<Transform3D>();
                Ok(())
            }),
        )
        .add_system(
            FnSystem::new(
                "trail",
                QueryDescriptor::new()
                    .reading::<Position>()
                    .writing::<Waypoint>(),
                |_, tracker, _| {
                    record_trail(tracker);
                    Ok(())
                },
            )
            .with_init(|_, tracker| {
                tracker.add_source::<Waypoint>();
                Ok(())
            }),
        )
        .add_system(
            FnSystem::new(
                "lifetime",
                QueryDescriptor::new().writing::<Lifetime>(),
                |_, tracker, dt| {
                    for id in age_particles(tracker, dt as f32) {
                        tracker.kill_entity(id);
                    }
                    Ok(())
                },
            )
            .with_init(|_, tracker| {
                tracker.add_source_with_hooks::<Lifetime>(Hooks::new().on_delete(
                    |ctx, _, _| {
                        if let Some(state) = ctx.downcast_mut::<SimState>() {
                            state.expired += 1;
                        }
                    },
                ));
                Ok(())
            }),
        )
        .add_system(FnSystem::new(
            "spawner",
            QueryDescriptor::new(),
            |ctx, tracker, dt| spawn_particles(ctx, tracker, dt),
        ))
        .add_system(FnSystem::new(
            "census",
            QueryDescriptor::new()
                .reading::<Position>()
                .reading::<Waypoint>(),
            |ctx, tracker, _| {
                let state = sim_state(ctx)?;
                state.ticks += 1;
                if state.ticks % CENSUS_EVERY == 0 {
                    let (plain, trailed) = census(tracker);
                    info!(tick = state.ticks, plain, trailed, "census");
                }
                Ok(())
            },
        ));
}

/// Bulk-create `count` seeded particles with random motion and lifetimes.
pub fn seed(tracker: &Tracker, state: &mut SimState, count: usize) {
    let first = tracker.create(
        state,
        &signature![Position, Velocity, Transform3D, Lifetime],
        count,
    );
    Exec::<(Write<Velocity>, Write<Lifetime>)>::run(tracker, |batch| {
        let (velocities, lifetimes) = batch.columns();
        for (velocity, lifetime) in velocities.iter_mut().zip(lifetimes) {
            *velocity = state.next_velocity();
            *lifetime = state.next_lifetime();
        }
    });
    debug!(%first, count, "seeded particles");
}

fn move_particles(tracker: &Tracker, dt: f32) {
    Exec::<(Write<Position>, Write<Velocity>)>::run(tracker, |batch| {
        let (positions, velocities) = batch.columns();
        integrate_all(positions, velocities, dt);
        for (position, velocity) in positions.iter().zip(velocities) {
            velocity.bounce(position, ARENA_HALF_EXTENT);
        }
    });
}

fn face_heading(tracker: &Tracker) {
    Exec::<(Read<Position>, Read<Velocity>, Write<Transform3D>)>::run(tracker, |batch| {
        let (positions, velocities, transforms) = batch.columns();
        for ((position, velocity), transform) in positions.iter().zip(velocities).zip(transforms) {
            transform.follow(position.0, velocity.0);
        }
    });
}

fn record_trail(tracker: &Tracker) {
    Exec::<(Read<Position>, Write<Waypoint>)>::run(tracker, |batch| {
        let (positions, trails) = batch.columns();
        for (position, trail) in positions.iter().zip(trails) {
            if trail.is_empty() {
                continue;
            }
            trail.rotate_left(1);
            if let Some(newest) = trail.last_mut() {
                *newest = Waypoint(position.0);
            }
        }
    });
}

/// Count down lifetimes. Returns the particles that ran out.
fn age_particles(tracker: &Tracker, dt: f32) -> Vec<Entity> {
    Exec::<(Write<Lifetime>,)>::run(tracker, |batch| {
        let (ids, (lifetimes,)) = batch.parts();
        ids.iter()
            .zip(lifetimes)
            .filter_map(|(&id, lifetime)| {
                lifetime.0 -= dt;
                (lifetime.0 <= 0.0).then_some(id)
            })
            .collect()
    })
}

fn spawn_particles(ctx: &mut Context, tracker: &Tracker, dt: f64) -> Result<()> {
    let state = sim_state(ctx)?;
    state.since_spawn += dt;
    if state.since_spawn < SPAWN_INTERVAL {
        return Ok(());
    }
    state.since_spawn -= SPAWN_INTERVAL;

    let bundles: Vec<_> = (0..SPAWN_BURST)
        .map(|_| {
            let start = Waypoint(Vec3::ZERO);
            (
                Position::default(),
                state.next_velocity(),
                Transform3D::IDENTITY,
                state.next_lifetime(),
                start,
                start,
                start,
            )
        })
        .collect();
    state.spawned += bundles.len() as u64;

    for bundle in bundles {
        tracker.create_with(ctx, bundle);
    }
    Ok(())
}

/// Particles without and with a trail, in that order.
fn census(tracker: &Tracker) -> (usize, usize) {
    Exec::<Packs<((Read<Position>,), (Read<Position>, Read<Waypoint>))>>::run(
        tracker,
        |(plain, trailed)| (plain.len(), trailed.len()),
    )
}
