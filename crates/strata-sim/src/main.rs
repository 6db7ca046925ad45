//! Particle simulation driver
//!
//! Spawns a fountain of particles, integrates them on the rayon pool in
//! chunks, tags the ones that hit the ground and recycles expired ones.
//!
//! Configuration (environment):
//! - `SIM_ENTITIES` - live particle count (default 100000)
//! - `SIM_CHUNK_SIZE` - rows per parallel chunk (default 4096)
//! - `SIM_FRAMES` - frames to run (default 600)
//! - `RUST_LOG` - extra tracing directives

use std::{sync::Arc, time::Instant};

use parking_lot::Mutex;
use strata_ecs::{Component, EntityId, Hooks, TagId, World};
use tracing::{debug, info};

#[derive(Component, Debug, Clone, Copy)]
#[component(id = 1)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Component, Debug, Clone, Copy)]
#[component(id = 2)]
struct Velocity {
    x: f32,
    y: f32,
}

/// Frames left before the particle expires.
#[derive(Component, Debug, Clone, Copy)]
#[component(id = 3)]
struct Lifetime(u32);

const GROUNDED: TagId = TagId::tag(0);

const GRAVITY: f32 = -9.81;
const DT: f32 = 1.0 / 60.0;
/// Fraction of vertical speed kept on a bounce.
const RESTITUTION: f32 = 0.6;

#[derive(Debug, Default)]
struct Stats {
    spawned: u64,
    expired: u64,
    /// Furthest horizontal distance reached by an expired particle.
    max_range: f32,
}

struct Config {
    entities: usize,
    chunk_size: usize,
    frames: u32,
}

impl Config {
    fn from_env() -> Self {
        Self {
            entities: env_or("SIM_ENTITIES", 100_000),
            chunk_size: env_or("SIM_CHUNK_SIZE", 4096).max(1),
            frames: env_or("SIM_FRAMES", 600),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Deterministic emitter: spreads launch angles over the particle index.
fn particle(index: u64, frame: u32) -> (Position, Velocity, Lifetime) {
    let spread = (index.wrapping_mul(2_654_435_761) % 1000) as f32 / 1000.0;
    let angle = std::f32::consts::FRAC_PI_4 + (spread - 0.5);
    let speed = 4.0f32.mul_add(spread, 8.0);
    let lifetime = 120 + ((index + u64::from(frame)) % 240) as u32;

    (
        Position { x: 0.0, y: 0.0 },
        Velocity {
            x: speed * angle.cos(),
            y: speed * angle.sin(),
        },
        Lifetime(lifetime),
    )
}

fn build_world(stats: &Arc<Mutex<Stats>>) -> eyre::Result<World> {
    let on_added = Arc::clone(stats);
    let on_removed = Arc::clone(stats);

    let hooks = Hooks::new()
        .on_entity_added(move |_, _| on_added.lock().spawned += 1)
        .on_entity_removed(move |world, entity| {
            let range = world
                .get_component::<Position>(entity)
                .map_or(0.0, |p| p.x.abs());
            let mut stats = on_removed.lock();
            stats.expired += 1;
            stats.max_range = stats.max_range.max(range);
        });

    let mut world = World::builder().observer(hooks).build();
    world.register::<Position>()?;
    world.register::<Velocity>()?;
    world.register::<Lifetime>()?;
    Ok(world)
}

fn step(world: &mut World, config: &Config, frame: u32, next_index: &mut u64) -> eyre::Result<()> {
    world
        .query::<(&mut Position, &mut Velocity)>()
        .par_for_each_mut(world, config.chunk_size, |_, (p, v)| {
            v.y = GRAVITY.mul_add(DT, v.y);
            p.x = v.x.mul_add(DT, p.x);
            p.y = v.y.mul_add(DT, p.y);
            if p.y < 0.0 {
                p.y = 0.0;
                v.y = -v.y * RESTITUTION;
            }
        });

    let mut landed = Vec::new();
    for (entity, p) in world.query::<&Position>().iter(world) {
        if p.y <= 0.0 && !world.has_tag(GROUNDED, entity) {
            landed.push(entity);
        }
    }
    for entity in landed {
        world.add_tag(GROUNDED, entity)?;
    }

    let mut expired: Vec<EntityId> = Vec::new();
    world
        .query::<&mut Lifetime>()
        .for_each(world, |entity, lifetime| {
            lifetime.0 = lifetime.0.saturating_sub(1);
            if lifetime.0 == 0 {
                expired.push(entity);
            }
        });

    for &entity in &expired {
        world.remove_entity(entity)?;
    }
    for _ in 0..expired.len() {
        world.spawn(particle(*next_index, frame))?;
        *next_index += 1;
    }

    debug!(frame, expired = expired.len(), "step");
    Ok(())
}

fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("strata_sim=info".parse()?)
                .add_directive("strata_ecs=info".parse()?),
        )
        .init();

    let config = Config::from_env();
    info!(
        entities = config.entities,
        chunk_size = config.chunk_size,
        frames = config.frames,
        threads = rayon::current_num_threads(),
        "starting particle simulation"
    );

    let stats = Arc::new(Mutex::new(Stats::default()));
    let mut world = build_world(&stats)?;

    let mut next_index = 0;
    for _ in 0..config.entities {
        world.spawn(particle(next_index, 0))?;
        next_index += 1;
    }

    let grounded = world.query::<&Position>().with_tag(GROUNDED);
    let start = Instant::now();

    for frame in 1..=config.frames {
        step(&mut world, &config, frame, &mut next_index)?;

        if frame % 60 == 0 {
            let stats = stats.lock();
            info!(
                frame,
                live = world.entity_count(),
                grounded = grounded.count(&world),
                archetypes = world.archetype_count(),
                spawned = stats.spawned,
                expired = stats.expired,
                "progress"
            );
        }
    }

    let elapsed = start.elapsed();
    world.assert_consistent();

    let stats = stats.lock();
    info!(
        frames = config.frames,
        elapsed_ms = elapsed.as_millis() as u64,
        per_frame_us = elapsed.as_micros() as u64 / u64::from(config.frames.max(1)),
        expired = stats.expired,
        max_range = stats.max_range,
        "simulation finished"
    );

    Ok(())
}
