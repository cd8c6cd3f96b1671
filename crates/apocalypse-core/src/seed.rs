//! The initial population.
//!
//! Each tile seeds its own interior: Humans at the configured density of
//! its area, and its share of the initial zombies. Entities are dropped on
//! uniformly random interior cells, retrying on occupied ones.

use apocalypse_agents::{LifecycleConfig, RandomSource, new_human, new_zombie};
use apocalypse_types::{Entity, Living, Stats};
use apocalypse_world::{EntityAllocator, Geometry, World, WorldError, size_of_part};
use tracing::{debug, warn};

use crate::config::WorldConfig;

/// How many entities of each kind a tile starts with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Population {
    /// Humans.
    pub humans: usize,
    /// Zombies.
    pub zombies: usize,
}

/// The initial population of the tile described by `geometry`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn initial_population(config: &WorldConfig, geometry: &Geometry) -> Population {
    let area = geometry.width().saturating_mul(geometry.height());
    let humans = (area as f64 * config.initial_density).floor() as usize;
    let layout = geometry.layout();
    let zombies = size_of_part(
        usize::try_from(config.initial_zombies).unwrap_or(usize::MAX),
        layout.tile_count(),
        layout.rank(geometry.position()),
    );
    Population { humans, zombies }
}

/// Place `population` on random free interior cells of `world` at its
/// current clock.
///
/// The counts are capped at the number of free interior cells. The seeded
/// population is recorded in `world.stats` and returned.
///
/// # Errors
///
/// Returns a [`WorldError`] if a chosen cell cannot be written.
pub fn seed_population<R: RandomSource + ?Sized>(
    world: &mut World,
    population: Population,
    rng: &mut R,
    lifecycle: &LifecycleConfig,
    bearing_magnitude: f32,
    allocator: &EntityAllocator,
) -> Result<Stats, WorldError> {
    let geometry = *world.geometry();
    let capacity = geometry
        .width()
        .saturating_mul(geometry.height())
        .saturating_sub(world.occupied());
    let humans = population.humans.min(capacity);
    let zombies = population.zombies.min(capacity.saturating_sub(humans));
    if humans.saturating_add(zombies) < population.humans.saturating_add(population.zombies) {
        warn!(
            tile = %geometry.position(),
            requested_humans = population.humans,
            requested_zombies = population.zombies,
            capacity,
            "Initial population exceeds the tile, capping it"
        );
    }

    let now = world.clock;
    let mut stats = Stats::default();
    for _ in 0..humans {
        let human = new_human(rng, now, lifecycle, bearing_magnitude);
        place_randomly(world, &geometry, human, rng, allocator, &mut stats)?;
    }
    for _ in 0..zombies {
        let zombie = new_zombie(rng, now, bearing_magnitude);
        place_randomly(world, &geometry, zombie, rng, allocator, &mut stats)?;
    }

    debug!(
        tile = %geometry.position(),
        humans,
        zombies,
        pregnant = stats.human_females_pregnant,
        "Population seeded"
    );
    world.stats = stats;
    Ok(stats)
}

fn place_randomly<R: RandomSource + ?Sized>(
    world: &mut World,
    geometry: &Geometry,
    entity: Entity,
    rng: &mut R,
    allocator: &EntityAllocator,
    stats: &mut Stats,
) -> Result<(), WorldError> {
    let (x, y) = loop {
        let x = draw_index(rng, geometry.x_start(), geometry.x_end());
        let y = draw_index(rng, geometry.y_start(), geometry.y_end());
        if matches!(world.cell_mut(x, y), Some(cell) if cell.is_empty()) {
            break (x, y);
        }
    };
    stats.count(&entity);
    if entity.living().is_some_and(Living::is_pregnant) {
        stats.record_pregnant(entity.kind());
    }
    world.place(x, y, entity, allocator)
}

fn draw_index<R: RandomSource + ?Sized>(rng: &mut R, first: usize, last: usize) -> usize {
    let min = i64::try_from(first).unwrap_or(i64::MAX);
    let max = i64::try_from(last).unwrap_or(i64::MAX);
    usize::try_from(rng.uniform_int(min, max)).unwrap_or(first)
}
