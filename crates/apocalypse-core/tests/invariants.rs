//! Properties every step must keep, checked over multi-tick runs on a
//! single tile: conservation of entities, the one-cell movement bound,
//! one-way lifecycles and reproducibility from a seed.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::missing_panics_doc
)]

use std::mem;

use apocalypse_agents::{LifecycleConfig, MovementConfig, StreamRng};
use apocalypse_core::seed::{Population, seed_population};
use apocalypse_core::step::{Schedule, StepContext, finish_step, step};
use apocalypse_types::{Bearing, Entity, EntityKind, Gender, Living, Stats, YEAR};
use apocalypse_world::{EntityAllocator, HALO, LocalExchange, World};

// =============================================================================
// Helpers
// =============================================================================

/// Advance `current` by one tick through `next`, leaving the new generation
/// in `current` and an empty world in `next`. Returns the tile statistics.
fn tick(current: &mut World, next: &mut World, ctx: &StepContext<'_>) -> Stats {
    let mut exchange = LocalExchange::new();
    step(current, next, ctx, &mut exchange).unwrap();
    finish_step(next, &mut exchange, ctx.allocator).unwrap();
    let stats = next.stats;
    mem::swap(current, next);
    next.reset(ctx.allocator);
    stats
}

fn seeded(
    size: usize,
    population: Population,
    seed: u64,
    lifecycle: &LifecycleConfig,
    allocator: &EntityAllocator,
) -> World {
    let mut world = World::new(size, size).unwrap();
    let mut rng = StreamRng::for_seeding(seed, 0);
    seed_population(&mut world, population, &mut rng, lifecycle, 0.5, allocator).unwrap();
    world
}

fn turbulent() -> LifecycleConfig {
    LifecycleConfig {
        death_child: 0.002,
        death_young: 0.002,
        death_middle_age: 0.004,
        death_elderly: 0.01,
        decomposition_young: 0.02,
        decomposition_old: 0.05,
        p_become_zombie: 0.2,
        p_infection: 0.3,
        p_fertilization: 0.2,
        ..LifecycleConfig::default()
    }
}

fn adult(gender: Gender) -> Living {
    Living {
        gender,
        origin: -30 * YEAR,
        fertility_start: 15 * YEAR,
        fertility_end: 45 * YEAR,
        pending_children: 0,
        children_due: 0,
    }
}

fn torus_distance(a: usize, b: usize, size: usize) -> usize {
    let d = a.abs_diff(b);
    d.min(size - d)
}

// =============================================================================
// Conservation
// =============================================================================

fn assert_conserved(schedule: Schedule) {
    let lifecycle = turbulent();
    let movement = MovementConfig::default();
    let allocator = EntityAllocator::new();
    let population = Population {
        humans: 300,
        zombies: 20,
    };
    let mut current = seeded(32, population, 5, &lifecycle, &allocator);
    let mut next = World::new(32, 32).unwrap();
    let ctx = StepContext {
        lifecycle: &lifecycle,
        movement: &movement,
        allocator: &allocator,
        seed: 5,
        schedule,
    };

    for _ in 0..25 {
        let before = current.occupied() as u64;
        let stats = tick(&mut current, &mut next, &ctx);
        let after = current.occupied() as u64;
        assert_eq!(
            before + stats.births(),
            after + stats.deaths() + stats.zombies_decomposed + stats.lost_in_transit,
            "tick {}: {stats:?}",
            current.clock
        );
        assert_eq!(
            current.census().population(),
            stats.population() + stats.births() - stats.lost_in_transit
        );
    }
}

#[test]
fn sequential_steps_conserve_entities() {
    assert_conserved(Schedule::Sequential);
}

#[test]
fn parallel_steps_conserve_entities() {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(4)
        .build()
        .unwrap();
    pool.install(|| assert_conserved(Schedule::Parallel));
}

#[test]
fn crowded_world_loses_nobody() {
    let lifecycle = LifecycleConfig {
        children_per_female: 0.0,
        ..LifecycleConfig::inert()
    };
    let movement = MovementConfig::default();
    let population = Population {
        humans: 250,
        zombies: 40,
    };
    for seed in 0..10 {
        let allocator = EntityAllocator::new();
        let mut current = seeded(20, population, seed, &lifecycle, &allocator);
        let mut next = World::new(20, 20).unwrap();
        let ctx = StepContext {
            lifecycle: &lifecycle,
            movement: &movement,
            allocator: &allocator,
            seed,
            schedule: Schedule::Sequential,
        };
        let cells = |world: &World| -> Vec<(usize, usize)> {
            world.snapshot().into_iter().map(|(x, y, _)| (x, y)).collect()
        };
        let mut moved = 0;
        for _ in 0..30 {
            let before = cells(&current);
            let stats = tick(&mut current, &mut next, &ctx);
            assert_eq!(stats.lost_in_transit, 0, "seed {seed}, tick {}", current.clock);
            assert_eq!(current.occupied(), 290, "seed {seed}, tick {}", current.clock);
            if cells(&current) != before {
                moved += 1;
            }
        }
        assert!(moved > 0, "seed {seed}: nobody ever moved");
    }
}

// =============================================================================
// Movement bound
// =============================================================================

#[test]
fn entities_move_at_most_one_cell_per_tick() {
    const SIZE: usize = 8;
    let lifecycle = LifecycleConfig::inert();
    let movement = MovementConfig {
        random_bearing_magnitude: 1.0,
        ..MovementConfig::default()
    };

    for seed in 0..12 {
        let allocator = EntityAllocator::new();
        let mut current = World::new(SIZE, SIZE).unwrap();
        let walker = Entity::Human {
            living: adult(Gender::Male),
            bearing: Bearing::ZERO,
        };
        current
            .place(3 + HALO, 4 + HALO, walker, &allocator)
            .unwrap();
        let mut next = World::new(SIZE, SIZE).unwrap();
        let ctx = StepContext {
            lifecycle: &lifecycle,
            movement: &movement,
            allocator: &allocator,
            seed,
            schedule: Schedule::Sequential,
        };

        let mut position = (3, 4);
        let mut moves = 0;
        for _ in 0..40 {
            tick(&mut current, &mut next, &ctx);
            let snapshot = current.snapshot();
            assert_eq!(snapshot.len(), 1);
            let (x, y, _) = snapshot[0];
            let dx = torus_distance(x, position.0, SIZE);
            let dy = torus_distance(y, position.1, SIZE);
            assert!(dx.max(dy) <= 1, "seed {seed}: jumped from {position:?} to {:?}", (x, y));
            assert!(dx + dy <= 1, "seed {seed}: diagonal move");
            if (x, y) != position {
                moves += 1;
            }
            position = (x, y);
        }
        assert!(moves > 0, "seed {seed}: walker never moved");
    }
}

// =============================================================================
// Lifecycle monotonicity
// =============================================================================

const fn rank(kind: Option<EntityKind>) -> u8 {
    match kind {
        Some(EntityKind::Human) => 0,
        Some(EntityKind::Infected) => 1,
        Some(EntityKind::Zombie) => 2,
        None => 3,
    }
}

#[test]
fn lifecycles_only_move_forward() {
    let lifecycle = LifecycleConfig {
        death_young: 0.03,
        death_middle_age: 0.03,
        p_infection: 0.4,
        p_become_zombie: 0.3,
        ..LifecycleConfig::inert()
    };
    let movement = MovementConfig::still();

    for seed in 0..16 {
        let allocator = EntityAllocator::new();
        let mut current = World::new(6, 6).unwrap();
        let biter = Entity::Zombie {
            became_zombie: 0,
            bearing: Bearing::ZERO,
        };
        let victim = Entity::Human {
            living: adult(Gender::Male),
            bearing: Bearing::ZERO,
        };
        current.place(2 + HALO, 2 + HALO, biter, &allocator).unwrap();
        current.place(3 + HALO, 2 + HALO, victim, &allocator).unwrap();
        let mut next = World::new(6, 6).unwrap();
        let ctx = StepContext {
            lifecycle: &lifecycle,
            movement: &movement,
            allocator: &allocator,
            seed,
            schedule: Schedule::Sequential,
        };

        let mut last = rank(Some(EntityKind::Human));
        for _ in 0..40 {
            tick(&mut current, &mut next, &ctx);
            let now = rank(current.occupant(3 + HALO, 2 + HALO).map(|e| e.kind()));
            assert!(now >= last, "seed {seed}: went from rank {last} back to {now}");
            last = now;
        }
        assert!(last > 0, "seed {seed}: forced rates never touched the victim");
    }
}

#[test]
fn forced_rates_walk_the_whole_lifecycle() {
    let lifecycle = LifecycleConfig {
        p_infection: 1.0,
        p_become_zombie: 1.0,
        ..LifecycleConfig::inert()
    };
    let movement = MovementConfig::still();
    let allocator = EntityAllocator::new();
    let mut current = World::new(6, 6).unwrap();
    let biter = Entity::Zombie {
        became_zombie: 0,
        bearing: Bearing::ZERO,
    };
    let victim = Entity::Human {
        living: adult(Gender::Female),
        bearing: Bearing::ZERO,
    };
    current.place(2 + HALO, 2 + HALO, biter, &allocator).unwrap();
    current.place(2 + HALO, 3 + HALO, victim, &allocator).unwrap();
    let mut next = World::new(6, 6).unwrap();
    let ctx = StepContext {
        lifecycle: &lifecycle,
        movement: &movement,
        allocator: &allocator,
        seed: 1,
        schedule: Schedule::Sequential,
    };

    let kinds: Vec<Option<EntityKind>> = (0..3)
        .map(|_| {
            tick(&mut current, &mut next, &ctx);
            current.occupant(2 + HALO, 3 + HALO).map(|e| e.kind())
        })
        .collect();
    assert_eq!(
        kinds,
        vec![
            Some(EntityKind::Infected),
            Some(EntityKind::Zombie),
            Some(EntityKind::Zombie),
        ]
    );
}

// =============================================================================
// Determinism
// =============================================================================

fn final_snapshot(seed: u64) -> Vec<(usize, usize, Entity)> {
    run_snapshot(seed, Schedule::Sequential)
}

fn run_snapshot(seed: u64, schedule: Schedule) -> Vec<(usize, usize, Entity)> {
    let lifecycle = turbulent();
    let movement = MovementConfig::default();
    let allocator = EntityAllocator::new();
    let population = Population {
        humans: 200,
        zombies: 15,
    };
    let mut current = seeded(24, population, seed, &lifecycle, &allocator);
    let mut next = World::new(24, 24).unwrap();
    let ctx = StepContext {
        lifecycle: &lifecycle,
        movement: &movement,
        allocator: &allocator,
        seed,
        schedule,
    };
    for _ in 0..15 {
        tick(&mut current, &mut next, &ctx);
    }
    current.snapshot()
}

#[test]
fn same_seed_same_world() {
    assert_eq!(final_snapshot(77), final_snapshot(77));
}

#[test]
fn thread_count_does_not_change_the_world() {
    let sequential = final_snapshot(31);
    for threads in [2, 4, 7] {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap();
        let parallel = pool.install(|| run_snapshot(31, Schedule::Parallel));
        assert_eq!(parallel, sequential, "{threads} threads");
    }
}

#[test]
fn different_seed_different_world() {
    assert_ne!(final_snapshot(77), final_snapshot(78));
}
