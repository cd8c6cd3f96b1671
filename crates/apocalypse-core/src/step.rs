//! The step engine: one generation of one tile.
//!
//! [`step`] turns the `input` generation (tick `t`) into the `output`
//! generation (tick `t + 1`) in four phases:
//!
//! 1. **Fates** -- death, decomposition and turning, applied in place to
//!    the input. Every cell only touches itself, so columns run in parallel
//!    without locks.
//!
//! 2. **Border exchange** -- the input halo is filled with the neighbours'
//!    edge lines, so lookahead across a tile edge sees the real
//!    neighbourhood.
//!
//! 3. **Advance** -- for every interior cell: infection, birth, mating,
//!    counting and movement. The input is only read; results go into the
//!    output, whose columns are written under three-column lock windows.
//!    Births and moves need a cell that is free in both generations, so the
//!    first entity to claim a cell gets it. Columns run in phases whose
//!    windows never overlap (see [`apocalypse_world::Geometry::column_phases`]), and the phase
//!    order and the row direction are drawn once per tick, so who claims
//!    first does not depend on how many threads share the work.
//!
//! 4. **Ghost send** -- entities that landed in halo ring 1 of the output
//!    are shipped to the tile that owns that cell.
//!
//! [`finish_step`] then merges the ghosts the neighbours sent and combines
//! the statistics of every tile. The caller swaps the generations and
//! resets the old input.
//!
//! Every stochastic decision of an entity draws from a stream keyed by
//! seed, tick and the global coordinates of its cell. The same seed gives
//! the same world under either [`Schedule`] and any thread count, and a
//! cell draws the same numbers whichever tile it belongs to.

use core::ops::RangeInclusive;

use apocalypse_agents::{
    Fate, LifecycleConfig, MovementConfig, RandomSource, StreamRng, adjacent_zombies,
    can_conceive, conception_probability, decide_move, give_birth, has_fertile_partner, mate,
    natural_fate, pick, resolve_destination, try_infect,
};
use apocalypse_types::{CARDINAL_PERMUTATIONS, Direction, Entity, Living, Stats, Tick};
use apocalypse_world::{
    BorderExchange, ColumnWindow, EntityAllocator, ExchangeError, GridView, LocalPool,
    MIN_COLUMNS_PER_WORKER, World, WorldError, begin_border_exchange, begin_ghost_exchange,
    finish_border_exchange, finish_ghost_exchange,
};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Errors that can occur during a step.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    /// A halo exchange or the statistics reduction failed.
    #[error("exchange error: {source}")]
    Exchange {
        /// The underlying exchange error.
        #[from]
        source: ExchangeError,
    },

    /// A grid operation failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// The clock cannot advance any further.
    #[error("clock overflow after tick {clock}")]
    ClockOverflow {
        /// The last tick.
        clock: Tick,
    },
}

/// How the columns of the advance phase are distributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Schedule {
    /// One column after the other on the calling thread.
    #[default]
    Sequential,
    /// The columns of each phase spread over the current rayon pool.
    Parallel,
}

/// Everything a step needs besides the two generations.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Lifecycle parameters.
    pub lifecycle: &'a LifecycleConfig,
    /// Movement parameters.
    pub movement: &'a MovementConfig,
    /// Pool for the entity records of both generations.
    pub allocator: &'a EntityAllocator,
    /// Run seed.
    pub seed: u64,
    /// Column distribution.
    pub schedule: Schedule,
}

/// Summary of a single step on one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSummary {
    /// The tick that was produced.
    pub clock: Tick,
    /// This tile's statistics before the ghost merge.
    pub stats: Stats,
}

/// Per-tick values shared by every column.
#[derive(Debug)]
struct TickParams {
    now: Tick,
    conception: f64,
    rows: Vec<usize>,
}

/// Produce `output` from `input`.
///
/// `output` must be empty. On return its ghosts are in flight; complete
/// the step with [`finish_step`].
///
/// # Errors
///
/// Returns [`StepError`] if an exchange fails or the clock overflows.
pub fn step<E: BorderExchange + ?Sized>(
    input: &mut World,
    output: &mut World,
    ctx: &StepContext<'_>,
    exchange: &mut E,
) -> Result<StepSummary, StepError> {
    let now = input
        .clock
        .checked_add(1)
        .ok_or(StepError::ClockOverflow { clock: input.clock })?;
    output.clock = now;
    output.history = input.history;
    output.stats = Stats::default();

    let geometry = *input.geometry();

    // Phase 1: fates.
    let fates = apply_fates(input, ctx, now);

    // Phase 2: border exchange.
    begin_border_exchange(input, exchange)?;
    finish_border_exchange(input, exchange, ctx.allocator)?;

    // Phase 3: advance.
    let mut scan = StreamRng::for_tick(ctx.seed, now);
    let mut phases = geometry.column_phases();
    if scan.uniform() < 0.5 {
        phases.reverse();
    }
    let tick = TickParams {
        now,
        conception: conception_probability(ctx.lifecycle, &input.history, geometry.layout().area()),
        rows: scan_order(geometry.interior_rows(), scan.uniform() < 0.5),
    };
    let view = input.view();
    let next: &World = output;
    let mut advanced = Stats::default();
    match ctx.schedule {
        Schedule::Sequential => {
            let mut pool = ctx.allocator.local();
            for &x in phases.iter().flatten() {
                advanced.merge(&advance_column(x, &view, next, ctx, &tick, &mut pool)?);
            }
        }
        Schedule::Parallel => {
            for phase in &phases {
                let stats = phase
                    .par_iter()
                    .with_min_len(MIN_COLUMNS_PER_WORKER)
                    .map_init(
                        || ctx.allocator.local(),
                        |pool, &x| advance_column(x, &view, next, ctx, &tick, pool),
                    )
                    .try_reduce(Stats::default, |mut total, column| {
                        total.merge(&column);
                        Ok(total)
                    })?;
                advanced.merge(&stats);
            }
        }
    }

    output.stats.merge(&fates);
    output.stats.merge(&advanced);
    let stats = output.stats;

    // Phase 4: ghost send.
    begin_ghost_exchange(output, exchange, ctx.allocator)?;

    Ok(StepSummary { clock: now, stats })
}

/// Merge the ghosts sent by the neighbours into `output` and combine the
/// statistics of every tile. Returns the global statistics of the tick.
///
/// # Errors
///
/// Returns [`StepError::Exchange`] if a neighbour or the reduction fails.
pub fn finish_step<E: BorderExchange + ?Sized>(
    output: &mut World,
    exchange: &mut E,
    allocator: &EntityAllocator,
) -> Result<Stats, StepError> {
    finish_ghost_exchange(output, exchange, allocator)?;
    let global = publish_stats(output, exchange)?;
    debug!(
        tick = output.clock,
        humans = global.humans(),
        infected = global.infected(),
        zombies = global.zombies,
        lost = global.lost_in_transit,
        "Step finished"
    );
    Ok(global)
}

/// Sum `world.stats` over every tile, store the total as the world's
/// global statistics and fold it into the run history.
///
/// # Errors
///
/// Returns [`StepError::Exchange`] if the reduction fails.
pub fn publish_stats<E: BorderExchange + ?Sized>(
    world: &mut World,
    exchange: &mut E,
) -> Result<Stats, StepError> {
    let global = exchange.all_reduce(world.clock, &world.stats)?;
    world.global_stats = global;
    world.history.advance(&global);
    Ok(global)
}

fn scan_order(range: RangeInclusive<usize>, forward: bool) -> Vec<usize> {
    if forward {
        range.collect()
    } else {
        range.rev().collect()
    }
}

// ---------------------------------------------------------------------------
// Phase 1
// ---------------------------------------------------------------------------

fn apply_fates(world: &mut World, ctx: &StepContext<'_>, now: Tick) -> Stats {
    let geometry = *world.geometry();
    let rows = geometry.interior_rows();
    let magnitude = ctx.movement.random_bearing_magnitude;
    world
        .par_interior_columns_mut()
        .with_min_len(MIN_COLUMNS_PER_WORKER)
        .map_init(
            || ctx.allocator.local(),
            |pool, (x, column)| {
                let mut stats = Stats::default();
                let Some(cells) = column.get_mut(rows.clone()) else {
                    return stats;
                };
                for (y, cell) in rows.clone().zip(cells) {
                    let Some(record) = cell.occupant.as_mut() else {
                        continue;
                    };
                    let (gx, gy) = geometry.global(x, y);
                    let mut rng = StreamRng::for_fates(ctx.seed, now, gx, gy);
                    match natural_fate(&mut rng, record, now, ctx.lifecycle, magnitude) {
                        Fate::Unchanged => {}
                        Fate::Turned(gender) => stats.record_zombification(gender),
                        Fate::Died | Fate::Decomposed => {
                            if let Some(record) = cell.take() {
                                stats.record_death(&record);
                                pool.release(record);
                            }
                        }
                    }
                }
                stats
            },
        )
        .reduce(Stats::default, |mut total, column| {
            total.merge(&column);
            total
        })
}

// ---------------------------------------------------------------------------
// Phase 3
// ---------------------------------------------------------------------------

fn advance_column(
    x: usize,
    view: &GridView<'_>,
    output: &World,
    ctx: &StepContext<'_>,
    tick: &TickParams,
    pool: &mut LocalPool<'_>,
) -> Result<Stats, WorldError> {
    let window = output
        .lock_window(x)
        .ok_or(WorldError::CellOutOfRange { x, y: 0 })?;
    let column = ColumnStep {
        ctx,
        tick,
        view,
        window,
        pool,
        stats: Stats::default(),
        x,
    };
    Ok(column.run())
}

/// The advance phase of one column, holding its lock window.
struct ColumnStep<'a, 'p, 'q> {
    ctx: &'a StepContext<'a>,
    tick: &'a TickParams,
    view: &'a GridView<'a>,
    window: ColumnWindow<'a>,
    pool: &'p mut LocalPool<'q>,
    stats: Stats,
    x: usize,
}

impl ColumnStep<'_, '_, '_> {
    fn run(mut self) -> Stats {
        let tick = self.tick;
        for &y in &tick.rows {
            if let Some(&entity) = self.view.entity(self.x, y) {
                self.advance(y, entity);
            }
        }
        self.stats
    }

    fn advance(&mut self, y: usize, mut entity: Entity) {
        let now = self.tick.now;
        let lifecycle = self.ctx.lifecycle;
        let (gx, gy) = self.view.geometry().global(self.x, y);
        let mut rng = StreamRng::for_cell(self.ctx.seed, now, gx, gy);

        let zombies = adjacent_zombies(self.view, self.x, y);
        let magnitude = self.ctx.movement.random_bearing_magnitude;
        if let Some(gender) =
            try_infect(&mut rng, &mut entity, zombies, now, lifecycle, magnitude)
        {
            self.stats.record_infection(gender);
        }

        self.deliver(&mut rng, y, &mut entity);

        if can_conceive(&entity, now) && has_fertile_partner(&mut rng, self.view, self.x, y, now) {
            let conceived = mate(&mut rng, &mut entity, now, self.tick.conception, lifecycle);
            self.stats.record_mating(conceived);
        }

        self.stats.count(&entity);
        self.relocate(&mut rng, y, entity);
    }

    /// Births of a pregnant mother: deliver while she carries children and
    /// a free cell is left; the rest waits for the next tick.
    fn deliver(&mut self, rng: &mut StreamRng, y: usize, mother: &mut Entity) {
        let now = self.tick.now;
        let Some(living) = mother.living() else {
            return;
        };
        if !living.is_female() || !living.is_pregnant() {
            return;
        }
        if !living.is_due(now) {
            self.stats.record_pregnant(mother.kind());
            return;
        }
        self.stats.record_giving_birth(mother.kind());
        while mother.living().is_some_and(Living::is_pregnant) {
            let Some((cx, cy)) = self.free_birth_cell(rng, y) else {
                break;
            };
            let Some(child) = give_birth(rng, mother, now, self.ctx.lifecycle) else {
                break;
            };
            self.stats.record_birth(&child);
            if let Some(cell) = self.window.cell_mut(cx, cy) {
                cell.occupant = Some(self.pool.allocate(child));
            }
        }
    }

    /// A free cardinal neighbour for a newborn, as the output cell it
    /// settles on.
    fn free_birth_cell(&self, rng: &mut StreamRng, y: usize) -> Option<(usize, usize)> {
        let order = CARDINAL_PERMUTATIONS.get(pick(rng, CARDINAL_PERMUTATIONS.len()))?;
        let direction = order.iter().copied().find(|&d| self.is_free(y, d))?;
        self.destination(y, direction)
    }

    /// The output cell a step in `direction` lands on.
    fn destination(&self, y: usize, direction: Direction) -> Option<(usize, usize)> {
        let geometry = self.view.geometry();
        let (nx, ny) = geometry.step(self.x, y, direction)?;
        Some(geometry.settle(nx, ny))
    }

    /// Free in the input and not yet taken in the output.
    fn is_free(&self, y: usize, direction: Direction) -> bool {
        self.view.is_free_toward(self.x, y, direction)
            && self
                .destination(y, direction)
                .is_some_and(|(nx, ny)| self.window.is_empty(nx, ny))
    }

    fn relocate(&mut self, rng: &mut StreamRng, y: usize, mut entity: Entity) {
        let now = self.tick.now;
        let decision = decide_move(rng, self.view, self.x, y, &entity, now, self.ctx.movement);
        entity.set_bearing(decision.bearing);
        let direction = resolve_destination(decision.direction, |d| self.is_free(y, d));
        let (tx, ty) = self.destination(y, direction).unwrap_or((self.x, y));
        match self.window.cell_mut(tx, ty) {
            Some(cell) if cell.is_empty() => cell.occupant = Some(self.pool.allocate(entity)),
            _ => {
                self.stats.record_lost();
                warn!(tick = now, x = tx, y = ty, "Destination already taken, entity lost");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use apocalypse_agents::BirthPolicy;
    use apocalypse_types::{Bearing, EntityKind, Gender, YEAR};
    use apocalypse_world::{HALO, LocalExchange};

    use super::*;

    fn adult(gender: Gender) -> Living {
        Living {
            gender,
            origin: -25 * YEAR,
            fertility_start: 15 * YEAR,
            fertility_end: 45 * YEAR,
            pending_children: 0,
            children_due: 0,
        }
    }

    fn human(living: Living) -> Entity {
        Entity::Human {
            living,
            bearing: Bearing::ZERO,
        }
    }

    fn put(world: &mut World, x: usize, y: usize, entity: Entity, allocator: &EntityAllocator) {
        world.place(x + HALO, y + HALO, entity, allocator).unwrap();
    }

    fn run_once(
        input: &mut World,
        lifecycle: &LifecycleConfig,
        schedule: Schedule,
        allocator: &EntityAllocator,
    ) -> World {
        let movement = MovementConfig::still();
        let ctx = StepContext {
            lifecycle,
            movement: &movement,
            allocator,
            seed: 3,
            schedule,
        };
        let mut output = World::new(input.width(), input.height()).unwrap();
        let mut exchange = LocalExchange::new();
        step(input, &mut output, &ctx, &mut exchange).unwrap();
        finish_step(&mut output, &mut exchange, allocator).unwrap();
        output
    }

    #[test]
    fn clock_and_history_advance() {
        let allocator = EntityAllocator::new();
        let mut input = World::new(6, 6).unwrap();
        input.clock = 41;
        input.history.human_males_died = 3;
        put(&mut input, 1, 1, human(adult(Gender::Male)), &allocator);
        let output = run_once(&mut input, &LifecycleConfig::inert(), Schedule::Sequential, &allocator);
        assert_eq!(output.clock, 42);
        assert_eq!(output.global_stats.human_males, 1);
        assert_eq!(output.history.human_males, 1);
        assert_eq!(output.history.human_males_died, 3);
        assert_eq!(output.occupant(1 + HALO, 1 + HALO), Some(human(adult(Gender::Male))));
    }

    #[test]
    fn dead_and_decomposed_leave_the_grid() {
        let allocator = EntityAllocator::new();
        let mut input = World::new(6, 6).unwrap();
        put(&mut input, 0, 0, human(adult(Gender::Female)), &allocator);
        let zombie = Entity::Zombie {
            became_zombie: 0,
            bearing: Bearing::ZERO,
        };
        put(&mut input, 4, 4, zombie, &allocator);
        let lifecycle = LifecycleConfig {
            death_young: 2.0,
            decomposition_young: 2.0,
            ..LifecycleConfig::inert()
        };
        let output = run_once(&mut input, &lifecycle, Schedule::Sequential, &allocator);
        assert_eq!(output.occupied(), 0);
        assert_eq!(output.stats.human_females_died, 1);
        assert_eq!(output.stats.zombies_decomposed, 1);
        assert_eq!(output.stats.population(), 0);
        assert!(allocator.pooled(EntityKind::Human) + allocator.pooled(EntityKind::Zombie) >= 2);
    }

    #[test]
    fn infected_turn_where_they_stand() {
        let allocator = EntityAllocator::new();
        let mut input = World::new(6, 6).unwrap();
        let carrier = human(adult(Gender::Male)).infect(0, Bearing::ZERO);
        put(&mut input, 2, 3, carrier, &allocator);
        let lifecycle = LifecycleConfig {
            p_become_zombie: 2.0,
            ..LifecycleConfig::inert()
        };
        let output = run_once(&mut input, &lifecycle, Schedule::Sequential, &allocator);
        let turned = output.occupant(2 + HALO, 3 + HALO).unwrap();
        assert!(turned.is_zombie());
        assert_eq!(turned.age(output.clock), 0);
        assert_eq!(output.stats.infected_males_became_zombies, 1);
        assert_eq!(output.stats.zombies, 1);
    }

    #[test]
    fn due_mother_fills_free_neighbours() {
        let allocator = EntityAllocator::new();
        let mut input = World::new(6, 6).unwrap();
        let mother = Living {
            pending_children: 3,
            children_due: 1,
            ..adult(Gender::Female)
        };
        put(&mut input, 2, 2, human(mother), &allocator);
        put(&mut input, 2, 1, human(adult(Gender::Female)), &allocator);
        put(&mut input, 1, 2, human(adult(Gender::Female)), &allocator);
        let output = run_once(&mut input, &LifecycleConfig::inert(), Schedule::Sequential, &allocator);

        assert_eq!(output.stats.births(), 2);
        assert_eq!(output.stats.human_females_giving_birth, 1);
        assert_eq!(output.occupied(), 5);
        assert!(output.occupant(3 + HALO, 2 + HALO).is_some());
        assert!(output.occupant(2 + HALO, 3 + HALO).is_some());
        let mother = output.occupant(2 + HALO, 2 + HALO).unwrap();
        assert_eq!(mother.living().unwrap().pending_children, 1);
    }

    #[test]
    fn fertile_neighbours_mate() {
        let allocator = EntityAllocator::new();
        let mut input = World::new(6, 6).unwrap();
        put(&mut input, 2, 2, human(adult(Gender::Female)), &allocator);
        put(&mut input, 3, 2, human(adult(Gender::Male)), &allocator);
        let lifecycle = LifecycleConfig {
            p_fertilization: 2.0,
            birth_policy: BirthPolicy::Uncontrolled,
            ..LifecycleConfig::inert()
        };
        let output = run_once(&mut input, &lifecycle, Schedule::Sequential, &allocator);
        assert_eq!(output.stats.couples_making_love, 1);
        let mother = output.occupant(2 + HALO, 2 + HALO).unwrap();
        let living = mother.living().unwrap();
        assert!(living.is_pregnant());
        assert!(living.children_due > output.clock);
        assert_eq!(
            output.stats.children_conceived,
            u64::from(living.pending_children)
        );
    }

    #[test]
    fn parallel_schedule_keeps_every_entity() {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build().unwrap();
        let allocator = EntityAllocator::new();
        let mut input = World::new(24, 16).unwrap();
        for i in 0..60 {
            let (x, y) = ((i * 7) % 24, (i * 5) % 16);
            if input.occupant(x + HALO, y + HALO).is_none() {
                put(&mut input, x, y, human(adult(Gender::Male)), &allocator);
            }
        }
        let before = input.occupied();
        let output = pool.install(|| {
            run_once(&mut input, &LifecycleConfig::inert(), Schedule::Parallel, &allocator)
        });
        assert_eq!(output.occupied(), before);
        assert_eq!(output.global_stats.population(), u64::try_from(before).unwrap());
    }
}
