//! Run orchestration.
//!
//! [`run`] drives a whole simulation from a validated
//! [`SimulationConfig`]:
//!
//! - **single-threaded**: one tile, columns in order on one thread
//! - **shared memory**: one tile, columns spread over a rayon pool
//! - **distributed**: one OS thread per tile, halos exchanged over
//!   [`ChannelExchange`] endpoints
//!
//! Every tile runs the same loop in [`run_tile`]: seed, report tick 0, then
//! step, finish, report, swap and reset until the configured number of
//! ticks has passed.

use std::io;
use std::mem;
use std::thread;
use std::time::Instant;

use apocalypse_agents::StreamRng;
use apocalypse_types::{Stats, Tick};
use apocalypse_world::{
    AllocatorCounters, BorderExchange, ChannelExchange, EntityAllocator, ExchangeError,
    LocalExchange, TileLayout, TilePosition, World, WorldError,
};
use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::{ConcurrencyMode, ConfigError, SimulationConfig};
use crate::report::{Allocations, Reporter, RunSummary};
use crate::seed::{initial_population, seed_population};
use crate::step::{Schedule, StepContext, StepError, finish_step, publish_stats, step};

/// Errors that can end a run.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// The configuration is not runnable.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// A world could not be built or seeded.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// A step failed.
    #[error("step error: {source}")]
    Step {
        /// The underlying step error.
        #[from]
        source: StepError,
    },

    /// Writing output failed.
    #[error("output error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: io::Error,
    },

    /// The worker pool could not be built.
    #[error("thread pool error: {source}")]
    ThreadPool {
        /// The underlying rayon error.
        #[from]
        source: rayon::ThreadPoolBuildError,
    },

    /// A tile thread panicked.
    #[error("tile {tile} panicked")]
    TilePanicked {
        /// The tile whose thread panicked.
        tile: TilePosition,
    },
}

impl RunError {
    /// Whether this error only reports that some other tile failed first.
    const fn is_secondary(&self) -> bool {
        matches!(
            self,
            Self::Step {
                source: StepError::Exchange {
                    source: ExchangeError::PeerAborted { .. }
                        | ExchangeError::Disconnected { .. }
                        | ExchangeError::InboxClosed { .. },
                },
            }
        )
    }
}

/// Called with every generation a tile produces, starting with the seeded
/// tick 0.
pub trait TickObserver: Send {
    /// Called once `world` is complete for its clock.
    ///
    /// # Errors
    ///
    /// An error ends the run.
    fn on_tick(&mut self, world: &World) -> io::Result<()>;

    /// Called once after the last tick.
    ///
    /// # Errors
    ///
    /// An error ends the run.
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// An observer that ignores every tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpObserver;

impl TickObserver for NoOpObserver {
    fn on_tick(&mut self, _world: &World) -> io::Result<()> {
        Ok(())
    }
}

impl TickObserver for Reporter {
    fn on_tick(&mut self, world: &World) -> io::Result<()> {
        self.record(world)
    }

    fn finish(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// What one tile ends with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileOutcome {
    /// The tile.
    pub position: TilePosition,
    /// Last tick produced.
    pub final_tick: Tick,
    /// Global statistics of the last tick.
    pub global_stats: Stats,
    /// Run history as of the last tick.
    pub history: Stats,
    /// Allocator counters of the tile.
    pub allocations: AllocatorCounters,
}

/// Run the tile at `position` of `layout` for `config.world.ticks` ticks.
///
/// On failure the exchange is aborted so that no peer waits forever.
///
/// # Errors
///
/// Returns [`RunError`] if seeding, a step or the observer fails.
pub fn run_tile<E: BorderExchange + ?Sized>(
    config: &SimulationConfig,
    layout: TileLayout,
    position: TilePosition,
    schedule: Schedule,
    exchange: &mut E,
    observer: &mut dyn TickObserver,
) -> Result<TileOutcome, RunError> {
    let result = drive_tile(config, layout, position, schedule, exchange, observer);
    if let Err(e) = &result {
        if !e.is_secondary() {
            error!(tile = %position, error = %e, "Tile failed, aborting the run");
        }
        exchange.abort();
    }
    result
}

fn drive_tile<E: BorderExchange + ?Sized>(
    config: &SimulationConfig,
    layout: TileLayout,
    position: TilePosition,
    schedule: Schedule,
    exchange: &mut E,
    observer: &mut dyn TickObserver,
) -> Result<TileOutcome, RunError> {
    let allocator = EntityAllocator::new();
    let mut current = World::tile(layout, position)?;
    let mut next = World::tile(layout, position)?;
    let rank = layout.rank(position);

    let population = initial_population(&config.world, current.geometry());
    let mut rng = StreamRng::for_seeding(config.world.seed, rank);
    seed_population(
        &mut current,
        population,
        &mut rng,
        &config.lifecycle,
        config.movement.random_bearing_magnitude,
        &allocator,
    )?;
    publish_stats(&mut current, exchange)?;
    observer.on_tick(&current)?;

    let ctx = StepContext {
        lifecycle: &config.lifecycle,
        movement: &config.movement,
        allocator: &allocator,
        seed: config.world.seed,
        schedule,
    };
    for _ in 0..config.world.ticks {
        step(&mut current, &mut next, &ctx, exchange)?;
        finish_step(&mut next, exchange, &allocator)?;
        observer.on_tick(&next)?;
        mem::swap(&mut current, &mut next);
        next.reset(&allocator);
    }
    observer.finish()?;

    Ok(TileOutcome {
        position,
        final_tick: current.clock,
        global_stats: current.global_stats,
        history: current.history,
        allocations: allocator.counters(),
    })
}

/// Validate `config` and run the whole simulation.
///
/// # Errors
///
/// Returns [`RunError`] if the configuration is invalid or any tile fails.
pub fn run(config: &SimulationConfig) -> Result<RunSummary, RunError> {
    config.validate()?;
    let layout = config.layout()?;
    let mode = config.concurrency.mode;

    info!(
        mode = ?mode,
        width = config.world.width,
        height = config.world.height,
        tiles = layout.tile_count(),
        ticks = config.world.ticks,
        seed = config.world.seed,
        "Simulation starting"
    );

    let started_at = Utc::now();
    let clock = Instant::now();
    let (outcomes, threads) = match mode {
        ConcurrencyMode::SingleThreaded => {
            let pool = build_pool(1)?;
            let outcome = pool.install(|| run_whole(config, layout, Schedule::Sequential))?;
            (vec![outcome], 1)
        }
        ConcurrencyMode::SharedMemory => {
            let pool = build_pool(config.concurrency.threads)?;
            let threads = pool.current_num_threads();
            let outcome = pool.install(|| run_whole(config, layout, Schedule::Parallel))?;
            (vec![outcome], threads)
        }
        ConcurrencyMode::Distributed => (
            run_distributed(config, layout)?,
            config.concurrency.threads.max(1),
        ),
    };
    let elapsed_ms = clock.elapsed().as_secs_f64() * 1000.0;

    let mut allocations = Allocations::default();
    for outcome in &outcomes {
        allocations.add(outcome.allocations);
    }
    let last = outcomes.first().copied().ok_or(WorldError::EmptyLayout {
        columns: config.concurrency.tile_columns,
        rows: config.concurrency.tile_rows,
    })?;

    info!(
        ticks = last.final_tick,
        elapsed_ms,
        threads,
        humans = last.global_stats.humans(),
        infected = last.global_stats.infected(),
        zombies = last.global_stats.zombies,
        "Simulation finished"
    );

    Ok(RunSummary {
        run_id: Uuid::now_v7(),
        started_at,
        finished_at: Utc::now(),
        elapsed_ms,
        mode,
        tiles: layout.tile_count(),
        threads,
        seed: config.world.seed,
        final_tick: last.final_tick,
        final_stats: last.global_stats,
        history: last.history,
        allocations,
    })
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool, RunError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("apocalypse-worker-{i}"))
        .build()?;
    Ok(pool)
}

/// A single tile covering the whole world, on the current rayon pool.
fn run_whole(
    config: &SimulationConfig,
    layout: TileLayout,
    schedule: Schedule,
) -> Result<TileOutcome, RunError> {
    let mut reporter = Reporter::new(&config.output, None)?;
    let mut exchange = LocalExchange::new();
    run_tile(
        config,
        layout,
        TilePosition::default(),
        schedule,
        &mut exchange,
        &mut reporter,
    )
}

/// One scoped thread per tile. Returns the outcomes in rank order, or the
/// error of the tile that failed first.
fn run_distributed(
    config: &SimulationConfig,
    layout: TileLayout,
) -> Result<Vec<TileOutcome>, RunError> {
    let exchanges = ChannelExchange::mesh(&layout);
    let results: Vec<Result<TileOutcome, RunError>> = thread::scope(|scope| {
        let handles: Vec<_> = exchanges
            .into_iter()
            .map(|exchange| {
                let position = exchange.position();
                let handle = thread::Builder::new()
                    .name(format!("apocalypse-tile-{}-{}", position.x, position.y))
                    .spawn_scoped(scope, move || run_distributed_tile(config, layout, exchange));
                (position, handle)
            })
            .collect();
        handles
            .into_iter()
            .map(|(position, handle)| match handle {
                Err(e) => Err(RunError::from(e)),
                Ok(handle) => match handle.join() {
                    Ok(result) => result,
                    Err(_) => Err(RunError::TilePanicked { tile: position }),
                },
            })
            .collect()
    });

    let mut outcomes = Vec::with_capacity(results.len());
    let mut first_error: Option<RunError> = None;
    for result in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                let replaces = first_error
                    .as_ref()
                    .is_none_or(|previous| previous.is_secondary() && !e.is_secondary());
                if replaces {
                    first_error = Some(e);
                } else {
                    warn!(error = %e, "Further tile failure");
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}

fn run_distributed_tile(
    config: &SimulationConfig,
    layout: TileLayout,
    mut exchange: ChannelExchange,
) -> Result<TileOutcome, RunError> {
    let position = exchange.position();
    let mut reporter = match Reporter::new(&config.output, Some(position)) {
        Ok(reporter) => reporter,
        Err(e) => {
            exchange.abort();
            return Err(e.into());
        }
    };
    let threads = config.concurrency.threads;
    if threads <= 1 {
        return run_tile(
            config,
            layout,
            position,
            Schedule::Sequential,
            &mut exchange,
            &mut reporter,
        );
    }
    let pool = match build_pool(threads) {
        Ok(pool) => pool,
        Err(e) => {
            exchange.abort();
            return Err(e);
        }
    };
    pool.install(|| {
        run_tile(
            config,
            layout,
            position,
            Schedule::Parallel,
            &mut exchange,
            &mut reporter,
        )
    })
}
