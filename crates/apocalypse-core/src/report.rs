//! Run output: the per-tick stats block, world dumps and the run summary.
//!
//! The stats block is six tab-separated lines with every number padded to
//! six characters, so a line can be split on whitespace:
//!
//! ```text
//! Time:      1    Humans:   3400    Infected:      2    Zombies:     10
//! LHF:   1693     LHM:   1707     LIF:      1     LIM:      1     LZ:      10
//! DHF:      0     DHM:      0     DIF:      0     DIM:      0     DZ:       0
//! BHF:      0     BHM:      0     BIF:      0     BIM:      0
//! PH:      12     PI:       0     GBH:      0     GBI:      0     CML:      0     CC:       0
//! IHF:      1     IHM:      1     IFZ:      0     IMZ:      0
//! ```
//!
//! A single-tile run prints it to stdout; the tiles of a split world each
//! write their own `apocalypse-X-Y.out` in the output directory.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use apocalypse_types::{Stats, Tick};
use apocalypse_world::{AllocatorCounters, TilePosition, World, dump_path, write_dump};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::config::{ConcurrencyMode, OutputConfig};

/// The six-line stats block of `stats` at `clock`.
pub fn stats_block(clock: Tick, stats: &Stats) -> String {
    let s = stats;
    format!(
        "Time: {clock:6} \tHumans: {:6} \tInfected: {:6} \tZombies: {:6}\n\
         LHF: {:6} \tLHM: {:6} \tLIF: {:6} \tLIM: {:6} \tLZ:  {:6}\n\
         DHF: {:6} \tDHM: {:6} \tDIF: {:6} \tDIM: {:6} \tDZ:  {:6}\n\
         BHF: {:6} \tBHM: {:6} \tBIF: {:6} \tBIM: {:6}\n\
         PH:  {:6} \tPI:  {:6} \tGBH: {:6} \tGBI: {:6} \tCML: {:6} \tCC:  {:6}\n\
         IHF: {:6} \tIHM: {:6} \tIFZ: {:6} \tIMZ: {:6}\n",
        s.humans(),
        s.infected(),
        s.zombies,
        s.human_females,
        s.human_males,
        s.infected_females,
        s.infected_males,
        s.zombies,
        s.human_females_died,
        s.human_males_died,
        s.infected_females_died,
        s.infected_males_died,
        s.zombies_decomposed,
        s.human_females_born,
        s.human_males_born,
        s.infected_females_born,
        s.infected_males_born,
        s.human_females_pregnant,
        s.infected_females_pregnant,
        s.human_females_giving_birth,
        s.infected_females_giving_birth,
        s.couples_making_love,
        s.children_conceived,
        s.human_females_became_infected,
        s.human_males_became_infected,
        s.infected_females_became_zombies,
        s.infected_males_became_zombies,
    )
}

/// Per-tile writer of stats blocks and world dumps.
pub struct Reporter {
    config: OutputConfig,
    tile: Option<TilePosition>,
    stats: Option<Box<dyn Write + Send>>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("config", &self.config)
            .field("tile", &self.tile)
            .field("stats", &self.stats.is_some())
            .finish()
    }
}

impl Reporter {
    /// A reporter for the tile at `tile`, or for the whole world when
    /// `tile` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory or the per-tile stats file
    /// cannot be created.
    pub fn new(config: &OutputConfig, tile: Option<TilePosition>) -> io::Result<Self> {
        let stats: Option<Box<dyn Write + Send>> = match (config.stats_every, tile) {
            (0, _) => None,
            (_, None) => Some(Box::new(io::stdout())),
            (_, Some(position)) => {
                fs::create_dir_all(&config.directory)?;
                let path = config.directory.join(stats_file_name(position));
                Some(Box::new(BufWriter::new(File::create(path)?)))
            }
        };
        Ok(Self {
            config: config.clone(),
            tile,
            stats,
        })
    }

    /// A reporter writing stats blocks to `out` and no dumps.
    pub fn to_writer(out: Box<dyn Write + Send>, stats_every: u64) -> Self {
        Self {
            config: OutputConfig {
                stats_every,
                ..OutputConfig::silent()
            },
            tile: None,
            stats: Some(out),
        }
    }

    /// Write whatever is due for `world` at its current clock.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn record(&mut self, world: &World) -> io::Result<()> {
        if is_due(world.clock, self.config.stats_every) {
            if let Some(out) = self.stats.as_mut() {
                out.write_all(stats_block(world.clock, &world.stats).as_bytes())?;
            }
        }
        self.dump(world)
    }

    /// Dump `world` if dumps are due at its clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the dump file cannot be written.
    pub fn dump(&self, world: &World) -> io::Result<()> {
        if !is_due(world.clock, self.config.dump_every) {
            return Ok(());
        }
        let path = self.config.directory.join(dump_path(world.clock, self.tile));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = BufWriter::new(File::create(&path)?);
        let entities = write_dump(world, &mut out)?;
        out.flush()?;
        debug!(tick = world.clock, entities, path = %path.display(), "World dumped");
        Ok(())
    }

    /// Flush buffered output.
    ///
    /// # Errors
    ///
    /// Propagates write failures.
    pub fn flush(&mut self) -> io::Result<()> {
        match self.stats.as_mut() {
            Some(out) => out.flush(),
            None => Ok(()),
        }
    }
}

fn is_due(clock: Tick, every: u64) -> bool {
    if every == 0 {
        return false;
    }
    match u64::try_from(clock) {
        Ok(clock) => clock % every == 0,
        Err(_) => false,
    }
}

/// Name of the stats file of the tile at `position`.
pub fn stats_file_name(position: TilePosition) -> String {
    format!("apocalypse-{}-{}.out", position.x, position.y)
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

/// What a finished run reports about itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    /// Unique, time-ordered identifier of the run.
    pub run_id: Uuid,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock end.
    pub finished_at: DateTime<Utc>,
    /// Duration of the tick loop in milliseconds.
    pub elapsed_ms: f64,
    /// Execution mode.
    pub mode: ConcurrencyMode,
    /// Number of tiles.
    pub tiles: usize,
    /// Worker threads per tile.
    pub threads: usize,
    /// Run seed.
    pub seed: u64,
    /// Last tick simulated.
    pub final_tick: Tick,
    /// Global statistics of the last tick.
    pub final_stats: Stats,
    /// Latest population and events accumulated over the run.
    pub history: Stats,
    /// Entity records created or reused, summed over tiles.
    pub allocations: Allocations,
}

/// Allocator counters in serializable form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Allocations {
    /// Fresh heap allocations.
    pub fresh: u64,
    /// Records served from a pool.
    pub recycled: u64,
}

impl Allocations {
    /// Add the counters of one tile.
    pub const fn add(&mut self, counters: AllocatorCounters) {
        self.fresh = self.fresh.saturating_add(counters.fresh);
        self.recycled = self.recycled.saturating_add(counters.recycled);
    }
}

impl RunSummary {
    /// File name of this summary.
    pub fn file_name(&self) -> String {
        format!("summary-{}.json", self.run_id)
    }

    /// Write the summary as pretty-printed JSON into `directory` and return
    /// the path.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn write_to(&self, directory: &Path) -> io::Result<PathBuf> {
        fs::create_dir_all(directory)?;
        let path = directory.join(self.file_name());
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        fs::write(&path, json)?;
        Ok(path)
    }
}
