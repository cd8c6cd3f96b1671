//! Configuration loading and typed config structures for the Apocalypse
//! simulation.
//!
//! The canonical configuration lives in `apocalypse-config.yaml` in the
//! working directory; `APOCALYPSE_CONFIG` points elsewhere. Every field has
//! a default, so an empty file (or no file at all) describes a complete
//! run. The `lifecycle` and `movement` sections are the parameter structs
//! of `apocalypse-agents`.

use std::path::{Path, PathBuf};

use apocalypse_agents::{AgentError, LifecycleConfig, MovementConfig};
use apocalypse_world::{TileLayout, Topology, WorldError};
use serde::{Deserialize, Serialize};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "APOCALYPSE_CONFIG";

/// Configuration file used when `APOCALYPSE_CONFIG` is not set.
pub const DEFAULT_CONFIG_FILE: &str = "apocalypse-config.yaml";

/// Environment variable overriding `world.seed`.
pub const SEED_ENV: &str = "APOCALYPSE_SEED";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A lifecycle or movement parameter is out of range.
    #[error("invalid agent parameter: {source}")]
    Agent {
        /// The underlying validation error.
        #[from]
        source: AgentError,
    },

    /// The world or its tile layout cannot be built.
    #[error("invalid world: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// Any other inconsistent setting.
    #[error("invalid setting `{field}`: {message}")]
    Invalid {
        /// Dotted name of the setting.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `apocalypse-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Size, topology, seed and length of the run.
    #[serde(default)]
    pub world: WorldConfig,

    /// How the work is spread over threads and tiles.
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Death, infection and reproduction parameters.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Steering and speed parameters.
    #[serde(default)]
    pub movement: MovementConfig,

    /// Stats, dumps and the run summary.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file.
    ///
    /// `APOCALYPSE_SEED`, when set, overrides `world.seed`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] for an unparsable seed override.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override settings with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `APOCALYPSE_SEED` is not an
    /// unsigned integer.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = std::env::var(SEED_ENV) {
            self.world.seed = value.trim().parse().map_err(|e| ConfigError::Invalid {
                field: "world.seed",
                message: format!("{SEED_ENV}={value}: {e}"),
            })?;
        }
        Ok(())
    }

    /// The tile layout of the run: the configured tile grid when
    /// distributed, a single tile otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] for zero dimensions or tiles below 2x2.
    pub fn layout(&self) -> Result<TileLayout, WorldError> {
        let (columns, rows) = match self.concurrency.mode {
            ConcurrencyMode::Distributed => {
                (self.concurrency.tile_columns, self.concurrency.tile_rows)
            }
            ConcurrencyMode::SingleThreaded | ConcurrencyMode::SharedMemory => (1, 1),
        };
        TileLayout::new(
            self.world.width,
            self.world.height,
            columns,
            rows,
            self.world.topology,
        )
    }

    /// Check that the configuration describes a runnable simulation.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout()?;
        if !(0.0..=1.0).contains(&self.world.initial_density) {
            return Err(ConfigError::Invalid {
                field: "world.initial_density",
                message: format!("must lie between 0 and 1, got {}", self.world.initial_density),
            });
        }
        if self.concurrency.mode != ConcurrencyMode::Distributed
            && (self.concurrency.tile_columns != 1 || self.concurrency.tile_rows != 1)
        {
            return Err(ConfigError::Invalid {
                field: "concurrency.tile_columns",
                message: format!(
                    "a {}x{} tile grid needs mode `distributed`",
                    self.concurrency.tile_columns, self.concurrency.tile_rows
                ),
            });
        }
        self.lifecycle.validate()?;
        self.movement.validate()?;
        Ok(())
    }
}

/// Where to look for the configuration file.
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}

/// World-level configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// Global interior width in cells.
    #[serde(default = "default_width")]
    pub width: usize,

    /// Global interior height in cells.
    #[serde(default = "default_height")]
    pub height: usize,

    /// Edge behaviour.
    #[serde(default)]
    pub topology: Topology,

    /// Random seed for reproducibility.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of ticks (days) to simulate.
    #[serde(default = "default_ticks")]
    pub ticks: u64,

    /// Zombies placed at tick 0, spread over the tiles.
    #[serde(default = "default_initial_zombies")]
    pub initial_zombies: u64,

    /// Share of cells holding a Human at tick 0.
    #[serde(default = "default_initial_density")]
    pub initial_density: f64,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            topology: Topology::default(),
            seed: default_seed(),
            ticks: default_ticks(),
            initial_zombies: default_initial_zombies(),
            initial_density: default_initial_density(),
        }
    }
}

/// How the cells of a tick are processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyMode {
    /// One thread walks every column in order.
    #[default]
    SingleThreaded,
    /// A pool of worker threads shares one world under column locks.
    SharedMemory,
    /// One thread per tile, exchanging halos over channels.
    Distributed,
}

/// Concurrency configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConcurrencyConfig {
    /// Execution mode.
    #[serde(default)]
    pub mode: ConcurrencyMode,

    /// Worker threads per tile. Zero lets the pool pick one per core in
    /// shared-memory mode and means one thread per tile in distributed
    /// mode.
    #[serde(default)]
    pub threads: usize,

    /// Tiles along the x axis (distributed mode only).
    #[serde(default = "default_tiles")]
    pub tile_columns: usize,

    /// Tiles along the y axis (distributed mode only).
    #[serde(default = "default_tiles")]
    pub tile_rows: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            mode: ConcurrencyMode::default(),
            threads: 0,
            tile_columns: default_tiles(),
            tile_rows: default_tiles(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving dumps, per-tile stats files and the summary.
    #[serde(default = "default_output_directory")]
    pub directory: PathBuf,

    /// Print the stats block every this many ticks; zero disables it.
    #[serde(default = "default_every")]
    pub stats_every: u64,

    /// Dump the world every this many ticks; zero disables dumps.
    #[serde(default)]
    pub dump_every: u64,

    /// Write a JSON run summary at the end.
    #[serde(default = "default_true")]
    pub summary: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
            stats_every: default_every(),
            dump_every: 0,
            summary: true,
        }
    }
}

impl OutputConfig {
    /// Output that writes nothing at all.
    pub fn silent() -> Self {
        Self {
            stats_every: 0,
            dump_every: 0,
            summary: false,
            ..Self::default()
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable logs.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

const fn default_width() -> usize {
    200
}

const fn default_height() -> usize {
    200
}

const fn default_seed() -> u64 {
    42
}

const fn default_ticks() -> u64 {
    365
}

const fn default_initial_zombies() -> u64 {
    10
}

const fn default_initial_density() -> f64 {
    0.085
}

const fn default_tiles() -> usize {
    1
}

fn default_output_directory() -> PathBuf {
    PathBuf::from("output")
}

const fn default_every() -> u64 {
    1
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use apocalypse_agents::BirthPolicy;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.world.initial_density, 0.085);
        assert_eq!(config.concurrency.mode, ConcurrencyMode::SingleThreaded);
        assert_eq!(config.lifecycle.birth_policy, BirthPolicy::DensityPower);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r"
world:
  width: 64
  height: 48
  topology: bounded
  seed: 123
  ticks: 30
  initial_zombies: 4
  initial_density: 0.1

concurrency:
  mode: distributed
  threads: 2
  tile_columns: 2
  tile_rows: 3

lifecycle:
  p_infection: 0.5
  birth_policy: equal_replacement

movement:
  fluctuation: 0.2

output:
  directory: runs/test
  stats_every: 7
  dump_every: 30
  summary: false

logging:
  level: debug
  json: true
";
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.world.width, 64);
        assert_eq!(config.world.topology, Topology::Bounded);
        assert_eq!(config.concurrency.mode, ConcurrencyMode::Distributed);
        assert_eq!(config.concurrency.tile_rows, 3);
        assert_eq!(config.lifecycle.p_infection, 0.5);
        assert_eq!(config.lifecycle.birth_policy, BirthPolicy::EqualReplacement);
        assert!((config.movement.fluctuation - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.output.directory, PathBuf::from("runs/test"));
        assert!(!config.output.summary);
        assert!(config.logging.json);

        let layout = config.layout().unwrap();
        assert_eq!(layout.tile_count(), 6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SimulationConfig::parse("world:\n  seed: 7\n").unwrap();
        assert_eq!(config.world.seed, 7);
        assert_eq!(config.world.width, 200);
        assert_eq!(config.output.stats_every, 1);
        assert_eq!(config.lifecycle, LifecycleConfig::default());
    }

    #[test]
    fn parse_empty_yaml() {
        assert!(SimulationConfig::parse("").is_ok());
    }

    #[test]
    fn rejects_zero_dimensions() {
        let mut config = SimulationConfig::default();
        config.world.width = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::World {
                source: WorldError::EmptyWorld { .. }
            })
        ));
    }

    #[test]
    fn rejects_tiles_below_two_cells() {
        let mut config = SimulationConfig::default();
        config.world.width = 5;
        config.concurrency.mode = ConcurrencyMode::Distributed;
        config.concurrency.tile_columns = 3;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::World {
                source: WorldError::TileTooSmall { .. }
            })
        ));
    }

    #[test]
    fn tile_grid_requires_distributed_mode() {
        let mut config = SimulationConfig::default();
        config.concurrency.tile_columns = 2;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
        assert_eq!(config.layout().unwrap().tile_count(), 1);
    }

    #[test]
    fn rejects_bad_rates() {
        let mut config = SimulationConfig::default();
        config.lifecycle.p_twins = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Agent { .. })));

        let mut config = SimulationConfig::default();
        config.world.initial_density = 2.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        assert!(matches!(
            SimulationConfig::parse("world: [1, 2"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join(DEFAULT_CONFIG_FILE);
        if path.exists() {
            let config = SimulationConfig::parse(&std::fs::read_to_string(&path).unwrap());
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
            assert!(config.unwrap().validate().is_ok());
        }
    }
}
