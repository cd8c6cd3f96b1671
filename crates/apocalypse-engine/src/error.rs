//! Error types for the engine binary.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: apocalypse_core::config::ConfigError,
    },

    /// The simulation failed.
    #[error("run error: {source}")]
    Run {
        /// The underlying run error.
        #[from]
        source: apocalypse_core::simulation::RunError,
    },

    /// The blocking simulation task was cancelled or panicked.
    #[error("simulation task failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
