//! Error types for the `apocalypse-agents` crate.
//!
//! The lifecycle rules themselves never fail: a birth without a free cell
//! is deferred and a move without a free cell stays put. The only failures
//! are parameters that make no sense, caught when a configuration is
//! validated.

/// Errors raised while validating agent parameters.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// A probability or rate is negative or not a finite number.
    #[error("parameter `{name}` must be a finite, non-negative number, got {value}")]
    InvalidRate {
        /// Dotted name of the parameter.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A fraction that must lie in `[0, 1]` does not.
    #[error("parameter `{name}` must lie between 0 and 1, got {value}")]
    InvalidFraction {
        /// Dotted name of the parameter.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
}
