//! Behaviour of individual entities in the Apocalypse simulation.
//!
//! This crate holds the rules that act on a single entity and its
//! neighbourhood: who dies, turns, gets infected, gives birth or conceives,
//! and where it wants to move. It never decides where results end up in
//! the next generation; that is the step engine's job in
//! `apocalypse-core`.
//!
//! # Modules
//!
//! - [`config`] -- Lifecycle and movement parameters ([`LifecycleConfig`],
//!   [`MovementConfig`])
//! - [`error`] -- Parameter validation errors ([`AgentError`])
//! - [`lifecycle`] -- Seeding, death, turning, infection, birth and mating
//! - [`random`] -- The [`RandomSource`] contract, deterministic streams and
//!   a scripted test double
//! - [`rates`] -- Age bands, death and decomposition rates, speeds
//! - [`steering`] -- Neighbour-attraction steering and the movement decision

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod random;
pub mod rates;
pub mod steering;

// Re-export primary types at crate root.
pub use config::{
    BirthPolicy, FertilityWindow, LifecycleConfig, LivingWeights, MovementConfig, SpeedTable,
    ZombieWeights,
};
pub use error::AgentError;
pub use lifecycle::{
    Fate, adjacent_zombies, can_conceive, conception_probability, give_birth, has_fertile_partner,
    mate, natural_fate, new_human, new_zombie, try_infect,
};
pub use random::{RandomSource, ScriptedRandom, StreamRng, pick, random_bearing};
pub use rates::{AgeBand, death_rate, decomposition_rate, max_speed};
pub use steering::{Move, decide_move, resolve_destination, steer};
