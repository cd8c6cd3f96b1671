//! Shared type definitions for the Apocalypse outbreak simulation.
//!
//! This crate is the single source of truth for the plain data that flows
//! between the world store, the lifecycle rules, and the step engine. It has
//! no behaviour beyond small, pure helpers on the types themselves.
//!
//! # Modules
//!
//! - [`tick`] -- Simulation time ([`Tick`]) and calendar unit constants.
//! - [`bearing`] -- [`Bearing`], the 2D steering vector carried by entities.
//! - [`direction`] -- The 13-entry [`Direction`] table used for neighbour
//!   lookups and movement.
//! - [`entity`] -- The [`Entity`] sum type and its living payload.
//! - [`stats`] -- Per-tick demographic counters ([`Stats`]).

pub mod bearing;
pub mod direction;
pub mod entity;
pub mod stats;
pub mod tick;

pub use bearing::Bearing;
pub use direction::{CARDINAL, CARDINAL_PERMUTATIONS, DISTANCE_TWO, Direction};
pub use entity::{Entity, EntityKind, Gender, Living};
pub use stats::Stats;
pub use tick::{DAY, MONTH, Tick, WEEK, YEAR};
