//! Configuration, seeding, the step engine and run orchestration for the
//! Apocalypse simulation.
//!
//! A run seeds tick 0 and then advances one day per tick. Each tick reads
//! one generation of the grid and writes the next, on one thread, over a
//! pool of column workers, or as a set of tiles trading halos.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `apocalypse-config.yaml` into
//!   strongly-typed structs.
//! - [`report`] -- Stats blocks, world dumps and the JSON run summary.
//! - [`seed`] -- The initial population of a tile.
//! - [`simulation`] -- The tick loop of a tile and [`run`] for whole
//!   simulations.
//! - [`step`] -- One generation of one tile.
//!
//! [`run`]: simulation::run

pub mod config;
pub mod report;
pub mod seed;
pub mod simulation;
pub mod step;
