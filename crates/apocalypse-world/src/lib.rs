//! Grid storage and tile plumbing for the Apocalypse simulation.
//!
//! This crate owns the two-dimensional grid every tick reads from and
//! writes to, the pooled entity records that live in it, and everything a
//! tile needs to cooperate with its neighbours: column locks for
//! shared-memory workers and the halo exchange for split worlds.
//!
//! # Modules
//!
//! - [`allocator`] -- Per-kind pools of entity records with worker-local
//!   caches.
//! - [`cell`] -- A single grid position.
//! - [`dump`] -- Plain-text dumps of a tile's occupants.
//! - [`error`] -- Error types for construction and exchange failures.
//! - [`exchange`] -- The [`BorderExchange`] trait and its local and
//!   channel-based implementations.
//! - [`halo`] -- Border and ghost exchange phases built on
//!   [`BorderExchange`].
//! - [`locks`] -- Three-column lock windows for concurrent writers.
//! - [`topology`] -- Torus or bounded worlds and their split into tiles.
//! - [`world`] -- [`World`], one generation of one tile, and read-only
//!   [`GridView`]s of it.

pub mod allocator;
pub mod cell;
pub mod dump;
pub mod error;
pub mod exchange;
pub mod halo;
pub mod locks;
pub mod topology;
pub mod world;

// Re-export primary types at crate root.
pub use allocator::{AllocatorCounters, EntityAllocator, LocalPool};
pub use cell::{Cell, TileKind};
pub use dump::{dump_path, write_dump};
pub use error::{ExchangeError, WorldError};
pub use exchange::{BorderExchange, ChannelExchange, ExchangeTag, LocalExchange, Strip};
pub use halo::{
    begin_border_exchange, begin_ghost_exchange, finish_border_exchange, finish_ghost_exchange,
};
pub use locks::{Column, ColumnWindow};
pub use topology::{Side, TileLayout, TilePosition, Topology, offset_of_part, size_of_part};
pub use world::{Geometry, GridView, HALO, MIN_COLUMNS_PER_WORKER, World};
