//! Error types for the `apocalypse-world` crate.
//!
//! Construction problems surface as [`WorldError`]; failures of the halo
//! exchange between tiles surface as [`ExchangeError`]. Exchange failures
//! are fatal for a run: a lost border update would silently corrupt the
//! next generation.

use apocalypse_types::Tick;

use crate::topology::{Side, TilePosition};

/// Errors that can occur while building a world or a tile layout.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// The world has a zero dimension.
    #[error("world dimensions must be non-zero, got {width}x{height}")]
    EmptyWorld {
        /// Requested width.
        width: usize,
        /// Requested height.
        height: usize,
    },

    /// The tile layout has a zero dimension.
    #[error("tile layout must be non-zero, got {columns}x{rows}")]
    EmptyLayout {
        /// Tile columns.
        columns: usize,
        /// Tile rows.
        rows: usize,
    },

    /// A tile would be narrower or shorter than the two-cell halo depth.
    #[error("tile {position} would be {width}x{height}, tiles must be at least 2x2")]
    TileTooSmall {
        /// The offending tile.
        position: TilePosition,
        /// Its width.
        width: usize,
        /// Its height.
        height: usize,
    },

    /// A tile position lies outside the layout.
    #[error("tile {position} is outside a {columns}x{rows} layout")]
    TileOutOfRange {
        /// The requested tile.
        position: TilePosition,
        /// Tile columns.
        columns: usize,
        /// Tile rows.
        rows: usize,
    },

    /// A cell coordinate lies outside the grid (halo included).
    #[error("cell [{x} {y}] is outside the grid")]
    CellOutOfRange {
        /// Column.
        x: usize,
        /// Row.
        y: usize,
    },

    /// The target cell already holds an entity.
    #[error("cell [{x} {y}] is already occupied")]
    CellOccupied {
        /// Column.
        x: usize,
        /// Row.
        y: usize,
    },

    /// Arithmetic overflow while computing grid dimensions.
    #[error("arithmetic overflow in grid calculation")]
    ArithmeticOverflow,
}

/// Errors raised by a border exchange between tiles.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The neighbour's channel has been closed.
    #[error("tile {tile}: neighbour on the {side:?} side disconnected")]
    Disconnected {
        /// The tile that observed the failure.
        tile: TilePosition,
        /// Which neighbour.
        side: Side,
    },

    /// The inbound channel closed while waiting for a message.
    #[error("tile {tile}: inbox closed while waiting for tick {clock}")]
    InboxClosed {
        /// The waiting tile.
        tile: TilePosition,
        /// The tick being exchanged.
        clock: Tick,
    },

    /// A strip arrived with the wrong number of cells.
    #[error("strip from the {side:?} side has {actual} cells, expected {expected}")]
    MalformedStrip {
        /// Sender side.
        side: Side,
        /// Expected length.
        expected: usize,
        /// Received length.
        actual: usize,
    },

    /// A local exchange was asked for a strip that was never sent.
    #[error("no strip pending from the {side:?} side")]
    MissingStrip {
        /// Expected sender side.
        side: Side,
    },

    /// Another tile failed and aborted the run.
    #[error("tile {tile}: a peer tile aborted the run")]
    PeerAborted {
        /// The tile that observed the abort.
        tile: TilePosition,
    },

    /// The statistics reduction could not complete.
    #[error("statistics reduction failed: {message}")]
    Reduction {
        /// Description of the failure.
        message: String,
    },
}
