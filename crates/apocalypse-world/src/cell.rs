//! Grid cells.

use apocalypse_types::Entity;
use serde::{Deserialize, Serialize};

/// Whether a cell belongs to the tile's own territory or to its halo.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TileKind {
    /// A cell of the simulated area owned by this tile.
    #[default]
    Interior,
    /// A halo cell: mirrors a neighbour's edge, or temporarily holds an
    /// entity that moved across the tile boundary.
    Border,
}

/// One grid position. Holds at most one entity.
#[derive(Debug, Default)]
pub struct Cell {
    /// The entity record, if the cell is occupied.
    pub occupant: Option<Box<Entity>>,
    /// Interior or halo.
    pub kind: TileKind,
}

impl Cell {
    /// An empty cell of the given kind.
    pub const fn empty(kind: TileKind) -> Self {
        Self {
            occupant: None,
            kind,
        }
    }

    /// Whether no entity occupies the cell.
    pub const fn is_empty(&self) -> bool {
        self.occupant.is_none()
    }

    /// The occupant, if any.
    pub fn entity(&self) -> Option<&Entity> {
        self.occupant.as_deref()
    }

    /// Remove and return the occupant's record.
    pub const fn take(&mut self) -> Option<Box<Entity>> {
        self.occupant.take()
    }
}
