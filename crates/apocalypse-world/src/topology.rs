//! Domain decomposition of the global world into tiles.
//!
//! The global `width x height` world is split into a
//! `columns x rows` grid of rectangular tiles. Tile sizes follow the
//! balanced-partition rule of [`size_of_part`], so tile widths differ by at
//! most one cell. In [`Topology::Torus`] every tile has four neighbours
//! (wrapping around the edges); in [`Topology::Bounded`] tiles on the edge
//! of the world have no neighbour on that side and the cells beyond it are
//! walls.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::WorldError;

/// Global world topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Periodic in both axes.
    #[default]
    Torus,
    /// Walled at the edges of the global world.
    Bounded,
}

/// One of the four sides of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Towards smaller `y`.
    Top,
    /// Towards larger `y`.
    Bottom,
    /// Towards smaller `x`.
    Left,
    /// Towards larger `x`.
    Right,
}

impl Side {
    /// All sides.
    pub const ALL: [Self; 4] = [Self::Top, Self::Bottom, Self::Left, Self::Right];

    /// The side facing this one on the neighbouring tile.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Top => Self::Bottom,
            Self::Bottom => Self::Top,
            Self::Left => Self::Right,
            Self::Right => Self::Left,
        }
    }
}

/// Coordinates of a tile inside the layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TilePosition {
    /// Tile column.
    pub x: usize,
    /// Tile row.
    pub y: usize,
}

impl TilePosition {
    /// Create a tile position.
    pub const fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TilePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Number of items assigned to part `index` when `total` items are split
/// into `parts` balanced parts.
///
/// Equals `(index + 1) * total / parts - index * total / parts`. Returns 0
/// when `parts` is 0.
pub fn size_of_part(total: usize, parts: usize, index: usize) -> usize {
    let end = offset_of_part(total, parts, index.saturating_add(1));
    let start = offset_of_part(total, parts, index);
    end.saturating_sub(start)
}

/// Index of the first item of part `index`: `index * total / parts`.
pub fn offset_of_part(total: usize, parts: usize, index: usize) -> usize {
    // u128 keeps the product exact for any usize inputs.
    let product = (index as u128).saturating_mul(total as u128);
    let offset = product.checked_div(parts as u128).unwrap_or(0);
    usize::try_from(offset).unwrap_or(usize::MAX)
}

/// The global world and how it is split into tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileLayout {
    /// Global interior width.
    pub width: usize,
    /// Global interior height.
    pub height: usize,
    /// Tiles along the x axis.
    pub columns: usize,
    /// Tiles along the y axis.
    pub rows: usize,
    /// Edge behaviour of the global world.
    pub topology: Topology,
}

impl TileLayout {
    /// Build and validate a layout.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::EmptyWorld`] or [`WorldError::EmptyLayout`] for
    /// zero dimensions and [`WorldError::TileTooSmall`] if any tile would be
    /// smaller than 2x2.
    pub fn new(
        width: usize,
        height: usize,
        columns: usize,
        rows: usize,
        topology: Topology,
    ) -> Result<Self, WorldError> {
        if width == 0 || height == 0 {
            return Err(WorldError::EmptyWorld { width, height });
        }
        if columns == 0 || rows == 0 {
            return Err(WorldError::EmptyLayout { columns, rows });
        }
        let layout = Self {
            width,
            height,
            columns,
            rows,
            topology,
        };
        for position in layout.positions() {
            let (tile_width, tile_height) = layout.tile_size(position);
            if tile_width < 2 || tile_height < 2 {
                return Err(WorldError::TileTooSmall {
                    position,
                    width: tile_width,
                    height: tile_height,
                });
            }
        }
        Ok(layout)
    }

    /// A layout made of one tile covering the whole world.
    ///
    /// # Errors
    ///
    /// Same as [`TileLayout::new`].
    pub fn single(width: usize, height: usize, topology: Topology) -> Result<Self, WorldError> {
        Self::new(width, height, 1, 1, topology)
    }

    /// Number of tiles.
    pub const fn tile_count(&self) -> usize {
        self.columns.saturating_mul(self.rows)
    }

    /// Global interior area in cells.
    pub const fn area(&self) -> usize {
        self.width.saturating_mul(self.height)
    }

    /// Whether the world is split into more than one tile.
    pub const fn is_distributed(&self) -> bool {
        self.tile_count() > 1
    }

    /// All tile positions in rank (row-major) order.
    pub fn positions(&self) -> impl Iterator<Item = TilePosition> + use<> {
        let columns = self.columns;
        let rows = self.rows;
        (0..rows).flat_map(move |y| (0..columns).map(move |x| TilePosition::new(x, y)))
    }

    /// Row-major rank of a tile.
    pub const fn rank(&self, position: TilePosition) -> usize {
        position
            .y
            .saturating_mul(self.columns)
            .saturating_add(position.x)
    }

    /// Check that a position lies inside the layout.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::TileOutOfRange`] otherwise.
    pub const fn check(&self, position: TilePosition) -> Result<(), WorldError> {
        if position.x < self.columns && position.y < self.rows {
            Ok(())
        } else {
            Err(WorldError::TileOutOfRange {
                position,
                columns: self.columns,
                rows: self.rows,
            })
        }
    }

    /// Interior size `(width, height)` of a tile.
    pub fn tile_size(&self, position: TilePosition) -> (usize, usize) {
        (
            size_of_part(self.width, self.columns, position.x),
            size_of_part(self.height, self.rows, position.y),
        )
    }

    /// Global coordinates of a tile's first interior cell.
    pub fn tile_offset(&self, position: TilePosition) -> (usize, usize) {
        (
            offset_of_part(self.width, self.columns, position.x),
            offset_of_part(self.height, self.rows, position.y),
        )
    }

    /// The tile across `side`, if any.
    ///
    /// In a torus the neighbour always exists (possibly the tile itself);
    /// in a bounded world edge tiles have no neighbour outwards.
    pub const fn neighbour(&self, position: TilePosition, side: Side) -> Option<TilePosition> {
        let (x, y) = (position.x, position.y);
        let torus = matches!(self.topology, Topology::Torus);
        match side {
            Side::Top => match y.checked_sub(1) {
                Some(up) => Some(TilePosition::new(x, up)),
                None if torus => Some(TilePosition::new(x, self.rows.saturating_sub(1))),
                None => None,
            },
            Side::Bottom => {
                let down = y.saturating_add(1);
                if down < self.rows {
                    Some(TilePosition::new(x, down))
                } else if torus {
                    Some(TilePosition::new(x, 0))
                } else {
                    None
                }
            }
            Side::Left => match x.checked_sub(1) {
                Some(left) => Some(TilePosition::new(left, y)),
                None if torus => Some(TilePosition::new(self.columns.saturating_sub(1), y)),
                None => None,
            },
            Side::Right => {
                let right = x.saturating_add(1);
                if right < self.columns {
                    Some(TilePosition::new(right, y))
                } else if torus {
                    Some(TilePosition::new(0, y))
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parts_cover_the_total() {
        for (total, parts) in [(10, 3), (7, 7), (100, 6), (5, 2)] {
            let sum: usize = (0..parts).map(|i| size_of_part(total, parts, i)).sum();
            assert_eq!(sum, total);
            for i in 0..parts {
                assert_eq!(
                    offset_of_part(total, parts, i).saturating_add(size_of_part(total, parts, i)),
                    offset_of_part(total, parts, i + 1)
                );
            }
        }
    }

    #[test]
    fn parts_are_balanced() {
        let sizes: Vec<usize> = (0..3).map(|i| size_of_part(10, 3, i)).collect();
        assert_eq!(sizes, vec![3, 3, 4]);
    }

    #[test]
    fn zero_parts_is_empty() {
        assert_eq!(size_of_part(10, 0, 0), 0);
    }

    #[test]
    fn rejects_tiny_tiles() {
        let err = TileLayout::new(5, 10, 3, 1, Topology::Torus).unwrap_err();
        assert!(matches!(err, WorldError::TileTooSmall { .. }));
        assert!(TileLayout::new(6, 10, 3, 1, Topology::Torus).is_ok());
    }

    #[test]
    fn rejects_empty_world() {
        assert!(matches!(
            TileLayout::single(0, 5, Topology::Torus).unwrap_err(),
            WorldError::EmptyWorld { .. }
        ));
        assert!(matches!(
            TileLayout::new(5, 5, 0, 1, Topology::Torus).unwrap_err(),
            WorldError::EmptyLayout { .. }
        ));
    }

    #[test]
    fn torus_neighbours_wrap() {
        let layout = TileLayout::new(20, 20, 2, 2, Topology::Torus).unwrap();
        let origin = TilePosition::new(0, 0);
        assert_eq!(layout.neighbour(origin, Side::Top), Some(TilePosition::new(0, 1)));
        assert_eq!(layout.neighbour(origin, Side::Left), Some(TilePosition::new(1, 0)));
        assert_eq!(layout.neighbour(origin, Side::Right), Some(TilePosition::new(1, 0)));
        assert_eq!(layout.neighbour(origin, Side::Bottom), Some(TilePosition::new(0, 1)));
    }

    #[test]
    fn single_tile_torus_is_its_own_neighbour() {
        let layout = TileLayout::single(10, 10, Topology::Torus).unwrap();
        for side in Side::ALL {
            assert_eq!(layout.neighbour(TilePosition::default(), side), Some(TilePosition::default()));
        }
    }

    #[test]
    fn bounded_edges_have_no_neighbour() {
        let layout = TileLayout::new(20, 20, 2, 1, Topology::Bounded).unwrap();
        let left = TilePosition::new(0, 0);
        assert_eq!(layout.neighbour(left, Side::Left), None);
        assert_eq!(layout.neighbour(left, Side::Top), None);
        assert_eq!(layout.neighbour(left, Side::Right), Some(TilePosition::new(1, 0)));
    }

    #[test]
    fn ranks_are_row_major() {
        let layout = TileLayout::new(20, 20, 2, 2, Topology::Torus).unwrap();
        let ranks: Vec<usize> = layout.positions().map(|p| layout.rank(p)).collect();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
        assert_eq!(layout.tile_offset(TilePosition::new(1, 1)), (10, 10));
    }

    #[test]
    fn topology_deserializes_snake_case() {
        let topology: Topology = serde_json::from_str("\"bounded\"").unwrap();
        assert_eq!(topology, Topology::Bounded);
    }
}
