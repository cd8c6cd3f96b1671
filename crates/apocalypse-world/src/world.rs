//! The grid store.
//!
//! A [`World`] is one tile of the simulated area: a `width x height`
//! interior surrounded by a two-cell halo on every side, so that lookahead
//! at distance two never needs a bounds check. Storage is column-major;
//! column `x` holds cells `y = 0 .. height + 4`. The interior spans
//! `x_start ..= x_end` and `y_start ..= y_end` with `x_start = y_start = 2`.
//!
//! ```text
//!   ring 2 (outer halo)   x = 0          x = width + 3
//!   ring 1 (inner halo)   x = 1          x = width + 2
//!   interior              x = 2 ..= width + 1
//! ```
//!
//! Two worlds alternate as `input` and `output` every tick. They are
//! allocated once and cleared with [`World::reset`], which returns every
//! entity record to the [`EntityAllocator`].

use core::ops::RangeInclusive;
use std::sync::{Mutex, PoisonError};

use apocalypse_types::{Direction, Entity, Living, Stats, Tick};
use rayon::prelude::*;

use crate::allocator::EntityAllocator;
use crate::cell::{Cell, TileKind};
use crate::error::WorldError;
use crate::locks::{self, Column, ColumnWindow};
use crate::topology::{Side, TileLayout, TilePosition, Topology};

/// Depth of the halo around the interior.
pub const HALO: usize = 2;

/// Minimum number of columns handed to one rayon job.
pub const MIN_COLUMNS_PER_WORKER: usize = 3;

// ---------------------------------------------------------------------------
// Geometry
// ---------------------------------------------------------------------------

/// Where a tile sits in the global world and how its storage is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    layout: TileLayout,
    position: TilePosition,
    width: usize,
    height: usize,
    offset_x: usize,
    offset_y: usize,
}

impl Geometry {
    /// Geometry of the tile at `position` inside `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::TileOutOfRange`] if the position is not part of
    /// the layout.
    pub fn new(layout: TileLayout, position: TilePosition) -> Result<Self, WorldError> {
        layout.check(position)?;
        let (width, height) = layout.tile_size(position);
        let (offset_x, offset_y) = layout.tile_offset(position);
        Ok(Self {
            layout,
            position,
            width,
            height,
            offset_x,
            offset_y,
        })
    }

    /// Interior width of this tile.
    pub const fn width(&self) -> usize {
        self.width
    }

    /// Interior height of this tile.
    pub const fn height(&self) -> usize {
        self.height
    }

    /// The global layout.
    pub const fn layout(&self) -> &TileLayout {
        &self.layout
    }

    /// This tile's position in the layout.
    pub const fn position(&self) -> TilePosition {
        self.position
    }

    /// Global coordinates of the first interior cell.
    pub const fn offset(&self) -> (usize, usize) {
        (self.offset_x, self.offset_y)
    }

    /// First interior column.
    pub const fn x_start(&self) -> usize {
        HALO
    }

    /// Last interior column.
    pub const fn x_end(&self) -> usize {
        self.width.saturating_add(HALO - 1)
    }

    /// First interior row.
    pub const fn y_start(&self) -> usize {
        HALO
    }

    /// Last interior row.
    pub const fn y_end(&self) -> usize {
        self.height.saturating_add(HALO - 1)
    }

    /// Storage columns, halo included.
    pub const fn storage_width(&self) -> usize {
        self.width.saturating_add(2 * HALO)
    }

    /// Storage rows, halo included.
    pub const fn storage_height(&self) -> usize {
        self.height.saturating_add(2 * HALO)
    }

    /// Interior columns.
    pub const fn interior_columns(&self) -> RangeInclusive<usize> {
        self.x_start()..=self.x_end()
    }

    /// Interior rows.
    pub const fn interior_rows(&self) -> RangeInclusive<usize> {
        self.y_start()..=self.y_end()
    }

    /// Whether `(x, y)` is an interior cell.
    pub const fn is_interior(&self, x: usize, y: usize) -> bool {
        x >= self.x_start() && x <= self.x_end() && y >= self.y_start() && y <= self.y_end()
    }

    /// The storage cell one `direction` step away from `(x, y)`.
    pub const fn step(&self, x: usize, y: usize, direction: Direction) -> Option<(usize, usize)> {
        let Some(nx) = x.checked_add_signed(direction.dx()) else {
            return None;
        };
        let Some(ny) = y.checked_add_signed(direction.dy()) else {
            return None;
        };
        if nx < self.storage_width() && ny < self.storage_height() {
            Some((nx, ny))
        } else {
            None
        }
    }

    /// Whether the storage cell `(x, y)` lies beyond the edge of a bounded
    /// world. Always false in a torus.
    pub fn is_outside(&self, x: usize, y: usize) -> bool {
        if self.layout.topology == Topology::Torus {
            return false;
        }
        let inside = |offset: usize, local: usize, total: usize| {
            offset
                .checked_add(local)
                .and_then(|shifted| shifted.checked_sub(HALO))
                .is_some_and(|global| global < total)
        };
        !(inside(self.offset_x, x, self.layout.width) && inside(self.offset_y, y, self.layout.height))
    }

    /// The tile across `side`, if any.
    pub const fn neighbour(&self, side: Side) -> Option<TilePosition> {
        self.layout.neighbour(self.position, side)
    }

    /// Whether the tile is its own neighbour across the left and right
    /// edges: a torus one tile wide.
    pub const fn wraps_horizontally(&self) -> bool {
        matches!(self.layout.topology, Topology::Torus) && self.layout.columns == 1
    }

    /// Whether the tile is its own neighbour across the top and bottom
    /// edges.
    pub const fn wraps_vertically(&self) -> bool {
        matches!(self.layout.topology, Topology::Torus) && self.layout.rows == 1
    }

    /// The storage cell that `(x, y)` stands for. On an axis where the
    /// tile wraps onto itself, halo ring 1 is the interior line on the far
    /// side; everywhere else a cell stands for itself.
    pub const fn settle(&self, x: usize, y: usize) -> (usize, usize) {
        (
            fold(x, self.x_start(), self.x_end(), self.wraps_horizontally()),
            fold(y, self.y_start(), self.y_end(), self.wraps_vertically()),
        )
    }

    /// Global coordinates of the interior cell at storage `(x, y)`.
    pub const fn global(&self, x: usize, y: usize) -> (usize, usize) {
        (
            self.offset_x.saturating_add(x).saturating_sub(HALO),
            self.offset_y.saturating_add(y).saturating_sub(HALO),
        )
    }

    /// The interior columns grouped into phases. The lock windows of two
    /// columns in the same phase never overlap, across a wrap seam
    /// included, so a phase can run in any order or all at once with the
    /// same result. Phases run one after another.
    pub fn column_phases(&self) -> Vec<Vec<usize>> {
        let columns: Vec<usize> = self.interior_columns().collect();
        let tail = columns.len() % 3;
        let (body, rest) = columns.split_at(columns.len().saturating_sub(tail));
        let mut phases: Vec<Vec<usize>> = (0..3)
            .map(|phase| body.iter().copied().skip(phase).step_by(3).collect())
            .collect();
        phases.extend(rest.iter().map(|&x| vec![x]));
        phases.retain(|phase| !phase.is_empty());
        phases
    }
}

/// Fold halo ring 1 onto the interior line on the far side.
const fn fold(v: usize, start: usize, end: usize, wraps: bool) -> usize {
    if !wraps {
        v
    } else if v.saturating_add(1) == start {
        end
    } else if v == end.saturating_add(1) {
        start
    } else {
        v
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// One generation of one tile.
#[derive(Debug)]
pub struct World {
    geometry: Geometry,
    columns: Vec<Mutex<Column>>,
    /// Current tick.
    pub clock: Tick,
    /// Statistics gathered by this tile during the current tick.
    pub stats: Stats,
    /// Statistics of the current tick summed over every tile.
    pub global_stats: Stats,
    /// Run history up to this tick: latest gauges, accumulated events.
    pub history: Stats,
}

impl World {
    /// A single-tile toroidal world of `width x height` interior cells.
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is below 2.
    pub fn new(width: usize, height: usize) -> Result<Self, WorldError> {
        Self::tile(TileLayout::single(width, height, Topology::Torus)?, TilePosition::default())
    }

    /// The world for the tile at `position` inside `layout`.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::TileOutOfRange`] for a position outside the
    /// layout.
    pub fn tile(layout: TileLayout, position: TilePosition) -> Result<Self, WorldError> {
        let geometry = Geometry::new(layout, position)?;
        let columns = (0..geometry.storage_width())
            .map(|x| {
                let column = (0..geometry.storage_height())
                    .map(|y| {
                        let kind = if geometry.is_interior(x, y) {
                            TileKind::Interior
                        } else {
                            TileKind::Border
                        };
                        Cell::empty(kind)
                    })
                    .collect();
                Mutex::new(column)
            })
            .collect();
        Ok(Self {
            geometry,
            columns,
            clock: 0,
            stats: Stats::default(),
            global_stats: Stats::default(),
            history: Stats::default(),
        })
    }

    /// Layout and position of this tile.
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Interior width.
    pub const fn width(&self) -> usize {
        self.geometry.width
    }

    /// Interior height.
    pub const fn height(&self) -> usize {
        self.geometry.height
    }

    /// Exclusive access to a storage column.
    pub fn column_mut(&mut self, x: usize) -> Option<&mut Column> {
        self.columns
            .get_mut(x)
            .map(|column| column.get_mut().unwrap_or_else(PoisonError::into_inner))
    }

    /// Exclusive access to a storage cell.
    pub fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        self.column_mut(x)?.get_mut(y)
    }

    /// The interior columns with their indices, as a parallel iterator.
    pub fn par_interior_columns_mut(
        &mut self,
    ) -> impl IndexedParallelIterator<Item = (usize, &mut Column)> {
        let range = self.geometry.interior_columns();
        let first = *range.start();
        let count = range.count();
        self.columns
            .par_iter_mut()
            .enumerate()
            .skip(first)
            .take(count)
            .map(|(x, column)| (x, column.get_mut().unwrap_or_else(PoisonError::into_inner)))
    }

    /// Lock columns `x - 1 ..= x + 1` for writing, plus the interior
    /// column they settle on when the tile wraps onto itself.
    pub fn lock_window(&self, x: usize) -> Option<ColumnWindow<'_>> {
        let left = x.checked_sub(1)?;
        let right = x.checked_add(1)?;
        let y = self.geometry.y_start();
        let (left_settled, _) = self.geometry.settle(left, y);
        let (right_settled, _) = self.geometry.settle(right, y);
        ColumnWindow::acquire_all(&self.columns, [left, x, right, left_settled, right_settled])
    }

    /// A read-only view of every cell, usable from many threads at once.
    pub fn view(&mut self) -> GridView<'_> {
        let columns = self
            .columns
            .iter_mut()
            .map(|column| column.get_mut().unwrap_or_else(PoisonError::into_inner).as_slice())
            .collect();
        GridView {
            geometry: &self.geometry,
            columns,
        }
    }

    /// Put `entity` into an empty cell.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::CellOutOfRange`] or [`WorldError::CellOccupied`].
    pub fn place(
        &mut self,
        x: usize,
        y: usize,
        entity: Entity,
        allocator: &EntityAllocator,
    ) -> Result<(), WorldError> {
        let cell = self.cell_mut(x, y).ok_or(WorldError::CellOutOfRange { x, y })?;
        if !cell.is_empty() {
            return Err(WorldError::CellOccupied { x, y });
        }
        cell.occupant = Some(allocator.allocate(entity));
        Ok(())
    }

    /// A copy of the entity at storage coordinates `(x, y)`.
    pub fn occupant(&self, x: usize, y: usize) -> Option<Entity> {
        let column = locks::lock(self.columns.get(x)?);
        column.get(y)?.entity().copied()
    }

    /// Every interior occupant with interior-relative coordinates, in
    /// row-major order.
    pub fn snapshot(&self) -> Vec<(usize, usize, Entity)> {
        let guards: Vec<_> = self.columns.iter().map(locks::lock).collect();
        let mut occupants = Vec::new();
        for y in self.geometry.interior_rows() {
            for x in self.geometry.interior_columns() {
                let entity = guards
                    .get(x)
                    .and_then(|column| column.get(y))
                    .and_then(Cell::entity);
                if let Some(entity) = entity {
                    occupants.push((
                        x.saturating_sub(HALO),
                        y.saturating_sub(HALO),
                        *entity,
                    ));
                }
            }
        }
        occupants
    }

    /// Population gauges counted directly from the interior cells.
    pub fn census(&self) -> Stats {
        let mut stats = Stats::default();
        for (_, _, entity) in self.snapshot() {
            stats.count(&entity);
            if entity.living().is_some_and(Living::is_pregnant) {
                stats.record_pregnant(entity.kind());
            }
        }
        stats
    }

    /// Number of occupied interior cells.
    pub fn occupied(&self) -> usize {
        self.snapshot().len()
    }

    /// Clear every cell, returning records to `allocator`, and zero the
    /// tick's statistics. Columns are cleared in parallel.
    pub fn reset(&mut self, allocator: &EntityAllocator) {
        self.columns
            .par_iter_mut()
            .with_min_len(MIN_COLUMNS_PER_WORKER)
            .for_each_init(
                || allocator.local(),
                |pool, column| {
                    let column = column.get_mut().unwrap_or_else(PoisonError::into_inner);
                    for cell in column.iter_mut() {
                        if let Some(record) = cell.take() {
                            pool.release(record);
                        }
                    }
                },
            );
        self.stats = Stats::default();
        self.global_stats = Stats::default();
    }
}

// ---------------------------------------------------------------------------
// GridView
// ---------------------------------------------------------------------------

/// Shared, lock-free read access to a world whose cells are not being
/// written.
#[derive(Debug)]
pub struct GridView<'a> {
    geometry: &'a Geometry,
    columns: Vec<&'a [Cell]>,
}

impl GridView<'_> {
    /// Geometry of the viewed tile.
    pub const fn geometry(&self) -> &Geometry {
        self.geometry
    }

    /// The cell at `(x, y)`.
    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        self.columns.get(x)?.get(y)
    }

    /// The entity at `(x, y)`.
    pub fn entity(&self, x: usize, y: usize) -> Option<&Entity> {
        self.cell(x, y)?.entity()
    }

    /// The cell one `direction` step away from `(x, y)`.
    pub fn toward(&self, x: usize, y: usize, direction: Direction) -> Option<&Cell> {
        let (nx, ny) = self.geometry.step(x, y, direction)?;
        self.cell(nx, ny)
    }

    /// Whether the cell one `direction` step away is free: present, inside
    /// the global world and unoccupied.
    pub fn is_free_toward(&self, x: usize, y: usize, direction: Direction) -> bool {
        self.geometry.step(x, y, direction).is_some_and(|(nx, ny)| {
            !self.geometry.is_outside(nx, ny) && self.cell(nx, ny).is_some_and(Cell::is_empty)
        })
    }
}
