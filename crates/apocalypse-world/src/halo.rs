//! Keeping the halo consistent across tile boundaries.
//!
//! Two exchanges happen every tick.
//!
//! The **border exchange** runs on the input generation before movement.
//! Each tile sends its two outermost interior lines on every side to the
//! neighbour across that side, and fills its own halo with the lines it
//! receives. Lines span the interior only, so the four 2x2 corner blocks
//! of the halo are never filled and read as empty. Afterwards every
//! cardinal lookahead at distance one or two sees the neighbour's entities
//! exactly as if the world were not split; the diagonal lookahead of
//! steering at a tile corner does not.
//!
//! The **ghost exchange** runs on the output generation after movement.
//! Entities that stepped into halo ring 1 actually belong to the
//! neighbour. They are taken out of this tile, shipped across, written
//! into the neighbour's ring 2 on the facing side and finally merged into
//! its outermost interior line. Where that cell is already taken, the first
//! entity there wins and the newcomer is dropped and counted as
//! `lost_in_transit`. Rows are merged before columns. On an axis where a
//! tile wraps onto itself the step engine writes straight into the far
//! interior line instead, so that axis never has ghosts to lose.
//!
//! Corner cells are not exchanged in this phase either. That is sound only
//! because movement and births are four-connected and reach one cell: an
//! entity can never end a tick in a diagonal halo cell, which is also what
//! bounds every move to one cardinal step.

use apocalypse_types::Tick;

use crate::allocator::EntityAllocator;
use crate::error::ExchangeError;
use crate::exchange::{BorderExchange, ExchangeTag, Strip};
use crate::topology::Side;
use crate::world::{Geometry, World};

/// A full interior row or column of storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Line {
    Row(usize),
    Column(usize),
}

impl Line {
    /// Storage coordinates of the line, in ascending order. Rows span the
    /// interior columns and columns span the interior rows.
    fn cells(self, geometry: &Geometry) -> Vec<(usize, usize)> {
        match self {
            Self::Row(y) => geometry.interior_columns().map(|x| (x, y)).collect(),
            Self::Column(x) => geometry.interior_rows().map(|y| (x, y)).collect(),
        }
    }
}

/// The interior line `depth` cells in from `side` (0 is the outermost).
const fn edge_line(geometry: &Geometry, side: Side, depth: usize) -> Line {
    match side {
        Side::Top => Line::Row(geometry.y_start().saturating_add(depth)),
        Side::Bottom => Line::Row(geometry.y_end().saturating_sub(depth)),
        Side::Left => Line::Column(geometry.x_start().saturating_add(depth)),
        Side::Right => Line::Column(geometry.x_end().saturating_sub(depth)),
    }
}

/// Halo line `ring` cells out from the interior on `side` (1 or 2).
const fn halo_line(geometry: &Geometry, side: Side, ring: usize) -> Line {
    match side {
        Side::Top => Line::Row(geometry.y_start().saturating_sub(ring)),
        Side::Bottom => Line::Row(geometry.y_end().saturating_add(ring)),
        Side::Left => Line::Column(geometry.x_start().saturating_sub(ring)),
        Side::Right => Line::Column(geometry.x_end().saturating_add(ring)),
    }
}

/// Copy the entities along `line`.
fn read_line(world: &mut World, line: Line) -> Strip {
    let cells = line.cells(world.geometry());
    cells
        .into_iter()
        .map(|(x, y)| world.cell_mut(x, y).and_then(|cell| cell.entity().copied()))
        .collect()
}

/// Move the entities out of `line`, returning their records to the pool.
fn take_line(world: &mut World, line: Line, allocator: &EntityAllocator) -> Strip {
    let cells = line.cells(world.geometry());
    let mut pool = allocator.local();
    cells
        .into_iter()
        .map(|(x, y)| {
            let record = world.cell_mut(x, y)?.take()?;
            let entity = *record;
            pool.release(record);
            Some(entity)
        })
        .collect()
}

/// Overwrite `line` with `strip`.
fn write_line(
    world: &mut World,
    line: Line,
    side: Side,
    strip: Strip,
    allocator: &EntityAllocator,
) -> Result<(), ExchangeError> {
    let cells = line.cells(world.geometry());
    if cells.len() != strip.len() {
        return Err(ExchangeError::MalformedStrip {
            side,
            expected: cells.len(),
            actual: strip.len(),
        });
    }
    let mut pool = allocator.local();
    for ((x, y), entity) in cells.into_iter().zip(strip) {
        let Some(cell) = world.cell_mut(x, y) else {
            continue;
        };
        if let Some(old) = cell.take() {
            pool.release(old);
        }
        cell.occupant = entity.map(|entity| pool.allocate(entity));
    }
    Ok(())
}

/// Move every entity from `from` into the matching cell of `into`. The
/// entity already there wins; the newcomer is dropped and counted lost.
fn merge_line(world: &mut World, from: Line, into: Line, allocator: &EntityAllocator) {
    let sources = from.cells(world.geometry());
    let targets = into.cells(world.geometry());
    let mut pool = allocator.local();
    for ((sx, sy), (tx, ty)) in sources.into_iter().zip(targets) {
        let Some(record) = world.cell_mut(sx, sy).and_then(|cell| cell.take()) else {
            continue;
        };
        match world.cell_mut(tx, ty) {
            Some(target) if target.is_empty() => target.occupant = Some(record),
            _ => {
                pool.release(record);
                world.stats.record_lost();
            }
        }
    }
}

/// Sides that have a neighbour to talk to.
fn connected_sides(geometry: &Geometry) -> impl Iterator<Item = Side> + '_ {
    Side::ALL
        .into_iter()
        .filter(|&side| geometry.neighbour(side).is_some())
}

// ---------------------------------------------------------------------------
// Border exchange (input generation)
// ---------------------------------------------------------------------------

/// Send the two outermost interior lines on every connected side.
///
/// # Errors
///
/// Returns an error if a neighbour cannot be reached.
pub fn begin_border_exchange<E: BorderExchange + ?Sized>(
    world: &mut World,
    exchange: &mut E,
) -> Result<(), ExchangeError> {
    let geometry = *world.geometry();
    let clock: Tick = world.clock;
    for side in connected_sides(&geometry) {
        let edge = read_line(world, edge_line(&geometry, side, 0));
        exchange.send(side, ExchangeTag::BorderEdge, clock, edge)?;
        let inner = read_line(world, edge_line(&geometry, side, 1));
        exchange.send(side, ExchangeTag::BorderInner, clock, inner)?;
    }
    Ok(())
}

/// Fill both halo rings on every connected side with the neighbours'
/// border lines.
///
/// # Errors
///
/// Returns an error if a strip never arrives or has the wrong length.
pub fn finish_border_exchange<E: BorderExchange + ?Sized>(
    world: &mut World,
    exchange: &mut E,
    allocator: &EntityAllocator,
) -> Result<(), ExchangeError> {
    let geometry = *world.geometry();
    let clock = world.clock;
    for side in connected_sides(&geometry) {
        let edge = exchange.receive(side, ExchangeTag::BorderEdge, clock)?;
        write_line(world, halo_line(&geometry, side, 1), side, edge, allocator)?;
        let inner = exchange.receive(side, ExchangeTag::BorderInner, clock)?;
        write_line(world, halo_line(&geometry, side, 2), side, inner, allocator)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Ghost exchange (output generation)
// ---------------------------------------------------------------------------

/// Take every entity out of halo ring 1 and send it to the neighbour it
/// moved towards. On a side without neighbour the entities are dropped and
/// counted lost; movement never targets cells beyond a wall, so this only
/// catches inconsistencies.
///
/// # Errors
///
/// Returns an error if a neighbour cannot be reached.
pub fn begin_ghost_exchange<E: BorderExchange + ?Sized>(
    world: &mut World,
    exchange: &mut E,
    allocator: &EntityAllocator,
) -> Result<(), ExchangeError> {
    let geometry = *world.geometry();
    let clock = world.clock;
    for side in Side::ALL {
        let ghosts = take_line(world, halo_line(&geometry, side, 1), allocator);
        if geometry.neighbour(side).is_some() {
            exchange.send(side, ExchangeTag::Ghost, clock, ghosts)?;
        } else {
            for _ in ghosts.iter().flatten() {
                world.stats.record_lost();
            }
        }
    }
    Ok(())
}

/// Receive the neighbours' ghosts into halo ring 2 and merge them into the
/// outermost interior lines, rows first.
///
/// # Errors
///
/// Returns an error if a strip never arrives or has the wrong length.
pub fn finish_ghost_exchange<E: BorderExchange + ?Sized>(
    world: &mut World,
    exchange: &mut E,
    allocator: &EntityAllocator,
) -> Result<(), ExchangeError> {
    let geometry = *world.geometry();
    let clock = world.clock;
    for side in connected_sides(&geometry) {
        let ghosts = exchange.receive(side, ExchangeTag::Ghost, clock)?;
        write_line(world, halo_line(&geometry, side, 2), side, ghosts, allocator)?;
    }
    for side in [Side::Top, Side::Bottom, Side::Left, Side::Right] {
        if geometry.neighbour(side).is_some() {
            merge_line(
                world,
                halo_line(&geometry, side, 2),
                edge_line(&geometry, side, 0),
                allocator,
            );
        }
    }
    Ok(())
}
