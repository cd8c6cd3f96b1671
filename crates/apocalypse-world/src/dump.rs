//! Plain-text world dumps.
//!
//! A dump lists every occupied interior cell of one tile:
//!
//! ```text
//! Width 4; Height 3; Time 12; Entities 2
//! [1 0] H F 9125
//! [3 2] Z _ 40
//! ```
//!
//! Coordinates are interior-relative and the cells come in row-major
//! order. The gender column is `M`, `F`, `f` (pregnant) or `_` for zombies;
//! the last column is the age in ticks, counted from the moment a zombie
//! turned for zombies.

use std::io::{self, Write};
use std::path::PathBuf;

use apocalypse_types::{Entity, Tick};

use crate::topology::TilePosition;
use crate::world::World;

/// File name of the dump of `clock`, relative to the output directory.
///
/// Single-tile runs write `images/step-NNNNNN.img`; tiles of a split world
/// append their position, `images/step-NNNNNN-X-Y.img`.
pub fn dump_path(clock: Tick, tile: Option<TilePosition>) -> PathBuf {
    let name = match tile {
        None => format!("step-{clock:06}.img"),
        Some(position) => format!("step-{clock:06}-{}-{}.img", position.x, position.y),
    };
    PathBuf::from("images").join(name)
}

/// One dump line for `entity` at interior coordinates `(x, y)`.
pub fn dump_line(x: usize, y: usize, entity: &Entity, now: Tick) -> String {
    format!(
        "[{x} {y}] {} {} {}",
        entity.kind().symbol(),
        entity.gender_symbol(),
        entity.age(now)
    )
}

/// Write the dump of `world` to `out` and return the number of entities
/// listed.
///
/// # Errors
///
/// Propagates write failures.
pub fn write_dump<W: Write>(world: &World, out: &mut W) -> io::Result<usize> {
    let occupants = world.snapshot();
    writeln!(
        out,
        "Width {}; Height {}; Time {}; Entities {}",
        world.width(),
        world.height(),
        world.clock,
        occupants.len()
    )?;
    for (x, y, entity) in &occupants {
        writeln!(out, "{}", dump_line(*x, *y, entity, world.clock))?;
    }
    Ok(occupants.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use apocalypse_types::{Bearing, Gender, Living};

    use super::*;
    use crate::allocator::EntityAllocator;

    fn woman(origin: Tick, pending_children: u8) -> Entity {
        Entity::Human {
            living: Living {
                gender: Gender::Female,
                origin,
                fertility_start: 0,
                fertility_end: 0,
                pending_children,
                children_due: 0,
            },
            bearing: Bearing::ZERO,
        }
    }

    #[test]
    fn dump_lists_occupants_row_major() {
        let allocator = EntityAllocator::new();
        let mut world = World::new(4, 3).unwrap();
        world.clock = 100;
        world.place(5, 4, woman(40, 0), &allocator).unwrap();
        world
            .place(
                3,
                2,
                Entity::Zombie {
                    became_zombie: 90,
                    bearing: Bearing::ZERO,
                },
                &allocator,
            )
            .unwrap();
        world.place(2, 3, woman(0, 2), &allocator).unwrap();

        let mut out = Vec::new();
        let written = write_dump(&world, &mut out).unwrap();
        assert_eq!(written, 3);
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "Width 4; Height 3; Time 100; Entities 3\n\
             [1 0] Z _ 10\n\
             [0 1] H f 100\n\
             [3 2] H F 60\n"
        );
    }

    #[test]
    fn dump_paths_carry_the_tile_for_split_worlds() {
        assert_eq!(dump_path(7, None), PathBuf::from("images/step-000007.img"));
        assert_eq!(
            dump_path(1234, Some(TilePosition::new(1, 0))),
            PathBuf::from("images/step-001234-1-0.img")
        );
    }
}
