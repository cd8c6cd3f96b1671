//! Neighbour-attraction steering and the movement decision.
//!
//! An entity looks at the twelve cells around it:
//!
//! ```text
//!   __#__
//!   _###_
//!   ##@##
//!   _###_
//!   __#__
//! ```
//!
//! Every neighbour pulls (positive weight) or pushes (negative weight)
//! along its offset. Cardinal offsets count with their full length,
//! distance-two offsets are normalised first. The result is added to the
//! entity's own bearing, so entities keep some inertia. The steering target
//! may well be occupied; whether the entity can actually go there is
//! decided by [`resolve_destination`].

use apocalypse_types::{Bearing, CARDINAL, DISTANCE_TWO, Direction, Entity, Tick};
use apocalypse_world::GridView;

use crate::config::{LivingWeights, MovementConfig, ZombieWeights};
use crate::random::{RandomSource, random_bearing};
use crate::rates::max_speed;

/// What a neighbouring cell holds, from the steering point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Neighbour {
    Wall,
    Empty,
    Zombie,
    SameSex,
    OppositeSex,
}

fn classify(
    view: &GridView<'_>,
    x: usize,
    y: usize,
    direction: Direction,
    me: &Entity,
) -> Neighbour {
    let geometry = view.geometry();
    let Some((nx, ny)) = geometry.step(x, y, direction) else {
        return Neighbour::Wall;
    };
    if geometry.is_outside(nx, ny) {
        return Neighbour::Wall;
    }
    match view.entity(nx, ny) {
        None => Neighbour::Empty,
        Some(other) if other.is_zombie() => Neighbour::Zombie,
        Some(other) if other.gender() == me.gender() => Neighbour::SameSex,
        Some(_) => Neighbour::OppositeSex,
    }
}

const fn living_weight(weights: &LivingWeights, neighbour: Neighbour) -> f32 {
    match neighbour {
        Neighbour::Wall => weights.wall,
        Neighbour::Empty => weights.empty,
        Neighbour::Zombie => weights.zombie,
        Neighbour::SameSex => weights.same_sex,
        Neighbour::OppositeSex => weights.opposite_sex,
    }
}

const fn zombie_weight(weights: &ZombieWeights, neighbour: Neighbour) -> f32 {
    match neighbour {
        Neighbour::Wall => weights.wall,
        Neighbour::Empty => weights.empty,
        Neighbour::Zombie => weights.zombie,
        Neighbour::SameSex | Neighbour::OppositeSex => weights.living,
    }
}

/// The preferred bearing of `entity`, standing at `(x, y)` of `view`.
///
/// `entity` is passed separately from the grid because its bearing may
/// already have changed this tick.
pub fn steer(
    view: &GridView<'_>,
    x: usize,
    y: usize,
    entity: &Entity,
    config: &MovementConfig,
) -> Bearing {
    let weight = |direction: Direction, near: bool| {
        let neighbour = classify(view, x, y, direction, entity);
        match (entity.is_zombie(), near) {
            (true, true) => zombie_weight(&config.zombie_near, neighbour),
            (true, false) => zombie_weight(&config.zombie_far, neighbour),
            (false, true) => living_weight(&config.living_near, neighbour),
            (false, false) => living_weight(&config.living_far, neighbour),
        }
    };

    let mut bearing = entity.bearing();
    for direction in CARDINAL {
        bearing += direction.as_bearing() * weight(direction, true);
    }
    for direction in DISTANCE_TWO {
        bearing += direction.as_bearing().normalized() * weight(direction, false);
    }
    bearing
}

/// The outcome of a movement decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Move {
    /// Direction the entity wants to step in; [`Direction::Stay`] to stay.
    pub direction: Direction,
    /// The entity's bearing from now on.
    pub bearing: Bearing,
}

#[allow(clippy::cast_possible_truncation)]
fn bearing_quotient<R: RandomSource + ?Sized>(rng: &mut R, config: &MovementConfig) -> f32 {
    let spread = (rng.uniform() - 0.5) as f32;
    spread.mul_add(config.quotient_variance, config.quotient_mean)
}

/// Decide where `entity` at `(x, y)` wants to go and what its bearing
/// becomes.
///
/// The steering bearing is perturbed by a random bearing and mapped onto
/// a direction. A chosen direction is only followed with the entity's
/// speed probability and may be turned 90 degrees or dropped; it is never
/// reversed. An entity that would stay gets a second random push instead.
pub fn decide_move<R: RandomSource + ?Sized>(
    rng: &mut R,
    view: &GridView<'_>,
    x: usize,
    y: usize,
    entity: &Entity,
    now: Tick,
    config: &MovementConfig,
) -> Move {
    let mut bearing = steer(view, x, y, entity, config)
        + random_bearing(rng, config.random_bearing_magnitude) * config.fluctuation;
    let mut direction = Direction::from_bearing(bearing);

    if direction == Direction::Stay {
        let kept = bearing;
        let quotient = bearing_quotient(rng, config);
        bearing += random_bearing(rng, config.random_bearing_magnitude) * quotient;
        return Move {
            direction: Direction::from_bearing(bearing),
            bearing: kept,
        };
    }

    let kept = bearing.normalized() * bearing_quotient(rng, config);
    if rng.uniform() < max_speed(entity, now, &config.speeds) {
        let roll = rng.uniform();
        let missed = config.direction_missed;
        if roll < missed {
            direction = direction.counter_clockwise();
        } else if roll < missed * 2.0 {
            direction = direction.clockwise();
        } else if roll > config.direction_follow + missed * 2.0 {
            direction = Direction::Stay;
        }
    } else {
        direction = Direction::Stay;
    }
    Move {
        direction,
        bearing: kept,
    }
}

/// The first of `direction`, its counter-clockwise and its clockwise turn
/// for which `is_free` holds, or [`Direction::Stay`].
pub fn resolve_destination(direction: Direction, is_free: impl Fn(Direction) -> bool) -> Direction {
    if direction == Direction::Stay {
        return Direction::Stay;
    }
    [
        direction,
        direction.counter_clockwise(),
        direction.clockwise(),
    ]
    .into_iter()
    .find(|&candidate| is_free(candidate))
    .unwrap_or(Direction::Stay)
}
