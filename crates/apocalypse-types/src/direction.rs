//! Neighbourhood directions.
//!
//! The direction table covers the cell itself, its four cardinal neighbours
//! and the eight cells at Manhattan distance two. Steering looks at all twelve
//! neighbours; movement, birth and mating only ever use the cardinal ones.
//!
//! ```text
//!        UU
//!     UL  U  UR
//! LL   L  @  R   RR
//!     DL  D  DR
//!        DD
//! ```

use serde::{Deserialize, Serialize};

use crate::bearing::Bearing;

/// One entry of the 13-entry direction table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// No movement.
    Stay,
    /// One cell to the left.
    Left,
    /// One cell up.
    Up,
    /// One cell to the right.
    Right,
    /// One cell down.
    Down,
    /// Two cells to the left.
    LeftLeft,
    /// Diagonal up-left.
    UpLeft,
    /// Two cells up.
    UpUp,
    /// Diagonal up-right.
    UpRight,
    /// Two cells to the right.
    RightRight,
    /// Diagonal down-right.
    DownRight,
    /// Two cells down.
    DownDown,
    /// Diagonal down-left.
    DownLeft,
}

/// The four cardinal directions, clockwise starting from the left.
pub const CARDINAL: [Direction; 4] = [
    Direction::Left,
    Direction::Up,
    Direction::Right,
    Direction::Down,
];

/// The eight directions at Manhattan distance two, clockwise from the left.
pub const DISTANCE_TWO: [Direction; 8] = [
    Direction::LeftLeft,
    Direction::UpLeft,
    Direction::UpUp,
    Direction::UpRight,
    Direction::RightRight,
    Direction::DownRight,
    Direction::DownDown,
    Direction::DownLeft,
];

const L: Direction = Direction::Left;
const U: Direction = Direction::Up;
const R: Direction = Direction::Right;
const D: Direction = Direction::Down;

/// Every ordering of the cardinal directions.
///
/// Picking a row uniformly at random gives a uniformly random visiting order
/// for the four neighbours without shuffling on the hot path.
pub const CARDINAL_PERMUTATIONS: [[Direction; 4]; 24] = [
    [L, U, R, D],
    [L, U, D, R],
    [L, R, U, D],
    [L, R, D, U],
    [L, D, U, R],
    [L, D, R, U],
    [U, L, R, D],
    [U, L, D, R],
    [U, R, L, D],
    [U, R, D, L],
    [U, D, L, R],
    [U, D, R, L],
    [R, L, U, D],
    [R, L, D, U],
    [R, U, L, D],
    [R, U, D, L],
    [R, D, L, U],
    [R, D, U, L],
    [D, L, U, R],
    [D, L, R, U],
    [D, U, L, R],
    [D, U, R, L],
    [D, R, L, U],
    [D, R, U, L],
];

impl Direction {
    /// Horizontal offset of the target cell.
    pub const fn dx(self) -> isize {
        match self {
            Self::Stay | Self::Up | Self::Down | Self::UpUp | Self::DownDown => 0,
            Self::Left | Self::UpLeft | Self::DownLeft => -1,
            Self::Right | Self::UpRight | Self::DownRight => 1,
            Self::LeftLeft => -2,
            Self::RightRight => 2,
        }
    }

    /// Vertical offset of the target cell (positive is down).
    pub const fn dy(self) -> isize {
        match self {
            Self::Stay | Self::Left | Self::Right | Self::LeftLeft | Self::RightRight => 0,
            Self::Up | Self::UpLeft | Self::UpRight => -1,
            Self::Down | Self::DownLeft | Self::DownRight => 1,
            Self::UpUp => -2,
            Self::DownDown => 2,
        }
    }

    /// Whether this is one of the four cardinal directions.
    pub const fn is_cardinal(self) -> bool {
        matches!(self, Self::Left | Self::Up | Self::Right | Self::Down)
    }

    /// The cardinal direction 90 degrees clockwise. Other entries map to
    /// themselves.
    pub const fn clockwise(self) -> Self {
        match self {
            Self::Left => Self::Up,
            Self::Up => Self::Right,
            Self::Right => Self::Down,
            Self::Down => Self::Left,
            other => other,
        }
    }

    /// The cardinal direction 90 degrees counter-clockwise. Other entries map
    /// to themselves.
    pub const fn counter_clockwise(self) -> Self {
        match self {
            Self::Left => Self::Down,
            Self::Up => Self::Left,
            Self::Right => Self::Up,
            Self::Down => Self::Right,
            other => other,
        }
    }

    /// The offset of this direction as an (unnormalised) bearing.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_bearing(self) -> Bearing {
        Bearing::new(self.dx() as f32, self.dy() as f32)
    }

    /// Map a bearing onto a cardinal direction by quadrant.
    ///
    /// Bearings shorter than one unit mean "no strong preference" and map to
    /// [`Direction::Stay`].
    pub fn from_bearing(bearing: Bearing) -> Self {
        use core::f32::consts::FRAC_PI_4;

        if bearing.magnitude() < 1.0 {
            return Self::Stay;
        }
        let angle = bearing.angle();
        let three_quarters = 3.0 * FRAC_PI_4;
        if (-three_quarters..-FRAC_PI_4).contains(&angle) {
            Self::Up
        } else if (-FRAC_PI_4..FRAC_PI_4).contains(&angle) {
            Self::Right
        } else if (FRAC_PI_4..three_quarters).contains(&angle) {
            Self::Down
        } else {
            Self::Left
        }
    }
}
