//! Bearing: the 2D movement preference of an entity.
//!
//! The coordinate system matches the grid: `x` grows to the right and `y`
//! grows downwards, so a bearing of `(0, -1)` points up.

use core::ops::{Add, AddAssign, Div, Mul};

use serde::{Deserialize, Serialize};

/// A 2D real vector encoding an entity's current directional preference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bearing {
    /// Horizontal component (positive is right).
    pub x: f32,
    /// Vertical component (positive is down).
    pub y: f32,
}

impl Bearing {
    /// The zero bearing. Adding it to another bearing is a no-op.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a bearing from its components.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Create a bearing from a polar angle (radians) and a magnitude.
    pub fn from_polar(angle: f32, magnitude: f32) -> Self {
        Self {
            x: magnitude * angle.cos(),
            y: magnitude * angle.sin(),
        }
    }

    /// Euclidean length of the vector.
    pub fn magnitude(self) -> f32 {
        self.x.hypot(self.y)
    }

    /// Angle in radians, in `[-PI, PI]`.
    pub fn angle(self) -> f32 {
        self.y.atan2(self.x)
    }

    /// Unit vector with the same angle. The zero vector normalises to zero.
    pub fn normalized(self) -> Self {
        let magnitude = self.magnitude();
        if magnitude > 0.0 {
            self / magnitude
        } else {
            Self::ZERO
        }
    }

    /// Scale the vector by `factor`.
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }
}

impl Add for Bearing {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl AddAssign for Bearing {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Mul<f32> for Bearing {
    type Output = Self;

    fn mul(self, rhs: f32) -> Self {
        self.scaled(rhs)
    }
}

impl Div<f32> for Bearing {
    type Output = Self;

    fn div(self, rhs: f32) -> Self {
        Self {
            x: self.x / rhs,
            y: self.y / rhs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn normalized_has_unit_length() {
        let b = Bearing::new(3.0, -4.0).normalized();
        assert!(close(b.magnitude(), 1.0));
        assert!(close(b.x, 0.6));
        assert!(close(b.y, -0.8));
    }

    #[test]
    fn zero_normalizes_to_zero() {
        assert_eq!(Bearing::ZERO.normalized(), Bearing::ZERO);
    }

    #[test]
    fn polar_roundtrips_angle() {
        let b = Bearing::from_polar(1.0, 0.5);
        assert!(close(b.angle(), 1.0));
        assert!(close(b.magnitude(), 0.5));
    }

    #[test]
    fn arithmetic_is_componentwise() {
        let mut b = Bearing::new(1.0, 2.0) + Bearing::new(0.5, -1.0) * 2.0;
        assert!(close(b.x, 2.0));
        assert!(close(b.y, 0.0));
        b += Bearing::new(1.0, 1.0);
        assert!(close(b.x, 3.0));
        assert!(close(b.y, 1.0));
    }
}
