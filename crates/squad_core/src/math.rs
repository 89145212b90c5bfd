//! Planar vector and angle helpers.
//!
//! The battlefield is a continuous 2D plane. Scenario files call the second
//! axis `z` (ground plane of the renderer); inside the engine it is `y`.
//! Facing is measured in radians counter-clockwise from +x, so a unit with
//! facing `0.0` looks down the positive x axis.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, Mul, Neg, Sub};

/// Distances below this are treated as zero length.
pub const EPSILON: f64 = 1e-9;

/// 2D vector / point on the battlefield.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate (scenario `z`).
    pub y: f64,
}

impl Vec2 {
    /// Zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Create a new vector.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Unit vector pointing along `angle` radians.
    #[must_use]
    pub fn from_angle(angle: f64) -> Self {
        Self::new(angle.cos(), angle.sin())
    }

    /// Squared length (avoids sqrt for comparisons).
    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (other - self).length()
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Unit vector in the same direction, or zero for a degenerate vector.
    #[must_use]
    pub fn normalize_or_zero(self) -> Self {
        let len = self.length();
        if len < EPSILON {
            Self::ZERO
        } else {
            Self::new(self.x / len, self.y / len)
        }
    }

    /// Linear interpolation, `t = 0` gives `self`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }

    /// Angle of this vector in radians (`atan2(y, x)`).
    #[must_use]
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Rotate by `angle` radians counter-clockwise.
    #[must_use]
    pub fn rotate(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// True if both coordinates are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

/// Wrap an angle into `(-PI, PI]`.
#[must_use]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle % (2.0 * PI);
    if a <= -PI {
        a += 2.0 * PI;
    } else if a > PI {
        a -= 2.0 * PI;
    }
    a
}

/// Shortest-arc difference between two angles, in `[0, PI]`.
#[must_use]
pub fn angle_between(a: f64, b: f64) -> f64 {
    normalize_angle(a - b).abs()
}

/// Facing a unit at `from` needs to look at `to`.
///
/// Returns `None` when the points coincide.
#[must_use]
pub fn facing_towards(from: Vec2, to: Vec2) -> Option<f64> {
    let delta = to - from;
    if delta.length_squared() < EPSILON {
        None
    } else {
        Some(delta.angle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_arithmetic() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(3.0, -1.0);
        assert_eq!(a + b, Vec2::new(4.0, 1.0));
        assert_eq!(b - a, Vec2::new(2.0, -3.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));
        assert_eq!(-a, Vec2::new(-1.0, -2.0));
        assert!((a.dot(b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_distance_and_length() {
        assert!((Vec2::new(3.0, 4.0).length() - 5.0).abs() < 1e-12);
        assert!((Vec2::ZERO.distance(Vec2::new(0.0, 2.0)) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_degenerate() {
        assert_eq!(Vec2::ZERO.normalize_or_zero(), Vec2::ZERO);
        let n = Vec2::new(0.0, 5.0).normalize_or_zero();
        assert!((n.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_angle_between_shortest_arc() {
        assert!((angle_between(0.0, PI / 2.0) - PI / 2.0).abs() < 1e-12);
        // 350 degrees vs 10 degrees is 20 degrees apart
        let a = 350f64.to_radians();
        let b = 10f64.to_radians();
        assert!((angle_between(a, b) - 20f64.to_radians()).abs() < 1e-9);
        assert!(angle_between(PI, -PI).abs() < 1e-9);
        assert!(angle_between(0.0, 3.0 * PI) <= PI + 1e-12);
    }

    #[test]
    fn test_facing_towards() {
        assert_eq!(facing_towards(Vec2::ZERO, Vec2::ZERO), None);
        let f = facing_towards(Vec2::ZERO, Vec2::new(0.0, 1.0)).unwrap();
        assert!((f - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_rotate() {
        let r = Vec2::new(1.0, 0.0).rotate(PI / 2.0);
        assert!(r.x.abs() < 1e-12);
        assert!((r.y - 1.0).abs() < 1e-12);
    }
}
