//! Collision primitives for continuous movement.
//!
//! All functions are pure. A moving point travels along the segment
//! `start -> end`; intersection functions return the earliest parameter
//! `t` in `[0, 1]` at which it enters the (expanded) shape, `Some(0.0)` when
//! the start already lies inside, and `None` when the segment stays clear.
//! Degenerate input (zero-length segments, coincident points) never yields
//! NaN.

use crate::math::{Vec2, EPSILON};

/// Penetration depth below which a point on a boundary counts as touching,
/// not overlapping.
pub const CONTACT_TOLERANCE: f64 = 1e-6;

/// Segments shorter than this are treated as stationary points.
pub const MIN_SEGMENT_LENGTH: f64 = 1e-3;

/// Closest point to `p` on segment `a -> b`.
#[must_use]
pub fn closest_point_on_segment(p: Vec2, a: Vec2, b: Vec2) -> Vec2 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq < EPSILON {
        return a;
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Shortest distance from `p` to segment `a -> b`.
#[must_use]
pub fn point_segment_distance(p: Vec2, a: Vec2, b: Vec2) -> f64 {
    p.distance(closest_point_on_segment(p, a, b))
}

/// Earliest entry of a point moving `start -> end` into a circle.
///
/// Touching the boundary while moving outward or tangentially is not a hit,
/// so a unit resting exactly at the separation distance may still walk away.
#[must_use]
pub fn line_circle_intersect_t(start: Vec2, end: Vec2, center: Vec2, radius: f64) -> Option<f64> {
    let f = start - center;
    let c = f.length_squared() - radius * radius;
    if c < -CONTACT_TOLERANCE {
        return Some(0.0);
    }

    let d = end - start;
    if d.length() < MIN_SEGMENT_LENGTH {
        return None;
    }

    let a = d.length_squared();
    let b = 2.0 * f.dot(d);
    if b >= 0.0 {
        // moving away from (or around) the centre
        return None;
    }
    if c <= CONTACT_TOLERANCE {
        return Some(0.0);
    }

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    if (0.0..=1.0).contains(&t) {
        Some(t)
    } else {
        None
    }
}

/// An oriented rectangle: centre, half extents along its local axes and a
/// rotation (radians) of the local x axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedRect {
    /// Centre of the rectangle.
    pub center: Vec2,
    /// Half extent along the local x axis.
    pub half_width: f64,
    /// Half extent along the local y axis.
    pub half_depth: f64,
    /// Rotation of the local frame.
    pub rotation: f64,
}

impl OrientedRect {
    /// Transform a world point into the rectangle's local frame.
    #[must_use]
    pub fn to_local(&self, p: Vec2) -> Vec2 {
        (p - self.center).rotate(-self.rotation)
    }

    /// True if `p` lies strictly inside the rectangle grown by `margin`.
    #[must_use]
    pub fn contains(&self, p: Vec2, margin: f64) -> bool {
        let local = self.to_local(p);
        local.x.abs() < self.half_width + margin - CONTACT_TOLERANCE
            && local.y.abs() < self.half_depth + margin - CONTACT_TOLERANCE
    }
}

/// Earliest entry of a point moving `start -> end` into an oriented
/// rectangle expanded by `radius` on every side (Minkowski sum with the
/// mover's footprint, approximated by the enlarged box).
#[must_use]
pub fn line_rect_intersect_t(start: Vec2, end: Vec2, rect: &OrientedRect, radius: f64) -> Option<f64> {
    if rect.contains(start, radius) {
        return Some(0.0);
    }
    if start.distance(end) < MIN_SEGMENT_LENGTH {
        return None;
    }

    let p = rect.to_local(start);
    let q = rect.to_local(end);
    let d = q - p;
    let half = [rect.half_width + radius, rect.half_depth + radius];
    let origin = [p.x, p.y];
    let dir = [d.x, d.y];

    let mut t_enter = f64::NEG_INFINITY;
    let mut t_exit = f64::INFINITY;
    for axis in 0..2 {
        if dir[axis].abs() < EPSILON {
            if origin[axis].abs() >= half[axis] {
                return None;
            }
            continue;
        }
        let t1 = (-half[axis] - origin[axis]) / dir[axis];
        let t2 = (half[axis] - origin[axis]) / dir[axis];
        let (near, far) = if t1 < t2 { (t1, t2) } else { (t2, t1) };
        t_enter = t_enter.max(near);
        t_exit = t_exit.min(far);
    }

    if t_enter > 1.0 || t_exit <= t_enter.max(0.0) + EPSILON {
        return None;
    }
    Some(t_enter.max(0.0))
}

/// True if `point` lies within `radius` of the circle at `center`.
#[must_use]
pub fn point_in_circle(point: Vec2, center: Vec2, radius: f64) -> bool {
    point.distance(center) < radius - CONTACT_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64) -> Vec2 {
        Vec2::new(x, y)
    }

    // =========================================================================
    // Point-segment distance
    // =========================================================================

    #[test]
    fn test_point_segment_distance_projection() {
        let d = point_segment_distance(v(2.0, 1.0), v(0.0, 0.0), v(4.0, 0.0));
        assert!((d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_point_segment_distance_clamps_to_endpoints() {
        let d = point_segment_distance(v(-3.0, 4.0), v(0.0, 0.0), v(4.0, 0.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_point_segment_distance_zero_length() {
        let d = point_segment_distance(v(3.0, 4.0), v(0.0, 0.0), v(0.0, 0.0));
        assert!((d - 5.0).abs() < 1e-12);
        assert!(!d.is_nan());
    }

    // =========================================================================
    // Line-circle
    // =========================================================================

    #[test]
    fn test_line_circle_head_on() {
        let t = line_circle_intersect_t(v(0.0, 0.0), v(10.0, 0.0), v(5.0, 0.0), 1.0).unwrap();
        assert!((t - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_line_circle_miss() {
        assert!(line_circle_intersect_t(v(0.0, 0.0), v(10.0, 0.0), v(5.0, 3.0), 1.0).is_none());
    }

    #[test]
    fn test_line_circle_beyond_end() {
        assert!(line_circle_intersect_t(v(0.0, 0.0), v(2.0, 0.0), v(5.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn test_line_circle_already_inside() {
        let t = line_circle_intersect_t(v(0.2, 0.0), v(3.0, 0.0), v(0.0, 0.0), 1.0);
        assert_eq!(t, Some(0.0));
    }

    #[test]
    fn test_line_circle_touching_moving_away() {
        assert!(line_circle_intersect_t(v(1.0, 0.0), v(3.0, 0.0), v(0.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn test_line_circle_touching_moving_in() {
        let t = line_circle_intersect_t(v(1.0, 0.0), v(-3.0, 0.0), v(0.0, 0.0), 1.0);
        assert_eq!(t, Some(0.0));
    }

    #[test]
    fn test_line_circle_zero_length_outside() {
        assert!(line_circle_intersect_t(v(3.0, 0.0), v(3.0, 0.0), v(0.0, 0.0), 1.0).is_none());
    }

    // =========================================================================
    // Line-rect
    // =========================================================================

    fn wall() -> OrientedRect {
        OrientedRect {
            center: v(5.0, 0.0),
            half_width: 0.25,
            half_depth: 3.0,
            rotation: 0.0,
        }
    }

    #[test]
    fn test_line_rect_axis_aligned_hit() {
        let t = line_rect_intersect_t(v(0.0, 0.0), v(10.0, 0.0), &wall(), 0.5).unwrap();
        // expanded face at x = 5 - 0.25 - 0.5 = 4.25
        assert!((t - 0.425).abs() < 1e-9);
    }

    #[test]
    fn test_line_rect_parallel_miss() {
        assert!(line_rect_intersect_t(v(0.0, 5.0), v(10.0, 5.0), &wall(), 0.5).is_none());
    }

    #[test]
    fn test_line_rect_rotated() {
        let rotated = OrientedRect {
            rotation: std::f64::consts::FRAC_PI_2,
            ..wall()
        };
        // rotated a quarter turn, the wall now spans x in [2, 8] at y = 0
        let t = line_rect_intersect_t(v(5.0, -5.0), v(5.0, 5.0), &rotated, 0.0).unwrap();
        assert!((t - 0.475).abs() < 1e-9);
        assert!(line_rect_intersect_t(v(0.0, 0.0), v(1.0, 0.0), &rotated, 0.0).is_none());
    }

    #[test]
    fn test_line_rect_start_inside() {
        assert_eq!(
            line_rect_intersect_t(v(5.0, 0.0), v(10.0, 0.0), &wall(), 0.5),
            Some(0.0)
        );
    }

    #[test]
    fn test_line_rect_leaving_from_face() {
        assert!(line_rect_intersect_t(v(4.25, 0.0), v(0.0, 0.0), &wall(), 0.5).is_none());
    }

    #[test]
    fn test_line_rect_zero_length() {
        assert!(line_rect_intersect_t(v(0.0, 0.0), v(0.0, 0.0), &wall(), 0.5).is_none());
    }

    #[test]
    fn test_rect_contains_margin() {
        assert!(wall().contains(v(4.5, 0.0), 0.5));
        assert!(!wall().contains(v(4.0, 0.0), 0.5));
    }
}
