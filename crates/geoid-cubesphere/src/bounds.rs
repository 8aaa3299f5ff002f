//! Axis-aligned rectangles in a face's `[-1, 1]²` UV domain.

use glam::DVec2;
use serde::{Deserialize, Serialize};

/// A rectangle of one cube face in UV space.
///
/// The full face is `[-1, 1] × [-1, 1]`. Quadtree children split a rectangle
/// at its linear midpoint.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UvBounds {
    /// Lower `u` edge.
    pub u_min: f64,
    /// Upper `u` edge.
    pub u_max: f64,
    /// Lower `v` edge.
    pub v_min: f64,
    /// Upper `v` edge.
    pub v_max: f64,
}

impl UvBounds {
    /// The whole face.
    pub const FULL: UvBounds = UvBounds {
        u_min: -1.0,
        u_max: 1.0,
        v_min: -1.0,
        v_max: 1.0,
    };

    /// Create bounds from explicit edges.
    #[must_use]
    pub fn new(u_min: f64, u_max: f64, v_min: f64, v_max: f64) -> Self {
        Self {
            u_min,
            u_max,
            v_min,
            v_max,
        }
    }

    /// Center of the rectangle.
    #[must_use]
    pub fn center(&self) -> DVec2 {
        DVec2::new(
            (self.u_min + self.u_max) * 0.5,
            (self.v_min + self.v_max) * 0.5,
        )
    }

    /// Corners ordered `[(min, min), (max, min), (min, max), (max, max)]`.
    #[must_use]
    pub fn corners(&self) -> [DVec2; 4] {
        [
            DVec2::new(self.u_min, self.v_min),
            DVec2::new(self.u_max, self.v_min),
            DVec2::new(self.u_min, self.v_max),
            DVec2::new(self.u_max, self.v_max),
        ]
    }

    /// Width of the rectangle along `u`.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.u_max - self.u_min
    }

    /// Height of the rectangle along `v`.
    #[must_use]
    pub fn height(&self) -> f64 {
        self.v_max - self.v_min
    }

    /// The four quadrants, ordered like [`corners`](Self::corners):
    /// bottom-left, bottom-right, top-left, top-right.
    #[must_use]
    pub fn quadrants(&self) -> [UvBounds; 4] {
        let mid = self.center();
        [
            UvBounds::new(self.u_min, mid.x, self.v_min, mid.y),
            UvBounds::new(mid.x, self.u_max, self.v_min, mid.y),
            UvBounds::new(self.u_min, mid.x, mid.y, self.v_max),
            UvBounds::new(mid.x, self.u_max, mid.y, self.v_max),
        ]
    }

    /// Whether every edge is a finite number and the rectangle is not inverted.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        [self.u_min, self.u_max, self.v_min, self.v_max]
            .iter()
            .all(|x| x.is_finite())
            && self.u_min <= self.u_max
            && self.v_min <= self.v_max
    }
}

impl Default for UvBounds {
    fn default() -> Self {
        Self::FULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadrants_tile_parent() {
        let parent = UvBounds::new(-1.0, 0.0, 0.0, 1.0);
        let quads = parent.quadrants();
        let area: f64 = quads.iter().map(|q| q.width() * q.height()).sum();
        assert!((area - parent.width() * parent.height()).abs() < 1e-12);

        assert_eq!(quads[0].u_min, parent.u_min);
        assert_eq!(quads[0].v_min, parent.v_min);
        assert_eq!(quads[3].u_max, parent.u_max);
        assert_eq!(quads[3].v_max, parent.v_max);
        assert_eq!(quads[0].u_max, quads[1].u_min);
        assert_eq!(quads[0].v_max, quads[2].v_min);
    }

    #[test]
    fn test_full_face_center_is_origin() {
        assert_eq!(UvBounds::FULL.center(), DVec2::ZERO);
        assert_eq!(UvBounds::default(), UvBounds::FULL);
    }

    #[test]
    fn test_corners_order() {
        let c = UvBounds::new(0.0, 1.0, 2.0, 3.0).corners();
        assert_eq!(c[0], DVec2::new(0.0, 2.0));
        assert_eq!(c[1], DVec2::new(1.0, 2.0));
        assert_eq!(c[2], DVec2::new(0.0, 3.0));
        assert_eq!(c[3], DVec2::new(1.0, 3.0));
    }

    #[test]
    fn test_invalid_bounds_detected() {
        assert!(UvBounds::FULL.is_valid());
        assert!(!UvBounds::new(f64::NAN, 1.0, -1.0, 1.0).is_valid());
        assert!(!UvBounds::new(1.0, -1.0, -1.0, 1.0).is_valid());
    }
}
