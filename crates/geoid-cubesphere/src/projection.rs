//! Cube-to-sphere projection.
//!
//! A face point `(u, v) ∈ [-1, 1]²` maps to the cube surface as
//! `normal + u·tangent + v·bitangent`, then to the unit sphere by
//! normalization. Patch grids interpolate their UV bounds in angle space
//! ([`angular_lerp`]) so vertex spacing stays even near the cube edges.

use glam::DVec3;

use crate::CubeFace;

/// Direction substituted for a zero-length or non-finite vector.
pub const FALLBACK_UP: DVec3 = DVec3::Y;

/// Normalize `v`, or return [`FALLBACK_UP`] if it cannot be normalized.
#[inline]
#[must_use]
pub fn direction_or_up(v: DVec3) -> DVec3 {
    v.try_normalize().unwrap_or(FALLBACK_UP)
}

/// Point on the surface of the `[-1, 1]` cube.
///
/// The face center `(0, 0)` maps to the face normal.
#[inline]
#[must_use]
pub fn face_to_cube(face: CubeFace, u: f64, v: f64) -> DVec3 {
    face.normal() + u * face.tangent() + v * face.bitangent()
}

/// Unit-sphere direction of a face point.
#[inline]
#[must_use]
pub fn face_to_sphere(face: CubeFace, u: f64, v: f64) -> DVec3 {
    direction_or_up(face_to_cube(face, u, v))
}

/// Point on a sphere of `radius` above a face point.
#[inline]
#[must_use]
pub fn face_to_surface(face: CubeFace, u: f64, v: f64, radius: f64) -> DVec3 {
    face_to_sphere(face, u, v) * radius
}

/// Interpolate between two cube-face coordinates through their angles.
///
/// `t = 0` yields `min` and `t = 1` yields `max` (up to the `tan(atan(x))`
/// round trip); both endpoints are computed identically by neighbouring
/// patches so shared edges agree bit for bit.
#[inline]
#[must_use]
pub fn angular_lerp(min: f64, max: f64, t: f64) -> f64 {
    let a0 = min.atan();
    let a1 = max.atan();
    (a0 * (1.0 - t) + a1 * t).tan()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_face_center_maps_to_normal() {
        for face in CubeFace::ALL {
            let p = face_to_sphere(face, 0.0, 0.0);
            assert!(
                (p - face.normal()).length() < EPSILON,
                "Face center of {face:?} did not map to normal: got {p:?}"
            );
        }
    }

    #[test]
    fn test_all_outputs_on_unit_sphere() {
        for face in CubeFace::ALL {
            for i in 0..=10 {
                for j in 0..=10 {
                    let u = -1.0 + i as f64 * 0.2;
                    let v = -1.0 + j as f64 * 0.2;
                    let p = face_to_sphere(face, u, v);
                    assert!(
                        (p.length() - 1.0).abs() < EPSILON,
                        "Point not on unit sphere for {face:?} at ({u}, {v})"
                    );
                }
            }
        }
    }

    #[test]
    fn test_adjacent_faces_share_edges() {
        // Right edge of Front (u = 1) is the left edge of Right (u = -1).
        for i in 0..=10 {
            let v = -1.0 + i as f64 * 0.2;
            let a = face_to_sphere(CubeFace::Front, 1.0, v);
            let b = face_to_sphere(CubeFace::Right, -1.0, v);
            assert!(
                (a - b).length() < EPSILON,
                "Front/Right seam mismatch at v={v}: {a:?} vs {b:?}"
            );
        }
    }

    #[test]
    fn test_surface_scales_by_radius() {
        let p = face_to_surface(CubeFace::Top, 0.3, -0.7, 6_371_000.0);
        assert!((p.length() - 6_371_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_direction_falls_back_to_up() {
        assert_eq!(direction_or_up(DVec3::ZERO), FALLBACK_UP);
        assert_eq!(direction_or_up(DVec3::splat(f64::NAN)), FALLBACK_UP);
        assert_eq!(direction_or_up(DVec3::new(0.0, 0.0, 3.0)), DVec3::Z);
    }

    #[test]
    fn test_angular_lerp_endpoints_and_midpoint() {
        assert!((angular_lerp(-1.0, 1.0, 0.0) + 1.0).abs() < 1e-12);
        assert!((angular_lerp(-1.0, 1.0, 1.0) - 1.0).abs() < 1e-12);
        assert!(angular_lerp(-1.0, 1.0, 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_angular_lerp_is_monotonic() {
        let mut prev = f64::NEG_INFINITY;
        for i in 0..=32 {
            let x = angular_lerp(-0.5, 0.75, i as f64 / 32.0);
            assert!(x > prev, "angular_lerp not monotonic at step {i}");
            prev = x;
        }
    }

    #[test]
    fn test_angular_lerp_shared_edge_is_bitwise_equal() {
        let left = angular_lerp(-1.0, 0.25, 1.0);
        let right = angular_lerp(0.25, 1.0, 0.0);
        assert_eq!(left.to_bits(), right.to_bits());
    }
}
