//! The deterministic patch geometry function.
//!
//! A patch is a `(resolution + 1)²` vertex grid over a rectangle of one cube
//! face. Grid coordinates are interpolated in angle space, projected onto
//! the sphere, scaled by the radius and optionally displaced by fBm noise.
//! Each cell is split along its shorter diagonal.
//!
//! The function reads nothing but its payload, so identical payloads give
//! bit-identical arrays on any worker thread.

use glam::DVec3;
use geoid_cubesphere::{CubeFace, UvBounds, angular_lerp, direction_or_up, face_to_sphere};

use crate::{GeometryError, HeightmapParams, HeightmapSampler};

/// Everything a worker needs to build one patch.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationPayload {
    /// Face rectangle covered by the patch.
    pub bounds: UvBounds,
    /// Grid cells per patch edge.
    pub resolution: u32,
    /// Planet radius in meters.
    pub radius: f64,
    /// Cube face the patch lies on.
    pub face: CubeFace,
    /// Quadtree level of the patch.
    pub level: u32,
    /// Deepest level of the tree the patch belongs to.
    pub max_level: u32,
    /// Noise seed.
    pub seed: u64,
    /// Surface displacement; `None` for a smooth sphere.
    pub displacement: Option<HeightmapParams>,
}

/// Flat vertex/index arrays for one patch.
///
/// `positions` are relative to `origin`, the undisplaced patch center in
/// planet-local `f64` coordinates, so they stay small enough for `f32`.
#[derive(Clone, Debug, PartialEq)]
pub struct PatchGeometry {
    /// Planet-local anchor of the vertex positions.
    pub origin: DVec3,
    /// `3 · vertex_count` floats.
    pub positions: Vec<f32>,
    /// `6 · resolution²` indices, counter-clockwise seen from outside.
    pub indices: Vec<u32>,
    /// `3 · vertex_count` unit normals.
    pub normals: Vec<f32>,
    /// `2 · vertex_count` patch-local texture coordinates in `[0, 1]`.
    pub uvs: Vec<f32>,
}

impl PatchGeometry {
    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    /// Number of triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Vertex count of a patch grid: `(resolution + 1)²`.
#[must_use]
pub fn vertex_count(resolution: u32) -> usize {
    let n = resolution as usize + 1;
    n * n
}

/// Index count of a patch grid: `6 · resolution²`.
#[must_use]
pub fn index_count(resolution: u32) -> usize {
    let r = resolution as usize;
    r * r * 6
}

/// Largest grid resolution a payload may ask for. Keeps one task's buffers
/// in the tens of megabytes.
pub const MAX_RESOLUTION: u32 = 1024;

/// Check a resolution against `1..=MAX_RESOLUTION`.
pub fn validate_resolution(resolution: u32) -> Result<(), GeometryError> {
    if resolution == 0 {
        return Err(GeometryError::ZeroResolution);
    }
    if resolution > MAX_RESOLUTION {
        return Err(GeometryError::ResolutionTooLarge(resolution));
    }
    Ok(())
}

fn validate(payload: &GenerationPayload) -> Result<(), GeometryError> {
    validate_resolution(payload.resolution)?;
    let b = payload.bounds;
    if !b.is_valid() {
        return Err(GeometryError::InvalidBounds {
            u_min: b.u_min,
            u_max: b.u_max,
            v_min: b.v_min,
            v_max: b.v_max,
        });
    }
    if !(payload.radius.is_finite() && payload.radius > 0.0) {
        return Err(GeometryError::InvalidRadius(payload.radius));
    }
    if let Some(params) = &payload.displacement {
        params.validate()?;
    }
    if payload.level > payload.max_level {
        return Err(GeometryError::LevelOutOfRange {
            level: payload.level,
            max_level: payload.max_level,
        });
    }
    Ok(())
}

/// Build the geometry described by `payload`.
pub fn generate_patch_geometry(payload: &GenerationPayload) -> Result<PatchGeometry, GeometryError> {
    validate(payload)?;

    let r = payload.resolution;
    let side = r as usize + 1;
    let b = payload.bounds;
    let center = b.center();
    let origin = face_to_sphere(payload.face, center.x, center.y) * payload.radius;

    let sampler = payload.displacement.as_ref().map(|params| {
        HeightmapSampler::new(HeightmapParams {
            seed: payload.seed,
            ..params.clone()
        })
    });

    let count = vertex_count(r);
    let mut world = Vec::with_capacity(count);
    let mut directions = Vec::with_capacity(count);
    let mut positions = Vec::with_capacity(count * 3);
    let mut uvs = Vec::with_capacity(count * 2);

    for j in 0..side {
        let tv = j as f64 / r as f64;
        let v = angular_lerp(b.v_min, b.v_max, tv);
        for i in 0..side {
            let tu = i as f64 / r as f64;
            let u = angular_lerp(b.u_min, b.u_max, tu);

            let dir = face_to_sphere(payload.face, u, v);
            let height = sampler.as_ref().map_or(0.0, |s| s.sample(dir));
            let p = dir * (payload.radius + height);

            let local = (p - origin).as_vec3();
            positions.extend_from_slice(&[local.x, local.y, local.z]);
            uvs.extend_from_slice(&[tu as f32, tv as f32]);
            world.push(p);
            directions.push(dir);
        }
    }

    let indices = triangulate(r, &world);

    let normals = if sampler.is_some() {
        smooth_normals(&world, &directions, &indices)
    } else {
        directions
            .iter()
            .flat_map(|d| {
                let n = d.as_vec3();
                [n.x, n.y, n.z]
            })
            .collect()
    };

    Ok(PatchGeometry {
        origin,
        positions,
        indices,
        normals,
        uvs,
    })
}

/// Which diagonal of a cell to cut along.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Diagonal {
    /// From `(i, j)` to `(i + 1, j + 1)`.
    Main,
    /// From `(i + 1, j)` to `(i, j + 1)`.
    Anti,
}

fn shorter_diagonal(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> Diagonal {
    if a.distance_squared(d) <= b.distance_squared(c) {
        Diagonal::Main
    } else {
        Diagonal::Anti
    }
}

fn triangulate(resolution: u32, world: &[DVec3]) -> Vec<u32> {
    let side = resolution + 1;
    let mut indices = Vec::with_capacity(index_count(resolution));
    for j in 0..resolution {
        for i in 0..resolution {
            let a = j * side + i;
            let b = a + 1;
            let c = a + side;
            let d = c + 1;
            let diagonal = shorter_diagonal(
                world[a as usize],
                world[b as usize],
                world[c as usize],
                world[d as usize],
            );
            match diagonal {
                Diagonal::Main => indices.extend_from_slice(&[a, b, d, a, d, c]),
                Diagonal::Anti => indices.extend_from_slice(&[a, b, c, b, d, c]),
            }
        }
    }
    indices
}

/// Area-weighted vertex normals; a vertex whose accumulated normal vanishes
/// keeps its sphere direction.
fn smooth_normals(world: &[DVec3], directions: &[DVec3], indices: &[u32]) -> Vec<f32> {
    let mut acc = vec![DVec3::ZERO; world.len()];
    for tri in indices.chunks_exact(3) {
        let (ia, ib, ic) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let n = (world[ib] - world[ia]).cross(world[ic] - world[ia]);
        acc[ia] += n;
        acc[ib] += n;
        acc[ic] += n;
    }
    acc.iter()
        .zip(directions)
        .flat_map(|(n, dir)| {
            let n = n.try_normalize().unwrap_or(direction_or_up(*dir)).as_vec3();
            [n.x, n.y, n.z]
        })
        .collect()
}
