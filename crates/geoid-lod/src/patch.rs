//! Quadtree nodes and the distance-based split/collapse decision.

use geoid_cubesphere::{CubeFace, UvBounds, face_to_surface};
use glam::DVec3;

use crate::forge::{MeshStamp, PatchMesh};
use crate::{PatchId, scene::MeshHandle};

/// Generation progress of a patch's own mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenerationState {
    /// No mesh and nothing requested.
    Idle,
    /// A task is queued or running.
    Generating,
    /// The mesh is built.
    Ready,
}

/// Ticket matching a completed task to the request that is still wanted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PatchTicket {
    /// Patch the task was issued for.
    pub patch: PatchId,
    /// Request serial; a newer request on the same patch invalidates it.
    pub serial: u64,
    /// Settings the geometry is built with.
    pub stamp: MeshStamp,
}

/// Tuning knobs for the split/collapse decision.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodSettings {
    /// Deepest quadtree level.
    pub max_level: u32,
    /// Grid cells per patch edge.
    pub resolution: u32,
    /// `k` in `range = radius · k · decay^level`.
    pub range_multiplier: f64,
    /// `decay` in `range = radius · k · decay^level`.
    pub range_decay: f64,
    /// Collapse band: children merge only beyond `range · (1 + hysteresis)`.
    pub hysteresis: f64,
}

impl Default for LodSettings {
    fn default() -> Self {
        Self {
            max_level: 12,
            resolution: 32,
            range_multiplier: 3.0,
            range_decay: 0.6,
            hysteresis: 0.1,
        }
    }
}

impl LodSettings {
    /// Subdivision range of a patch at `level`.
    #[must_use]
    pub fn range(&self, radius: f64, level: u32) -> f64 {
        radius * self.range_multiplier * self.range_decay.powi(level as i32)
    }

    /// Decide what a patch should do this frame.
    #[must_use]
    pub fn decide(&self, radius: f64, level: u32, min_distance: f64, has_children: bool) -> LodAction {
        let range = self.range(radius, level);
        if has_children {
            if level >= self.max_level || min_distance > range * (1.0 + self.hysteresis) {
                LodAction::Collapse
            } else {
                LodAction::Keep
            }
        } else if level < self.max_level && min_distance < range {
            LodAction::Split
        } else {
            LodAction::Keep
        }
    }
}

/// Result of the per-frame LOD decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LodAction {
    /// Leave the node as it is.
    Keep,
    /// Replace the leaf with four children.
    Split,
    /// Replace the children with the node itself.
    Collapse,
}

/// One quadtree node covering a rectangle of a cube face.
#[derive(Debug)]
pub struct SurfacePatch<H> {
    face: CubeFace,
    level: u32,
    bounds: UvBounds,
    radius: f64,
    center: DVec3,
    corners: [DVec3; 4],
    pub(crate) resolution: u32,
    parent: Option<PatchId>,
    pub(crate) children: Option<[PatchId; 4]>,
    pub(crate) mesh: Option<PatchMesh<H>>,
    pub(crate) state: GenerationState,
    pub(crate) ticket: Option<u64>,
    /// Single-flight flag: set while the patch owns a transition.
    pub(crate) updating: bool,
    pub(crate) stalled: bool,
    pub(crate) failures: u32,
}

impl<H> SurfacePatch<H> {
    /// Create a leaf with no mesh. Center and corners are sampled on the
    /// undisplaced sphere.
    #[must_use]
    pub fn new(
        face: CubeFace,
        level: u32,
        bounds: UvBounds,
        radius: f64,
        resolution: u32,
        parent: Option<PatchId>,
    ) -> Self {
        let c = bounds.center();
        Self {
            face,
            level,
            bounds,
            radius,
            center: face_to_surface(face, c.x, c.y, radius),
            corners: bounds.corners().map(|p| face_to_surface(face, p.x, p.y, radius)),
            resolution,
            parent,
            children: None,
            mesh: None,
            state: GenerationState::Idle,
            ticket: None,
            updating: false,
            stalled: false,
            failures: 0,
        }
    }

    /// Shortest distance from `camera` to the center or a corner.
    #[must_use]
    pub fn min_distance(&self, camera: DVec3) -> f64 {
        self.corners
            .iter()
            .fold(self.center.distance(camera), |d, c| d.min(c.distance(camera)))
    }

    /// Stamp a mesh built now would carry.
    #[must_use]
    pub fn current_stamp(&self, max_level: u32) -> MeshStamp {
        MeshStamp {
            level: self.level,
            max_level,
            resolution: self.resolution,
        }
    }

    /// Whether the held mesh was built with different settings.
    #[must_use]
    pub fn mesh_is_stale(&self, max_level: u32) -> bool {
        self.mesh
            .as_ref()
            .is_some_and(|m| m.stamp != self.current_stamp(max_level))
    }

    /// Cube face.
    #[must_use]
    pub fn face(&self) -> CubeFace {
        self.face
    }

    /// Quadtree level (0 for a root).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// UV rectangle.
    #[must_use]
    pub fn bounds(&self) -> UvBounds {
        self.bounds
    }

    /// Sphere radius the patch lies on.
    #[must_use]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Planet-local center on the undisplaced sphere.
    #[must_use]
    pub fn center(&self) -> DVec3 {
        self.center
    }

    /// Grid resolution used for new meshes.
    #[must_use]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Parent node, `None` for a root.
    #[must_use]
    pub fn parent(&self) -> Option<PatchId> {
        self.parent
    }

    /// Children, if subdivided.
    #[must_use]
    pub fn children(&self) -> Option<[PatchId; 4]> {
        self.children
    }

    /// Whether the patch has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// The held mesh.
    #[must_use]
    pub fn mesh(&self) -> Option<&PatchMesh<H>> {
        self.mesh.as_ref()
    }

    /// Generation progress.
    #[must_use]
    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Whether a transition owned by this patch is pending.
    #[must_use]
    pub fn is_updating(&self) -> bool {
        self.updating
    }

    /// Whether generation gave up on this patch.
    #[must_use]
    pub fn is_stalled(&self) -> bool {
        self.stalled
    }

    /// Failed attempts since the last success.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

impl<H: MeshHandle> SurfacePatch<H> {
    /// Whether the patch's mesh is currently shown.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.mesh.as_ref().is_some_and(PatchMesh::is_enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RADIUS: f64 = 1000.0;

    fn settings() -> LodSettings {
        LodSettings {
            max_level: 4,
            ..LodSettings::default()
        }
    }

    #[test]
    fn test_range_decays_per_level() {
        let s = settings();
        assert!((s.range(RADIUS, 0) - 3000.0).abs() < 1e-9);
        assert!((s.range(RADIUS, 1) - 1800.0).abs() < 1e-9);
        assert!((s.range(RADIUS, 2) - 1080.0).abs() < 1e-9);
    }

    #[test]
    fn test_leaf_splits_inside_range() {
        let s = settings();
        assert_eq!(s.decide(RADIUS, 1, 1000.0, false), LodAction::Split);
        assert_eq!(s.decide(RADIUS, 1, 2000.0, false), LodAction::Keep);
    }

    #[test]
    fn test_leaf_at_max_level_never_splits() {
        let s = settings();
        assert_eq!(s.decide(RADIUS, 4, 0.0, false), LodAction::Keep);
    }

    #[test]
    fn test_hysteresis_band_holds_children() {
        let s = settings();
        let range = s.range(RADIUS, 1);
        assert_eq!(s.decide(RADIUS, 1, range * 1.05, true), LodAction::Keep);
        assert_eq!(s.decide(RADIUS, 1, range * 1.11, true), LodAction::Collapse);

        let hard = LodSettings {
            hysteresis: 0.0,
            ..s
        };
        assert_eq!(hard.decide(RADIUS, 1, range * 1.05, true), LodAction::Collapse);
    }

    #[test]
    fn test_children_below_lowered_max_level_collapse() {
        let s = LodSettings {
            max_level: 2,
            ..settings()
        };
        assert_eq!(s.decide(RADIUS, 2, 0.0, true), LodAction::Collapse);
    }

    #[test]
    fn test_min_distance_uses_nearest_corner() {
        let patch: SurfacePatch<()> =
            SurfacePatch::new(CubeFace::Front, 0, UvBounds::FULL, RADIUS, 8, None);
        let corner = face_to_surface(CubeFace::Front, 1.0, 1.0, RADIUS);
        let camera = corner * 1.01;
        let d = patch.min_distance(camera);
        assert!((d - corner.length() * 0.01).abs() < 1e-6, "got {d}");
        assert!(d < patch.center().distance(camera));
    }

    #[test]
    fn test_new_patch_is_idle_leaf() {
        let patch: SurfacePatch<()> =
            SurfacePatch::new(CubeFace::Bottom, 2, UvBounds::new(0.0, 0.5, 0.0, 0.5), RADIUS, 8, None);
        assert!(patch.is_leaf());
        assert_eq!(patch.state(), GenerationState::Idle);
        assert!(!patch.is_updating());
        assert!(!patch.mesh_is_stale(4));
        assert!((patch.center().length() - RADIUS).abs() < 1e-9);
    }
}
