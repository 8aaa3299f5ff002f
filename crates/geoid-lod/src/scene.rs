//! The boundary between the LOD engine and whatever draws its meshes.

use geoid_origin::EntityId;
use geoid_terrain::PatchGeometry;
use glam::DVec3;

/// Material parameters assigned to every patch mesh.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PatchMaterial {
    /// Quadtree level of the patch.
    pub level: u32,
    /// Deepest level of the tree.
    pub max_level: u32,
    /// Camera position (world `f64`) when the mesh was built.
    pub camera_position: DVec3,
}

/// A renderable mesh owned by exactly one patch or by the transition guard.
pub trait MeshHandle {
    /// Attach the mesh under a floating entity; vertex positions are
    /// relative to it.
    fn set_parent(&mut self, anchor: EntityId);
    /// Show or hide the mesh.
    fn set_enabled(&mut self, enabled: bool);
    /// Whether the mesh is currently shown.
    fn is_enabled(&self) -> bool;
    /// Assign the patch material.
    fn set_material(&mut self, material: PatchMaterial);
    /// Keep the mesh eligible for visibility evaluation regardless of
    /// bounding-volume culling.
    fn set_always_active(&mut self, always_active: bool);
    /// Release the mesh. Consuming `self` makes a second dispose impossible.
    fn dispose(self);
}

/// Creates mesh resources from geometry buffers.
pub trait MeshFactory {
    /// Handle type produced by this factory.
    type Handle: MeshHandle;

    /// Upload geometry and return a new mesh, initially disabled.
    fn create_mesh(&mut self, geometry: &PatchGeometry) -> Self::Handle;
}
