//! ChunkForge: turns finished geometry into a scene mesh and back out again.

use geoid_origin::{EntityId, PrecisionFrame};
use geoid_terrain::PatchGeometry;
use glam::DVec3;
use tracing::{trace, warn};

use crate::scene::{MeshFactory, MeshHandle, PatchMaterial};

/// The settings a mesh was generated for. A mesh whose stamp differs from
/// the patch's current stamp is stale and gets regenerated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshStamp {
    /// Patch level.
    pub level: u32,
    /// Tree depth limit at generation time.
    pub max_level: u32,
    /// Grid resolution at generation time.
    pub resolution: u32,
}

/// A forged mesh plus the floating entity it hangs from.
#[derive(Debug)]
pub struct PatchMesh<H> {
    /// Scene handle.
    pub handle: H,
    /// Floating entity at `planet + origin`.
    pub anchor: EntityId,
    /// Planet-local position of the anchor.
    pub origin: DVec3,
    /// Settings the geometry was built with.
    pub stamp: MeshStamp,
}

impl<H: MeshHandle> PatchMesh<H> {
    /// Whether the mesh is currently shown.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.handle.is_enabled()
    }
}

/// Builds and releases patch meshes, counting both.
#[derive(Debug, Default)]
pub struct ChunkForge {
    forged: u64,
    retired: u64,
}

impl ChunkForge {
    /// Create a forge with zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a disabled mesh from `geometry`.
    ///
    /// Registers an anchor entity at `planet_position + geometry.origin` so
    /// the `f32` vertex offsets are resolved against a high-precision point.
    pub fn forge<F: MeshFactory>(
        &mut self,
        factory: &mut F,
        frame: &mut PrecisionFrame,
        planet_position: DVec3,
        geometry: &PatchGeometry,
        stamp: MeshStamp,
    ) -> PatchMesh<F::Handle> {
        let anchor = frame.add(planet_position + geometry.origin);
        let mut handle = factory.create_mesh(geometry);
        handle.set_parent(anchor);
        handle.set_material(PatchMaterial {
            level: stamp.level,
            max_level: stamp.max_level,
            camera_position: frame.camera_position(),
        });
        handle.set_always_active(true);
        handle.set_enabled(false);
        self.forged += 1;
        trace!(
            anchor = anchor.raw(),
            level = stamp.level,
            vertices = geometry.vertex_count(),
            "forged patch mesh"
        );
        PatchMesh {
            handle,
            anchor,
            origin: geometry.origin,
            stamp,
        }
    }

    /// Dispose a mesh and unregister its anchor.
    pub fn retire<H: MeshHandle>(&mut self, frame: &mut PrecisionFrame, mesh: PatchMesh<H>) {
        if frame.remove(mesh.anchor).is_none() {
            warn!(anchor = mesh.anchor.raw(), "retired mesh had no anchor entity");
        }
        mesh.handle.dispose();
        self.retired += 1;
    }

    /// Meshes built so far.
    #[must_use]
    pub fn forged(&self) -> u64 {
        self.forged
    }

    /// Meshes disposed so far.
    #[must_use]
    pub fn retired(&self) -> u64 {
        self.retired
    }

    /// Meshes built and not yet disposed.
    #[must_use]
    pub fn live(&self) -> u64 {
        self.forged - self.retired
    }
}
