//! A scene backend with no GPU behind it.
//!
//! Keeps a ledger of every mesh it hands out so the planet can be driven
//! from tests and from the headless binary, and so mesh lifetimes can be
//! audited (created, disposed, still alive, currently shown).

use std::cell::RefCell;
use std::rc::Rc;

use geoid_origin::EntityId;
use geoid_terrain::PatchGeometry;
use rustc_hash::FxHashMap;
use tracing::error;

use crate::scene::{MeshFactory, MeshHandle, PatchMaterial};

/// What the ledger knows about one live mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshRecord {
    /// Anchor entity the mesh is parented to.
    pub parent: Option<EntityId>,
    /// Whether the mesh is shown.
    pub enabled: bool,
    /// Assigned material.
    pub material: Option<PatchMaterial>,
    /// Visibility-evaluation override.
    pub always_active: bool,
    /// Vertex count of the uploaded geometry.
    pub vertices: usize,
    /// Triangle count of the uploaded geometry.
    pub triangles: usize,
}

#[derive(Debug, Default)]
struct Ledger {
    next_id: u64,
    meshes: FxHashMap<u64, MeshRecord>,
    created: u64,
    disposed: u64,
}

/// In-memory [`MeshFactory`].
#[derive(Clone, Debug, Default)]
pub struct HeadlessScene {
    ledger: Rc<RefCell<Ledger>>,
}

impl HeadlessScene {
    /// Create an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Meshes created so far.
    #[must_use]
    pub fn created(&self) -> u64 {
        self.ledger.borrow().created
    }

    /// Meshes disposed so far.
    #[must_use]
    pub fn disposed(&self) -> u64 {
        self.ledger.borrow().disposed
    }

    /// Meshes created and not yet disposed.
    #[must_use]
    pub fn alive(&self) -> usize {
        self.ledger.borrow().meshes.len()
    }

    /// Meshes currently shown.
    #[must_use]
    pub fn enabled(&self) -> usize {
        self.ledger.borrow().meshes.values().filter(|m| m.enabled).count()
    }

    /// Triangles across all shown meshes.
    #[must_use]
    pub fn enabled_triangles(&self) -> usize {
        self.ledger
            .borrow()
            .meshes
            .values()
            .filter(|m| m.enabled)
            .map(|m| m.triangles)
            .sum()
    }

    /// Snapshot of a live mesh.
    #[must_use]
    pub fn record(&self, mesh: &HeadlessMesh) -> Option<MeshRecord> {
        self.ledger.borrow().meshes.get(&mesh.id).cloned()
    }

    /// Snapshots of every live mesh.
    #[must_use]
    pub fn records(&self) -> Vec<MeshRecord> {
        self.ledger.borrow().meshes.values().cloned().collect()
    }
}

impl MeshFactory for HeadlessScene {
    type Handle = HeadlessMesh;

    fn create_mesh(&mut self, geometry: &PatchGeometry) -> HeadlessMesh {
        let mut ledger = self.ledger.borrow_mut();
        let id = ledger.next_id;
        ledger.next_id += 1;
        ledger.created += 1;
        ledger.meshes.insert(
            id,
            MeshRecord {
                parent: None,
                enabled: false,
                material: None,
                always_active: false,
                vertices: geometry.vertex_count(),
                triangles: geometry.triangle_count(),
            },
        );
        HeadlessMesh {
            id,
            ledger: Rc::clone(&self.ledger),
        }
    }
}

/// Handle to a mesh in a [`HeadlessScene`].
#[derive(Debug)]
pub struct HeadlessMesh {
    id: u64,
    ledger: Rc<RefCell<Ledger>>,
}

impl HeadlessMesh {
    /// Ledger key of this mesh.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    fn update(&self, f: impl FnOnce(&mut MeshRecord)) {
        match self.ledger.borrow_mut().meshes.get_mut(&self.id) {
            Some(record) => f(record),
            None => error!(mesh = self.id, "mutating a mesh the scene no longer knows"),
        }
    }
}

impl MeshHandle for HeadlessMesh {
    fn set_parent(&mut self, anchor: EntityId) {
        self.update(|m| m.parent = Some(anchor));
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.update(|m| m.enabled = enabled);
    }

    fn is_enabled(&self) -> bool {
        self.ledger
            .borrow()
            .meshes
            .get(&self.id)
            .is_some_and(|m| m.enabled)
    }

    fn set_material(&mut self, material: PatchMaterial) {
        self.update(|m| m.material = Some(material));
    }

    fn set_always_active(&mut self, always_active: bool) {
        self.update(|m| m.always_active = always_active);
    }

    fn dispose(self) {
        let mut ledger = self.ledger.borrow_mut();
        if ledger.meshes.remove(&self.id).is_some() {
            ledger.disposed += 1;
        } else {
            error!(mesh = self.id, "mesh disposed twice");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geoid_cubesphere::{CubeFace, UvBounds};
    use geoid_terrain::{GenerationPayload, generate_patch_geometry};
    use glam::DVec3;

    fn geometry() -> PatchGeometry {
        generate_patch_geometry(&GenerationPayload {
            bounds: UvBounds::FULL,
            resolution: 2,
            radius: 10.0,
            face: CubeFace::Top,
            level: 0,
            max_level: 0,
            seed: 0,
            displacement: None,
        })
        .unwrap()
    }

    #[test]
    fn test_new_mesh_starts_disabled() {
        let mut scene = HeadlessScene::new();
        let mesh = scene.create_mesh(&geometry());
        assert!(!mesh.is_enabled());
        let record = scene.record(&mesh).unwrap();
        assert_eq!(record.vertices, 9);
        assert_eq!(record.triangles, 8);
        assert_eq!(scene.alive(), 1);
        assert_eq!(scene.enabled(), 0);
        mesh.dispose();
    }

    #[test]
    fn test_handle_mutations_reach_ledger() {
        let mut scene = HeadlessScene::new();
        let mut mesh = scene.create_mesh(&geometry());
        let material = PatchMaterial {
            level: 2,
            max_level: 8,
            camera_position: DVec3::ONE,
        };
        mesh.set_enabled(true);
        mesh.set_material(material);
        mesh.set_always_active(true);

        let record = scene.record(&mesh).unwrap();
        assert!(record.enabled);
        assert!(record.always_active);
        assert_eq!(record.material, Some(material));
        assert_eq!(scene.enabled(), 1);
        assert_eq!(scene.enabled_triangles(), 8);
        mesh.dispose();
    }

    #[test]
    fn test_dispose_counts_once() {
        let mut scene = HeadlessScene::new();
        let a = scene.create_mesh(&geometry());
        let b = scene.create_mesh(&geometry());
        a.dispose();
        assert_eq!(scene.created(), 2);
        assert_eq!(scene.disposed(), 1);
        assert_eq!(scene.alive(), 1);
        b.dispose();
        assert_eq!(scene.alive(), 0);
    }
}
