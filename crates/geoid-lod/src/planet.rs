//! The planet: six root patches, the generation pool, the hand-off guard
//! and the per-frame loop that drives them.
//!
//! Each [`Planet::update`] runs three steps on the main thread:
//!
//! 1. collect finished tasks, forging meshes for results that are still
//!    wanted and retrying failures;
//! 2. advance the transition guard (show ready meshes, retire replaced ones);
//! 3. walk the quadtrees, splitting, collapsing and requesting geometry.
//!
//! All distances are measured in the planet-local frame: the camera's
//! high-precision position minus the planet entity's.

use geoid_cubesphere::{CubeFace, UvBounds};
use geoid_origin::{EntityId, OriginError, PrecisionFrame};
use geoid_terrain::{GenerationPayload, HeightmapParams, PatchGeometry, validate_resolution};
use glam::DVec3;
use tracing::{debug, error, info, trace, warn};

use crate::transition::{GuardEvent, Outgoing, Transition, TransitionGuard, TransitionKind};
use crate::worker_pool::{GenerationTask, PoolEvent, TaskError, WorkerPool, WorkerPoolConfig};
use crate::{
    ChunkForge, GenerationState, LodAction, LodError, LodSettings, MeshFactory, MeshHandle,
    PatchArena, PatchId, PatchMesh, PatchTicket, SurfacePatch,
};

/// Everything that shapes a planet's surface and its LOD behaviour.
#[derive(Clone, Debug, PartialEq)]
pub struct PlanetSettings {
    /// Sphere radius in meters.
    pub radius: f64,
    /// Noise seed.
    pub seed: u64,
    /// Split/collapse tuning.
    pub lod: LodSettings,
    /// Surface noise; `None` renders a smooth sphere.
    pub displacement: Option<HeightmapParams>,
    /// Re-requests after a failed task before a patch is stalled.
    pub max_retries: u32,
}

impl Default for PlanetSettings {
    fn default() -> Self {
        Self {
            radius: 6_371_000.0,
            seed: 1337,
            lod: LodSettings::default(),
            displacement: Some(HeightmapParams::default()),
            max_retries: 2,
        }
    }
}

impl PlanetSettings {
    fn validate(&self) -> Result<(), LodError> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(invalid("radius", format!("{} is not a positive length", self.radius)));
        }
        if let Some(params) = &self.displacement {
            params
                .validate()
                .map_err(|err| invalid("displacement", err.to_string()))?;
        }
        validate_lod(&self.lod)
    }
}

fn validate_lod(lod: &LodSettings) -> Result<(), LodError> {
    validate_resolution(lod.resolution).map_err(|err| invalid("resolution", err.to_string()))?;
    if !(lod.range_multiplier.is_finite() && lod.range_multiplier > 0.0) {
        return Err(invalid("range_multiplier", format!("{} must be positive", lod.range_multiplier)));
    }
    if !(lod.range_decay > 0.0 && lod.range_decay <= 1.0) {
        return Err(invalid("range_decay", format!("{} is outside (0, 1]", lod.range_decay)));
    }
    if !(lod.hysteresis.is_finite() && lod.hysteresis >= 0.0) {
        return Err(invalid("hysteresis", format!("{} must be non-negative", lod.hysteresis)));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: String) -> LodError {
    LodError::InvalidSetting { field, reason }
}

/// Snapshot of a planet's bookkeeping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlanetStats {
    /// Nodes in the arena.
    pub patches: usize,
    /// Nodes without children.
    pub leaves: usize,
    /// Deepest level present.
    pub deepest_level: u32,
    /// Meshes currently shown, including ones the guard is retiring.
    pub visible_meshes: usize,
    /// Patches waiting on a task.
    pub generating: usize,
    /// Patches that gave up after repeated failures.
    pub stalled: usize,
    /// Pending hand-offs.
    pub transitions: usize,
    /// Tasks waiting for a worker.
    pub queued_tasks: usize,
    /// Tasks running on a worker.
    pub active_tasks: usize,
    /// Meshes forged and not yet retired.
    pub live_meshes: u64,
}

/// A planet surface streamed at camera-dependent resolution.
pub struct Planet<H> {
    entity: EntityId,
    settings: PlanetSettings,
    patches: PatchArena<SurfacePatch<H>>,
    roots: [PatchId; 6],
    pool: WorkerPool<PatchTicket>,
    guard: TransitionGuard<PatchMesh<H>>,
    forge: ChunkForge,
    frame: u64,
    next_serial: u64,
    anchored_at: Option<DVec3>,
}

impl<H: MeshHandle> Planet<H> {
    /// Build a planet whose position is the floating entity `entity`,
    /// spawning its own worker pool.
    pub fn new(entity: EntityId, settings: PlanetSettings, pool: WorkerPoolConfig) -> Result<Self, LodError> {
        settings.validate()?;
        Self::with_pool(entity, settings, WorkerPool::new(pool)?)
    }

    /// Build a planet around an existing pool.
    pub fn with_pool(
        entity: EntityId,
        settings: PlanetSettings,
        pool: WorkerPool<PatchTicket>,
    ) -> Result<Self, LodError> {
        settings.validate()?;
        let mut patches = PatchArena::new();
        let roots = CubeFace::ALL.map(|face| {
            patches.insert(SurfacePatch::new(
                face,
                0,
                UvBounds::FULL,
                settings.radius,
                settings.lod.resolution,
                None,
            ))
        });
        info!(
            radius = settings.radius,
            max_level = settings.lod.max_level,
            resolution = settings.lod.resolution,
            workers = pool.worker_count(),
            "planet created"
        );
        Ok(Self {
            entity,
            settings,
            patches,
            roots,
            pool,
            guard: TransitionGuard::new(),
            forge: ChunkForge::new(),
            frame: 0,
            next_serial: 0,
            anchored_at: None,
        })
    }

    /// Run one frame of streaming. Call after [`PrecisionFrame::update`].
    ///
    /// Fails without touching anything if the planet entity is gone.
    pub fn update<F>(&mut self, frame: &mut PrecisionFrame, factory: &mut F) -> Result<(), OriginError>
    where
        F: MeshFactory<Handle = H>,
    {
        let Some(planet) = frame.position(self.entity) else {
            warn!(entity = self.entity.raw(), "planet entity missing, skipping LOD update");
            return Err(OriginError::UnknownEntity(self.entity));
        };
        self.frame += 1;
        self.sync_anchors(frame, planet);

        let camera = frame.camera_position() - planet;
        for event in self.pool.poll() {
            match event {
                PoolEvent::Completed { tag, geometry } => {
                    self.accept(tag, &geometry, frame, factory, planet);
                }
                PoolEvent::Failed { tag, error } => self.fail(tag, &error, frame, camera),
            }
        }
        self.advance_transitions(frame);
        self.traverse(camera);
        Ok(())
    }

    /// Swap in new LOD tuning. Leaf meshes built with a different
    /// resolution or depth limit are regenerated through the guard.
    pub fn apply_lod_settings(&mut self, lod: LodSettings) -> Result<(), LodError> {
        validate_lod(&lod)?;
        if lod == self.settings.lod {
            return Ok(());
        }
        for patch in self.patches.values_mut() {
            patch.resolution = lod.resolution;
        }
        info!(
            max_level = lod.max_level,
            resolution = lod.resolution,
            range_multiplier = lod.range_multiplier,
            range_decay = lod.range_decay,
            "LOD settings changed"
        );
        self.settings.lod = lod;
        Ok(())
    }

    /// Dispose every mesh and stop the workers.
    pub fn teardown(mut self, frame: &mut PrecisionFrame) {
        for mesh in self.guard.drain() {
            self.forge.retire(frame, mesh);
        }
        for patch in self.patches.drain() {
            if let Some(mesh) = patch.mesh {
                self.forge.retire(frame, mesh);
            }
        }
        info!(
            forged = self.forge.forged(),
            retired = self.forge.retired(),
            "planet torn down"
        );
    }

    /// Whether nothing is pending: no transitions and an idle pool.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.guard.is_empty() && self.pool.is_idle()
    }

    /// Current bookkeeping.
    #[must_use]
    pub fn stats(&self) -> PlanetStats {
        let mut stats = PlanetStats {
            patches: self.patches.len(),
            transitions: self.guard.len(),
            queued_tasks: self.pool.queued_tasks(),
            active_tasks: self.pool.active_tasks(),
            live_meshes: self.forge.live(),
            ..PlanetStats::default()
        };
        for (_, patch) in self.patches.iter() {
            stats.leaves += usize::from(patch.is_leaf());
            stats.deepest_level = stats.deepest_level.max(patch.level());
            stats.visible_meshes += usize::from(patch.is_visible());
            stats.generating += usize::from(patch.state == GenerationState::Generating);
            stats.stalled += usize::from(patch.stalled);
        }
        stats.visible_meshes += self.guard.owned_meshes().filter(|m| m.is_enabled()).count();
        stats
    }

    /// Floating entity carrying the planet's position.
    #[must_use]
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Active settings.
    #[must_use]
    pub fn settings(&self) -> &PlanetSettings {
        &self.settings
    }

    /// The six face roots in [`CubeFace::ALL`] order.
    #[must_use]
    pub fn roots(&self) -> [PatchId; 6] {
        self.roots
    }

    /// Look up a node.
    #[must_use]
    pub fn patch(&self, id: PatchId) -> Option<&SurfacePatch<H>> {
        self.patches.get(id)
    }

    /// Ids of every leaf.
    #[must_use]
    pub fn leaves(&self) -> Vec<PatchId> {
        self.patches
            .iter()
            .filter(|(_, p)| p.is_leaf())
            .map(|(id, _)| id)
            .collect()
    }

    /// Updates run so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Tickets of every queued or running task.
    pub fn pending_tickets(&self) -> impl Iterator<Item = &PatchTicket> {
        self.pool.pending_tags()
    }

    /// Mesh build/dispose counters.
    #[must_use]
    pub fn forge(&self) -> &ChunkForge {
        &self.forge
    }

    /// Keep mesh anchors glued to the planet when the planet entity moves.
    fn sync_anchors(&mut self, frame: &mut PrecisionFrame, planet: DVec3) {
        if self.anchored_at == Some(planet) {
            return;
        }
        let meshes = self
            .patches
            .iter()
            .filter_map(|(_, p)| p.mesh.as_ref())
            .chain(self.guard.owned_meshes());
        for mesh in meshes {
            if let Err(err) = frame.set_position(mesh.anchor, planet + mesh.origin) {
                warn!(%err, "failed to move patch anchor");
            }
        }
        self.anchored_at = Some(planet);
    }

    fn accept<F>(
        &mut self,
        tag: PatchTicket,
        geometry: &PatchGeometry,
        frame: &mut PrecisionFrame,
        factory: &mut F,
        planet: DVec3,
    ) where
        F: MeshFactory<Handle = H>,
    {
        let Some(patch) = self
            .patches
            .get_mut(tag.patch)
            .filter(|p| p.ticket == Some(tag.serial))
        else {
            debug!(patch = %tag.patch, serial = tag.serial, "discarding zombie result");
            return;
        };

        let mesh = self.forge.forge(factory, frame, planet, geometry, tag.stamp);
        patch.ticket = None;
        patch.state = GenerationState::Ready;
        patch.failures = 0;
        trace!(patch = %tag.patch, face = %patch.face(), level = patch.level(), "patch mesh ready");

        if let Some(old) = patch.mesh.replace(mesh)
            && let Err(old) = self.guard.attach_outgoing(tag.patch, old)
        {
            warn!(patch = %tag.patch, "replaced mesh outside a transition");
            self.forge.retire(frame, old);
        }
    }

    fn fail(&mut self, tag: PatchTicket, err: &TaskError, frame: &mut PrecisionFrame, camera: DVec3) {
        let max_retries = self.settings.max_retries;
        let Some(patch) = self
            .patches
            .get_mut(tag.patch)
            .filter(|p| p.ticket == Some(tag.serial))
        else {
            debug!(patch = %tag.patch, %err, "discarding failure of a zombie task");
            return;
        };

        patch.failures += 1;
        if patch.failures <= max_retries {
            warn!(patch = %tag.patch, attempt = patch.failures, %err, "retrying patch generation");
            self.request_generation(tag.patch, camera);
            return;
        }

        error!(
            patch = %tag.patch,
            face = %patch.face(),
            level = patch.level(),
            attempts = patch.failures,
            %err,
            "patch generation failed, stalling patch"
        );
        patch.ticket = None;
        patch.stalled = true;
        patch.state = if patch.mesh.is_some() {
            GenerationState::Ready
        } else {
            GenerationState::Idle
        };
        if let Some(record) = self.guard.cancel(tag.patch) {
            self.unwind(record, frame);
        }
    }

    /// Undo a transition that can no longer complete.
    fn unwind(&mut self, record: Transition<PatchMesh<H>>, frame: &mut PrecisionFrame) {
        warn!(owner = %record.owner, kind = ?record.kind, "cancelling transition");
        for out in record.outgoing {
            if let Outgoing::Dispose(mesh) = out {
                self.forge.retire(frame, mesh);
            }
        }
        match record.kind {
            TransitionKind::Subdivide => {
                for child in record.incoming {
                    for mesh in self.detach_subtree(child) {
                        self.forge.retire(frame, mesh);
                    }
                }
                if let Some(owner) = self.patches.get_mut(record.owner) {
                    owner.children = None;
                    owner.stalled = true;
                }
            }
            TransitionKind::Collapse => {
                // Whatever the owner still holds beats an empty hole.
                if let Some(mesh) = self
                    .patches
                    .get_mut(record.owner)
                    .and_then(|p| p.mesh.as_mut())
                {
                    mesh.handle.set_enabled(true);
                }
            }
            TransitionKind::Generate | TransitionKind::Regenerate => {}
        }
        if let Some(owner) = self.patches.get_mut(record.owner) {
            owner.updating = false;
        }
    }

    fn advance_transitions(&mut self, frame: &mut PrecisionFrame) {
        let patches = &self.patches;
        let events = self.guard.advance(self.frame, |id| {
            patches
                .get(id)
                .is_some_and(|p| p.state == GenerationState::Ready && p.mesh.is_some())
        });

        for event in events {
            match event {
                GuardEvent::Show(id) => self.set_enabled(id, true),
                GuardEvent::Hide(id) => self.set_enabled(id, false),
                GuardEvent::Dispose(mesh) => self.forge.retire(frame, mesh),
                GuardEvent::Completed { owner, kind } => {
                    if let Some(patch) = self.patches.get_mut(owner) {
                        patch.updating = false;
                    }
                    trace!(owner = %owner, ?kind, "transition complete");
                }
            }
        }
    }

    fn set_enabled(&mut self, id: PatchId, enabled: bool) {
        if let Some(mesh) = self.patches.get_mut(id).and_then(|p| p.mesh.as_mut()) {
            mesh.handle.set_enabled(enabled);
        }
    }

    fn traverse(&mut self, camera: DVec3) {
        let radius = self.settings.radius;
        let mut stack = self.roots.to_vec();
        while let Some(id) = stack.pop() {
            let Some(patch) = self.patches.get(id) else {
                continue;
            };
            // Mid-update: no re-entry, and its children are not ours to touch.
            if patch.updating {
                continue;
            }
            let children = patch.children;
            let stalled = patch.stalled;
            let action = self.settings.lod.decide(
                radius,
                patch.level(),
                patch.min_distance(camera),
                children.is_some(),
            );

            match (action, children) {
                (LodAction::Split, _) if !stalled => self.subdivide(id, camera),
                (LodAction::Collapse, _) => self.collapse(id, camera),
                (_, Some(children)) => stack.extend(children),
                (_, None) => self.ensure_mesh(id, camera),
            }
        }
    }

    fn subdivide(&mut self, id: PatchId, camera: DVec3) {
        let Some(parent) = self.patches.get(id) else {
            return;
        };
        let (face, level, bounds, radius, resolution) = (
            parent.face(),
            parent.level(),
            parent.bounds(),
            parent.radius(),
            parent.resolution,
        );
        let has_mesh = parent.mesh.is_some();

        let children = bounds.quadrants().map(|quadrant| {
            self.patches.insert(SurfacePatch::new(
                face,
                level + 1,
                quadrant,
                radius,
                resolution,
                Some(id),
            ))
        });
        if let Some(parent) = self.patches.get_mut(id) {
            parent.children = Some(children);
            parent.updating = true;
        }

        let outgoing = if has_mesh {
            vec![Outgoing::Hide(id)]
        } else {
            Vec::new()
        };
        self.guard
            .begin(id, TransitionKind::Subdivide, children.to_vec(), outgoing);
        for child in children {
            self.request_generation(child, camera);
        }
        debug!(patch = %id, %face, level, "subdividing");
    }

    fn collapse(&mut self, id: PatchId, camera: DVec3) {
        let Some(children) = self.patches.get(id).and_then(|p| p.children) else {
            return;
        };
        let outgoing: Vec<_> = children
            .into_iter()
            .flat_map(|child| self.detach_subtree(child))
            .map(Outgoing::Dispose)
            .collect();

        let max_level = self.settings.lod.max_level;
        let Some(patch) = self.patches.get_mut(id) else {
            return;
        };
        patch.children = None;
        patch.updating = true;
        let needs_mesh = patch.mesh.is_none() || patch.mesh_is_stale(max_level);
        debug!(
            patch = %id,
            face = %patch.face(),
            level = patch.level(),
            retiring = outgoing.len(),
            "collapsing"
        );

        self.guard
            .begin(id, TransitionKind::Collapse, vec![id], outgoing);
        if needs_mesh {
            self.request_generation(id, camera);
        }
    }

    /// Remove `top` and everything below it from the arena, returning every
    /// mesh they or their abandoned transitions held.
    fn detach_subtree(&mut self, top: PatchId) -> Vec<PatchMesh<H>> {
        let mut meshes = Vec::new();
        let mut stack = vec![top];
        while let Some(id) = stack.pop() {
            meshes.extend(self.guard.abandon(id));
            if let Some(patch) = self.patches.remove(id) {
                if let Some(children) = patch.children {
                    stack.extend(children);
                }
                meshes.extend(patch.mesh);
            }
        }
        meshes
    }

    fn ensure_mesh(&mut self, id: PatchId, camera: DVec3) {
        let max_level = self.settings.lod.max_level;
        let Some(patch) = self.patches.get_mut(id) else {
            return;
        };
        if patch.stalled || patch.state == GenerationState::Generating {
            return;
        }
        let kind = if patch.mesh.is_none() {
            TransitionKind::Generate
        } else if patch.mesh_is_stale(max_level) {
            TransitionKind::Regenerate
        } else {
            return;
        };
        patch.updating = true;
        self.guard.begin(id, kind, vec![id], Vec::new());
        self.request_generation(id, camera);
    }

    fn request_generation(&mut self, id: PatchId, camera: DVec3) {
        let serial = self.next_serial;
        self.next_serial += 1;
        let Some(patch) = self.patches.get_mut(id) else {
            return;
        };
        patch.ticket = Some(serial);
        patch.state = GenerationState::Generating;

        let max_level = self.settings.lod.max_level;
        let stamp = patch.current_stamp(max_level);
        let payload = GenerationPayload {
            bounds: patch.bounds(),
            resolution: patch.resolution,
            radius: self.settings.radius,
            face: patch.face(),
            level: patch.level(),
            max_level,
            seed: self.settings.seed,
            displacement: self.settings.displacement.clone(),
        };
        let priority = patch.center().distance(camera);
        self.pool.enqueue(GenerationTask {
            payload,
            priority,
            tag: PatchTicket {
                patch: id,
                serial,
                stamp,
            },
        });
    }
}
