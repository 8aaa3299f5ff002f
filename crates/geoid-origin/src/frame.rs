//! The [`PrecisionFrame`]: camera-relative rendering of `f64` positions.
//!
//! Every frame [`PrecisionFrame::update`] folds the camera's accumulated
//! render-space displacement into its `f64` position, snaps the camera back
//! to the render-space origin, and recomputes each entity's render position
//! as `(entity − camera)` cast to `f32`. The subtraction happens in `f64`
//! so nearby objects keep their precision regardless of absolute magnitude.

use glam::{DVec3, Vec3};
use rustc_hash::FxHashMap;
use tracing::{trace, warn};

use crate::OriginError;

/// Handle to a floating entity registered with a [`PrecisionFrame`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    /// Raw numeric id (for logging).
    #[must_use]
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Clone, Copy, Debug)]
struct FloatingEntity {
    position: DVec3,
    render: Vec3,
}

/// Camera plus the floating entities positioned relative to it.
///
/// Only `position` values are authoritative world coordinates; render
/// positions are derived data and must never be read back as world space.
#[derive(Debug)]
pub struct PrecisionFrame {
    camera_position: DVec3,
    /// Render-space displacement integrated since the last update.
    camera_render: Vec3,
    entities: FxHashMap<EntityId, FloatingEntity>,
    next_id: u64,
    frame: u64,
}

impl PrecisionFrame {
    /// Create a frame with the camera at `camera_position` and no entities.
    #[must_use]
    pub fn new(camera_position: DVec3) -> Self {
        Self {
            camera_position,
            camera_render: Vec3::ZERO,
            entities: FxHashMap::default(),
            next_id: 0,
            frame: 0,
        }
    }

    /// The camera's high-precision position.
    #[must_use]
    pub fn camera_position(&self) -> DVec3 {
        self.camera_position
    }

    /// Move the camera to an absolute position.
    ///
    /// Discards any pending render-space displacement and re-derives every
    /// entity's render position.
    pub fn set_camera_position(&mut self, position: DVec3) -> Result<(), OriginError> {
        ensure_finite("camera", position)?;
        self.camera_position = position;
        self.camera_render = Vec3::ZERO;
        self.recompute_render_positions();
        Ok(())
    }

    /// Accumulate a render-space displacement (physics or input integration).
    ///
    /// The displacement is folded into the `f64` position on the next
    /// [`update`](Self::update). A delta that would leave the pending
    /// displacement non-finite is rejected and nothing changes.
    pub fn translate_camera(&mut self, delta: Vec3) -> Result<(), OriginError> {
        let pending = self.camera_render + delta;
        ensure_finite("camera displacement", pending.as_dvec3())?;
        self.camera_render = pending;
        Ok(())
    }

    /// The camera's render-space position; exactly zero right after an update.
    #[must_use]
    pub fn camera_render_position(&self) -> Vec3 {
        self.camera_render
    }

    /// Per-frame recentering step. Call before the renderer reads the scene.
    pub fn update(&mut self) {
        if self.camera_render != Vec3::ZERO {
            self.camera_position += self.camera_render.as_dvec3();
            self.camera_render = Vec3::ZERO;
        }
        self.recompute_render_positions();
        self.frame += 1;
        trace!(
            frame = self.frame,
            entities = self.entities.len(),
            x = self.camera_position.x,
            y = self.camera_position.y,
            z = self.camera_position.z,
            "floating origin recentered"
        );
    }

    /// Number of completed updates.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Register a floating entity at `position`.
    pub fn add(&mut self, position: DVec3) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.entities.insert(
            id,
            FloatingEntity {
                position,
                render: (position - self.camera_position).as_vec3(),
            },
        );
        id
    }

    /// Unregister an entity, returning its last position.
    pub fn remove(&mut self, id: EntityId) -> Option<DVec3> {
        self.entities.remove(&id).map(|e| e.position)
    }

    /// Whether `id` refers to a live entity.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether no entities are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// High-precision position of an entity.
    #[must_use]
    pub fn position(&self, id: EntityId) -> Option<DVec3> {
        self.entities.get(&id).map(|e| e.position)
    }

    /// Move an entity; its render position is refreshed immediately.
    pub fn set_position(&mut self, id: EntityId, position: DVec3) -> Result<(), OriginError> {
        ensure_finite("entity", position)?;
        let camera = self.camera_position;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(OriginError::UnknownEntity(id))?;
        entity.position = position;
        entity.render = (position - camera).as_vec3();
        Ok(())
    }

    /// Render-space position of an entity (relative to the camera).
    #[must_use]
    pub fn render_position(&self, id: EntityId) -> Option<Vec3> {
        self.entities.get(&id).map(|e| e.render)
    }

    /// Distance from the camera to a high-precision point.
    #[must_use]
    pub fn distance_to(&self, point: DVec3) -> f64 {
        self.camera_position.distance(point)
    }

    /// Place the camera at `offset` from a target entity.
    ///
    /// Aborts without touching the camera if the target is unknown or the
    /// resulting position is not finite.
    pub fn teleport_camera_to(&mut self, target: EntityId, offset: DVec3) -> Result<(), OriginError> {
        let Some(anchor) = self.position(target) else {
            warn!(target = target.raw(), "teleport target does not exist");
            return Err(OriginError::UnknownEntity(target));
        };
        let destination = anchor + offset;
        if let Err(err) = ensure_finite("teleport", destination) {
            warn!(target = target.raw(), %err, "teleport target has no valid position");
            return Err(err);
        }
        self.set_camera_position(destination)
    }

    fn recompute_render_positions(&mut self) {
        let camera = self.camera_position;
        for entity in self.entities.values_mut() {
            entity.render = (entity.position - camera).as_vec3();
        }
    }
}

impl Default for PrecisionFrame {
    fn default() -> Self {
        Self::new(DVec3::ZERO)
    }
}

fn ensure_finite(target: &'static str, p: DVec3) -> Result<(), OriginError> {
    if p.is_finite() {
        Ok(())
    } else {
        Err(OriginError::NonFinite {
            target,
            x: p.x,
            y: p.y,
            z: p.z,
        })
    }
}
