//! Planet-scale level of detail: a CDLOD quadtree per cube face, an
//! asynchronous priority-ordered geometry pipeline, and the hand-off
//! protocol that swaps meshes without gaps.

mod arena;
mod error;
mod forge;
mod headless;
mod patch;
mod planet;
mod priority_queue;
mod scene;
mod transition;
mod worker_pool;

pub use arena::{PatchArena, PatchId};
pub use error::LodError;
pub use forge::{ChunkForge, MeshStamp, PatchMesh};
pub use headless::{HeadlessMesh, HeadlessScene, MeshRecord};
pub use patch::{GenerationState, LodAction, LodSettings, PatchTicket, SurfacePatch};
pub use planet::{Planet, PlanetSettings, PlanetStats};
pub use priority_queue::PriorityTaskQueue;
pub use scene::{MeshFactory, MeshHandle, PatchMaterial};
pub use transition::{GuardEvent, Outgoing, Transition, TransitionGuard, TransitionKind};
pub use worker_pool::{
    GenerationTask, GeneratorFn, PoolError, PoolEvent, TaskError, WorkerPool, WorkerPoolConfig,
    resolve_worker_count,
};
