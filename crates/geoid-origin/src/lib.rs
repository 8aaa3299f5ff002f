//! Floating-origin coordinate model.
//!
//! The camera and every floating entity carry an `f64` position; the renderer
//! only ever sees `f32` offsets from the camera, which stays pinned at the
//! render-space origin.

mod error;
mod frame;

pub use error::OriginError;
pub use frame::{EntityId, PrecisionFrame};
