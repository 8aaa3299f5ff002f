//! Cube-sphere geometry: the six cube faces, face UV rectangles, and the
//! cube-to-sphere projection shared by the quadtree and the geometry workers.

mod bounds;
mod cube_face;
mod projection;

pub use bounds::UvBounds;
pub use cube_face::CubeFace;
pub use projection::{
    FALLBACK_UP, angular_lerp, direction_or_up, face_to_cube, face_to_sphere, face_to_surface,
};
