//! The six faces of a cubesphere and their basis vectors.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// The six faces of the cube that forms the cubesphere.
///
/// `Front` looks down +Z, `Right` down +X and `Top` down +Y; the other three
/// are their opposites.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum CubeFace {
    /// +Z face
    Front = 0,
    /// −Z face
    Back = 1,
    /// −X face
    Left = 2,
    /// +X face
    Right = 3,
    /// +Y face
    Top = 4,
    /// −Y face
    Bottom = 5,
}

impl CubeFace {
    /// All six faces in canonical order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::Front,
        CubeFace::Back,
        CubeFace::Left,
        CubeFace::Right,
        CubeFace::Top,
        CubeFace::Bottom,
    ];

    /// The opposite face (e.g., `Front` → `Back`).
    #[must_use]
    pub fn opposite(self) -> CubeFace {
        match self {
            CubeFace::Front => CubeFace::Back,
            CubeFace::Back => CubeFace::Front,
            CubeFace::Left => CubeFace::Right,
            CubeFace::Right => CubeFace::Left,
            CubeFace::Top => CubeFace::Bottom,
            CubeFace::Bottom => CubeFace::Top,
        }
    }

    /// Outward-pointing unit normal for this face.
    #[must_use]
    pub fn normal(self) -> DVec3 {
        match self {
            CubeFace::Front => DVec3::Z,
            CubeFace::Back => DVec3::NEG_Z,
            CubeFace::Left => DVec3::NEG_X,
            CubeFace::Right => DVec3::X,
            CubeFace::Top => DVec3::Y,
            CubeFace::Bottom => DVec3::NEG_Y,
        }
    }

    /// Tangent vector: direction of increasing `u` on this face.
    #[must_use]
    pub fn tangent(self) -> DVec3 {
        match self {
            CubeFace::Front => DVec3::X,
            CubeFace::Back => DVec3::NEG_X,
            CubeFace::Left => DVec3::Z,
            CubeFace::Right => DVec3::NEG_Z,
            CubeFace::Top => DVec3::X,
            CubeFace::Bottom => DVec3::X,
        }
    }

    /// Bitangent vector: direction of increasing `v` on this face.
    #[must_use]
    pub fn bitangent(self) -> DVec3 {
        match self {
            CubeFace::Front => DVec3::Y,
            CubeFace::Back => DVec3::Y,
            CubeFace::Left => DVec3::Y,
            CubeFace::Right => DVec3::Y,
            CubeFace::Top => DVec3::NEG_Z,
            CubeFace::Bottom => DVec3::Z,
        }
    }

    /// Lower-case face name, used in log fields.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CubeFace::Front => "front",
            CubeFace::Back => "back",
            CubeFace::Left => "left",
            CubeFace::Right => "right",
            CubeFace::Top => "top",
            CubeFace::Bottom => "bottom",
        }
    }
}

impl std::fmt::Display for CubeFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
