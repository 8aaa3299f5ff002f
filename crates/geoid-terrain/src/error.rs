//! Patch geometry errors.

/// Why a generation payload could not be turned into geometry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    /// A patch needs at least one grid cell per edge.
    #[error("resolution must be at least 1")]
    ZeroResolution,

    /// More grid cells per edge than a worker may allocate.
    #[error("resolution {0} exceeds the maximum of {max}", max = crate::MAX_RESOLUTION)]
    ResolutionTooLarge(u32),

    /// UV bounds contain NaN/infinity or are inverted.
    #[error("invalid uv bounds [{u_min}, {u_max}] x [{v_min}, {v_max}]")]
    InvalidBounds {
        /// Lower `u` edge.
        u_min: f64,
        /// Upper `u` edge.
        u_max: f64,
        /// Lower `v` edge.
        v_min: f64,
        /// Upper `v` edge.
        v_max: f64,
    },

    /// Radius must be a positive finite number.
    #[error("invalid planet radius {0}")]
    InvalidRadius(f64),

    /// A displacement parameter would make sampling unbounded or undefined.
    #[error("invalid displacement `{field}`: {value}")]
    InvalidDisplacement {
        /// Offending parameter.
        field: &'static str,
        /// Its value.
        value: f64,
    },

    /// The patch claims a level deeper than its tree allows.
    #[error("level {level} exceeds max level {max_level}")]
    LevelOutOfRange {
        /// Requested level.
        level: u32,
        /// Deepest allowed level.
        max_level: u32,
    },
}
