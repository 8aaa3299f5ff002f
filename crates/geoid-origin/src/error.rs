//! Errors raised by [`PrecisionFrame`](crate::PrecisionFrame) operations.

use crate::EntityId;

/// A camera or entity operation that was rejected without mutating state.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OriginError {
    /// The entity was never added or has been removed.
    #[error("unknown floating entity {0:?}")]
    UnknownEntity(EntityId),

    /// The requested position contains NaN or infinity.
    #[error("non-finite position for {target}: [{x}, {y}, {z}]")]
    NonFinite {
        /// What the position was meant for.
        target: &'static str,
        /// X component.
        x: f64,
        /// Y component.
        y: f64,
        /// Z component.
        z: f64,
    },
}
