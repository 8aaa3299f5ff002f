//! LOD subsystem errors.

use crate::PoolError;

/// Why a planet could not be built or reconfigured.
#[derive(Debug, thiserror::Error)]
pub enum LodError {
    /// The worker pool failed to start.
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// A setting is out of range.
    #[error("invalid planet setting `{field}`: {reason}")]
    InvalidSetting {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}
