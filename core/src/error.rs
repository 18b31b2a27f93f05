//! Errors surfaced by the admission engine.
//!
//! Registration outcomes (`CapacityExhausted`, `AlreadyAdmitted`, ...) are not
//! errors; they live in [`crate::engine::RegistrationOutcome`]. This type
//! covers caller mistakes and store failures the engine does not classify.

use crate::record::MAX_CAPACITY;
use crate::store::StoreError;
use thiserror::Error;

/// Engine error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    /// Capacity must be a positive integer no larger than `MAX_CAPACITY`.
    #[error(
        "Invalid capacity {capacity}: capacity must be between 1 and {max}",
        max = MAX_CAPACITY
    )]
    InvalidCapacity {
        /// The rejected value
        capacity: i64,
    },

    /// Store failure passed through unchanged.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, AdmissionError>;
