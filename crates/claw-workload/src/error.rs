//! Error types for the workload model.

use thiserror::Error;

/// Result type for workload model operations.
pub type Result<T> = std::result::Result<T, WorkloadError>;

/// Errors raised while interpreting workload metadata.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkloadError {
    /// A label selector requirement is malformed.
    #[error("invalid label selector requirement on key {key}: {reason}")]
    InvalidSelector {
        /// Label key of the offending requirement.
        key: String,
        /// Description of why the requirement is invalid.
        reason: String,
    },

    /// A resource quantity could not be interpreted.
    #[error("invalid quantity for resource {resource}: {reason}")]
    InvalidQuantity {
        /// Resource name.
        resource: String,
        /// Description of why the quantity is invalid.
        reason: String,
    },
}
