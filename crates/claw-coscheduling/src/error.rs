//! Error types for the coscheduling cache.

use thiserror::Error;

/// Result type for coscheduling operations.
pub type Result<T> = std::result::Result<T, CoschedulingError>;

/// Errors surfaced by the group-resource client seam.
///
/// Cache event handlers never return these; they log them and keep the
/// registry consistent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoschedulingError {
    /// A group resource with the same key already exists.
    #[error("group resource already exists: {key}")]
    GroupResourceExists {
        /// `namespace/name` of the group resource.
        key: String,
    },

    /// The group resource does not exist.
    #[error("group resource not found: {key}")]
    GroupResourceNotFound {
        /// `namespace/name` of the group resource.
        key: String,
    },

    /// The backing store rejected the request.
    #[error("group resource client failed: {reason}")]
    Client {
        /// Description of the failure.
        reason: String,
    },
}
