//! Error types for the preemption system.

use thiserror::Error;

/// Result type for preemption operations.
pub type Result<T> = std::result::Result<T, PreemptionError>;

/// Errors that abort victim selection on one node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreemptionError {
    /// The simulated node does not hold the workload being removed.
    #[error("workload {workload} not found on node {node}")]
    WorkloadNotOnNode {
        /// `namespace/name` of the workload.
        workload: String,
        /// Name of the node.
        node: String,
    },

    /// A framework extension hook rejected a simulated change.
    #[error("framework extension failed: {reason}")]
    Extension {
        /// Description of the failure.
        reason: String,
    },
}
