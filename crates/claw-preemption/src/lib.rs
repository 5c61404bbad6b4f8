//! Quota-aware preemption for Clawbernetes.
//!
//! `claw-preemption` picks which running workloads to evict so that a
//! pending, higher-priority workload fits on a candidate node. Victims are
//! restricted to the pending workload's elastic quota.
//!
//! # Features
//!
//! - **Eligibility gate**: skip preemption while earlier victims are still
//!   terminating on the nominated node
//! - **Minimal victim sets**: evict everything preemptable, then reprieve
//!   the most important workloads that can stay
//! - **Disruption budgets**: budget-violating victims are reprieved first
//!   and counted separately
//! - **Quota limits**: a workload is only reprieved if the preemptor's
//!   quota stays within its limit
//! - **Isolated simulation**: every node is evaluated on its own copy of
//!   the node and the cycle state
//!
//! # Example
//!
//! ```rust
//! use claw_preemption::{
//!     CycleState, NodeInfo, NodeResourcesFit, QuotaPreemptor, Snapshot,
//! };
//! use claw_workload::{keys, ResourceList, Workload};
//!
//! let spot = Workload::new("default", "spot-training")
//!     .with_label(keys::LABEL_QUOTA_NAME, "team-a")
//!     .with_priority(100)
//!     .with_requests(ResourceList::new().with_gpus(4));
//!
//! let snapshot = Snapshot::new().with_node(
//!     NodeInfo::new("gpu-node-1")
//!         .with_allocatable(ResourceList::new().with_gpus(4))
//!         .with_workload(spot),
//! );
//! let preemptor = QuotaPreemptor::with_defaults(NodeResourcesFit::new(snapshot));
//!
//! let urgent = Workload::new("default", "inference")
//!     .with_label(keys::LABEL_QUOTA_NAME, "team-a")
//!     .with_priority(750)
//!     .with_requests(ResourceList::new().with_gpus(4));
//!
//! let result = preemptor.dry_run_preemption(&CycleState::new(), &urgent, &[]);
//! assert_eq!(result.candidates.len(), 1);
//! assert_eq!(result.candidates[0].victims[0].name, "spot-training");
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            QuotaPreemptor               │
//! │  ┌───────────┐  ┌────────────────────┐  │
//! │  │Eligibility│  │  Victim selection  │  │
//! │  │   gate    │  │ (budgets, quota)   │  │
//! │  └───────────┘  └────────────────────┘  │
//! │  ┌─────────────────────────────────────┐│
//! │  │         FrameworkHandle             ││
//! │  │ (snapshot, extension hooks, filter) ││
//! │  └─────────────────────────────────────┘│
//! └─────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod config;
pub mod error;
pub mod framework;
pub mod node;
pub mod pdb;
pub mod preemptor;
pub mod quota;
pub mod status;

// Re-export main types
pub use config::ElasticQuotaConfig;
pub use error::{PreemptionError, Result};
pub use framework::{FrameworkHandle, NodeResourcesFit};
pub use node::{NodeInfo, Snapshot};
pub use pdb::{DisruptionBudget, filter_workloads_with_budget_violation};
pub use preemptor::{
    Candidate, DryRunResult, Eligibility, QuotaPreemptor, VictimSet, Victims,
    more_important_first,
};
pub use quota::{CycleState, QuotaState, QuotaUsageAccessor, StaticQuotaUsage};
pub use status::{Status, StatusCode};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::config::ElasticQuotaConfig;
    pub use crate::error::{PreemptionError, Result};
    pub use crate::framework::{FrameworkHandle, NodeResourcesFit};
    pub use crate::node::{NodeInfo, Snapshot};
    pub use crate::pdb::DisruptionBudget;
    pub use crate::preemptor::{Candidate, Eligibility, QuotaPreemptor, VictimSet};
    pub use crate::quota::{CycleState, QuotaState, QuotaUsageAccessor};
    pub use crate::status::{Status, StatusCode};
}
