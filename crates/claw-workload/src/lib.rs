//! Workload model shared by the Clawbernetes scheduler plugins.
//!
//! `claw-workload` describes the objects the coscheduling cache and the
//! quota-aware preemptor consume from the cluster:
//!
//! - [`Workload`]: a schedulable member with labels, annotations, priority,
//!   placement and resource requests
//! - [`ResourceList`]: named resource quantities with quota arithmetic
//! - [`LabelSelector`]: label queries used by disruption budgets
//! - [`keys`]: the recognized label and annotation conventions
//!
//! # Example
//!
//! ```rust
//! use claw_workload::{keys, ResourceList, Workload};
//!
//! let member = Workload::new("default", "trainer-0")
//!     .with_annotation(keys::ANNOTATION_GANG_NAME, "trainer")
//!     .with_annotation(keys::ANNOTATION_GANG_MIN_NUM, "4")
//!     .with_label(keys::LABEL_QUOTA_NAME, "team-a")
//!     .with_requests(ResourceList::new().with_gpus(8));
//!
//! assert_eq!(member.key(), "default/trainer-0");
//! assert_eq!(member.quota_name(), "team-a");
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

pub mod error;
pub mod keys;
pub mod resources;
pub mod selector;
pub mod workload;

pub use error::{Result, WorkloadError};
pub use keys::object_key;
pub use resources::{RESOURCE_CPU, RESOURCE_GPU, RESOURCE_MEMORY, ResourceList};
pub use selector::{LabelSelector, SelectorOperator, SelectorRequirement};
pub use workload::{PreemptionPolicy, Workload};
