//! The member workload object delivered by lifecycle events.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::keys::{self, DEFAULT_QUOTA_NAME, LABEL_PREEMPTIBLE, LABEL_QUOTA_NAME};
use crate::resources::ResourceList;

/// Policy controlling whether a pending workload may preempt others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum PreemptionPolicy {
    /// Never preempt other workloads.
    Never,
    /// Preempt workloads with lower priority.
    #[default]
    PreemptLowerPriority,
}

impl PreemptionPolicy {
    /// Returns true if this policy allows preempting lower priority workloads.
    #[must_use]
    pub const fn allows_preemption(&self) -> bool {
        matches!(self, Self::PreemptLowerPriority)
    }
}

/// A schedulable workload: one member of a gang and a potential preemption
/// victim or preemptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Workload {
    /// Namespace of the workload.
    pub namespace: String,
    /// Name of the workload, unique within its namespace.
    pub name: String,
    /// Labels.
    pub labels: BTreeMap<String, String>,
    /// Annotations.
    pub annotations: BTreeMap<String, String>,
    /// Scheduling priority. Higher is more important.
    pub priority: i32,
    /// Whether this workload may preempt others.
    pub preemption_policy: PreemptionPolicy,
    /// Node the workload is placed on, if any.
    pub node_name: Option<String>,
    /// Node nominated for this workload by an earlier preemption.
    pub nominated_node_name: Option<String>,
    /// Set once the workload is terminating.
    pub deletion_timestamp: Option<DateTime<Utc>>,
    /// When the workload started running.
    pub started_at: Option<DateTime<Utc>>,
    /// Resources requested by the workload.
    pub requests: ResourceList,
}

impl Workload {
    /// Creates a workload with default priority and no placement.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Adds a label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the preemption policy.
    #[must_use]
    pub const fn with_preemption_policy(mut self, policy: PreemptionPolicy) -> Self {
        self.preemption_policy = policy;
        self
    }

    /// Places the workload on a node.
    #[must_use]
    pub fn with_node(mut self, node_name: impl Into<String>) -> Self {
        self.node_name = Some(node_name.into());
        self
    }

    /// Records a nominated node.
    #[must_use]
    pub fn with_nominated_node(mut self, node_name: impl Into<String>) -> Self {
        self.nominated_node_name = Some(node_name.into());
        self
    }

    /// Marks the workload as terminating.
    #[must_use]
    pub const fn terminating_since(mut self, at: DateTime<Utc>) -> Self {
        self.deletion_timestamp = Some(at);
        self
    }

    /// Sets the start time.
    #[must_use]
    pub const fn with_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.started_at = Some(started_at);
        self
    }

    /// Sets the resource requests.
    #[must_use]
    pub fn with_requests(mut self, requests: ResourceList) -> Self {
        self.requests = requests;
        self
    }

    /// Returns the `namespace/name` key.
    #[must_use]
    pub fn key(&self) -> String {
        keys::object_key(&self.namespace, &self.name)
    }

    /// Returns the assigned node, treating an empty name as unassigned.
    #[must_use]
    pub fn assigned_node(&self) -> Option<&str> {
        self.node_name.as_deref().filter(|n| !n.is_empty())
    }

    /// Returns the nominated node, treating an empty name as none.
    #[must_use]
    pub fn nominated_node(&self) -> Option<&str> {
        self.nominated_node_name.as_deref().filter(|n| !n.is_empty())
    }

    /// Returns true once deletion has been requested.
    #[must_use]
    pub const fn is_terminating(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Returns true if the workload opted out of being preempted.
    #[must_use]
    pub fn is_non_preemptible(&self) -> bool {
        self.labels
            .get(LABEL_PREEMPTIBLE)
            .is_some_and(|v| v.eq_ignore_ascii_case("false"))
    }

    /// Returns the elastic quota this workload is charged to.
    #[must_use]
    pub fn quota_name(&self) -> &str {
        self.labels
            .get(LABEL_QUOTA_NAME)
            .map(String::as_str)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_QUOTA_NAME)
    }

    /// Returns a label value, if set.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    /// Returns an annotation value, if set.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
