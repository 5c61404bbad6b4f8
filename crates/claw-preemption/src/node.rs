//! Node snapshots used for simulated eviction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use claw_workload::{ResourceList, Workload};

use crate::error::{PreemptionError, Result};

/// A node and the workloads placed on it.
///
/// Victim selection mutates a private clone; the cluster is never touched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeInfo {
    name: String,
    allocatable: ResourceList,
    requested: ResourceList,
    workloads: Vec<Workload>,
}

impl NodeInfo {
    /// Creates an empty node.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the allocatable resources.
    #[must_use]
    pub fn with_allocatable(mut self, allocatable: ResourceList) -> Self {
        self.allocatable = allocatable;
        self
    }

    /// Places a workload on the node.
    #[must_use]
    pub fn with_workload(mut self, workload: Workload) -> Self {
        self.add_workload(workload);
        self
    }

    /// Returns the node name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the allocatable resources.
    #[must_use]
    pub const fn allocatable(&self) -> &ResourceList {
        &self.allocatable
    }

    /// Returns the sum of requests of placed workloads.
    #[must_use]
    pub const fn requested(&self) -> &ResourceList {
        &self.requested
    }

    /// Returns the placed workloads in placement order.
    #[must_use]
    pub fn workloads(&self) -> &[Workload] {
        &self.workloads
    }

    /// Returns true if the workload is placed here.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.workloads.iter().any(|w| w.key() == key)
    }

    /// Places a workload and accounts for its requests.
    pub fn add_workload(&mut self, workload: Workload) {
        self.requested.add_assign(&workload.requests);
        self.workloads.push(workload);
    }

    /// Removes a workload and releases its requests.
    ///
    /// # Errors
    ///
    /// Returns [`PreemptionError::WorkloadNotOnNode`] if it is not placed here.
    pub fn remove_workload(&mut self, workload: &Workload) -> Result<Workload> {
        let key = workload.key();
        let Some(index) = self.workloads.iter().position(|w| w.key() == key) else {
            return Err(PreemptionError::WorkloadNotOnNode {
                workload: key,
                node: self.name.clone(),
            });
        };
        let removed = self.workloads.remove(index);
        self.requested.sub_assign(&removed.requests);
        Ok(removed)
    }
}

/// Point-in-time view of every node, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    nodes: BTreeMap<String, NodeInfo>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a node.
    #[must_use]
    pub fn with_node(mut self, node: NodeInfo) -> Self {
        self.nodes.insert(node.name.clone(), node);
        self
    }

    /// Returns a node by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NodeInfo> {
        self.nodes.get(name)
    }

    /// Iterates nodes in name order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.values()
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if there are no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
