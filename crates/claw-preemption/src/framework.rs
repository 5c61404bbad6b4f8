//! The scheduling framework seen by the preemptor.

use claw_workload::Workload;

use crate::node::{NodeInfo, Snapshot};
use crate::quota::CycleState;
use crate::status::Status;

/// Hooks into the surrounding scheduler.
///
/// Implement this trait to integrate with a scheduler. The preemptor calls
/// the extension hooks after every simulated change so plugins with
/// incremental per-cycle state stay consistent.
pub trait FrameworkHandle: Send + Sync {
    /// Returns the current cluster snapshot.
    fn snapshot(&self) -> &Snapshot;

    /// Notifies pre-filter extensions that `added` was placed on `node`.
    fn run_prefilter_extension_add_pod(
        &self,
        state: &mut CycleState,
        preemptor: &Workload,
        added: &Workload,
        node: &NodeInfo,
    ) -> Status;

    /// Notifies pre-filter extensions that `removed` left `node`.
    fn run_prefilter_extension_remove_pod(
        &self,
        state: &mut CycleState,
        preemptor: &Workload,
        removed: &Workload,
        node: &NodeInfo,
    ) -> Status;

    /// Runs every filter for `preemptor` on `node`, counting workloads
    /// nominated to the node.
    fn run_filter_with_nominated_pods(
        &self,
        state: &CycleState,
        preemptor: &Workload,
        node: &NodeInfo,
    ) -> Status;
}

/// A framework with a single resource-fit filter and no extension state.
#[derive(Debug, Clone, Default)]
pub struct NodeResourcesFit {
    snapshot: Snapshot,
}

impl NodeResourcesFit {
    /// Creates the framework over a snapshot.
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }
}

impl FrameworkHandle for NodeResourcesFit {
    fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn run_prefilter_extension_add_pod(
        &self,
        _state: &mut CycleState,
        _preemptor: &Workload,
        _added: &Workload,
        _node: &NodeInfo,
    ) -> Status {
        Status::success()
    }

    fn run_prefilter_extension_remove_pod(
        &self,
        _state: &mut CycleState,
        _preemptor: &Workload,
        _removed: &Workload,
        _node: &NodeInfo,
    ) -> Status {
        Status::success()
    }

    fn run_filter_with_nominated_pods(
        &self,
        _state: &CycleState,
        preemptor: &Workload,
        node: &NodeInfo,
    ) -> Status {
        let insufficient: Vec<String> = preemptor
            .requests
            .iter()
            .filter(|(name, quantity)| {
                let requested = node.requested().get(name).unwrap_or(0);
                let allocatable = node.allocatable().get(name).unwrap_or(0);
                requested.saturating_add(*quantity) > allocatable
            })
            .map(|(name, _)| format!("Insufficient {name}"))
            .collect();

        let mut reasons = insufficient.into_iter();
        match reasons.next() {
            None => Status::success(),
            Some(first) => reasons.fold(Status::unschedulable(first), |status, reason| {
                status.with_reason(reason)
            }),
        }
    }
}
