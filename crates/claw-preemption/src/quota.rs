//! Per-cycle quota accounting.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use claw_workload::{ResourceList, Workload};

/// Usage and limit of the preemptor's quota as seen by one scheduling cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QuotaState {
    /// Quota the preemptor is charged to.
    pub quota_name: String,
    /// Current aggregate usage.
    pub used: ResourceList,
    /// Usage the quota may reach.
    pub used_limit: ResourceList,
}

impl QuotaState {
    /// Creates quota state.
    #[must_use]
    pub fn new(
        quota_name: impl Into<String>,
        used: ResourceList,
        used_limit: ResourceList,
    ) -> Self {
        Self {
            quota_name: quota_name.into(),
            used,
            used_limit,
        }
    }

    /// Charges a workload placed back on a simulated node.
    pub fn on_add(&mut self, workload: &Workload) {
        if workload.quota_name() == self.quota_name {
            self.used.add_assign(&workload.requests);
        }
    }

    /// Releases a workload removed from a simulated node.
    pub fn on_remove(&mut self, workload: &Workload) {
        if workload.quota_name() == self.quota_name {
            self.used.sub_assign(&workload.requests);
        }
    }

    /// Returns true if adding `request` keeps the requested resources within
    /// the limit.
    #[must_use]
    pub fn fits(&self, request: &ResourceList) -> bool {
        let projected = self.used.add(request).mask(&request.resource_names());
        let (fits, exceeded) = projected.less_than_or_equal(&self.used_limit);
        if !fits {
            debug!(quota = %self.quota_name, exceeded = ?exceeded, "quota limit exceeded");
        }
        fits
    }
}

/// State local to one scheduling cycle on one node evaluation.
///
/// Cloned per candidate node so evaluations never share it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CycleState {
    quota: Option<QuotaState>,
}

impl CycleState {
    /// Creates state with no quota constraint.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates state constrained by the given quota.
    #[must_use]
    pub fn with_quota(quota: QuotaState) -> Self {
        Self { quota: Some(quota) }
    }

    /// Builds the state for a preemptor from current quota usage. The cycle
    /// is unconstrained if the accessor knows nothing about its quota.
    #[must_use]
    pub fn for_preemptor(accessor: &dyn QuotaUsageAccessor, preemptor: &Workload) -> Self {
        let quota_name = preemptor.quota_name();
        match (accessor.used(quota_name), accessor.used_limit(quota_name)) {
            (Some(used), Some(limit)) => Self::with_quota(QuotaState::new(quota_name, used, limit)),
            _ => Self::new(),
        }
    }

    /// Returns the quota state, if any.
    #[must_use]
    pub const fn quota(&self) -> Option<&QuotaState> {
        self.quota.as_ref()
    }

    /// Returns the quota state mutably, if any.
    pub fn quota_mut(&mut self) -> Option<&mut QuotaState> {
        self.quota.as_mut()
    }
}

/// Source of aggregate quota usage.
pub trait QuotaUsageAccessor: Send + Sync {
    /// Current usage of a quota.
    fn used(&self, quota_name: &str) -> Option<ResourceList>;

    /// Usage limit of a quota.
    fn used_limit(&self, quota_name: &str) -> Option<ResourceList>;
}

/// Quota usage held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticQuotaUsage {
    quotas: BTreeMap<String, (ResourceList, ResourceList)>,
}

impl StaticQuotaUsage {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records usage and limit for a quota.
    #[must_use]
    pub fn with_quota(
        mut self,
        name: impl Into<String>,
        used: ResourceList,
        limit: ResourceList,
    ) -> Self {
        self.quotas.insert(name.into(), (used, limit));
        self
    }
}

impl QuotaUsageAccessor for StaticQuotaUsage {
    fn used(&self, quota_name: &str) -> Option<ResourceList> {
        self.quotas.get(quota_name).map(|(used, _)| used.clone())
    }

    fn used_limit(&self, quota_name: &str) -> Option<ResourceList> {
        self.quotas.get(quota_name).map(|(_, limit)| limit.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claw_workload::keys::LABEL_QUOTA_NAME;

    fn in_quota(name: &str, quota: &str, cpu: i64) -> Workload {
        Workload::new("default", name)
            .with_label(LABEL_QUOTA_NAME, quota)
            .with_requests(ResourceList::new().with_cpu_millis(cpu))
    }

    #[test]
    fn hooks_only_touch_own_quota() {
        let mut state = QuotaState::new(
            "team-a",
            ResourceList::new().with_cpu_millis(3000),
            ResourceList::new(),
        );
        state.on_remove(&in_quota("a", "team-a", 1000));
        state.on_remove(&in_quota("b", "team-b", 1000));
        assert_eq!(state.used.get("cpu"), Some(2000));
        state.on_add(&in_quota("a", "team-a", 1000));
        assert_eq!(state.used.get("cpu"), Some(3000));
    }

    #[test]
    fn fits_masks_to_requested_resources() {
        let state = QuotaState::new(
            "team-a",
            ResourceList::new().with_cpu_millis(2000).with_gpus(10),
            ResourceList::new().with_cpu_millis(4000).with_gpus(4),
        );
        // GPUs are already over the limit but the request does not ask for any.
        assert!(state.fits(&ResourceList::new().with_cpu_millis(2000)));
        assert!(!state.fits(&ResourceList::new().with_cpu_millis(2001)));
        assert!(!state.fits(&ResourceList::new().with_gpus(1)));
    }

    #[test]
    fn cycle_state_from_accessor() {
        let usage = StaticQuotaUsage::new().with_quota(
            "team-a",
            ResourceList::new().with_cpu_millis(1000),
            ResourceList::new().with_cpu_millis(2000),
        );
        let state = CycleState::for_preemptor(&usage, &in_quota("p", "team-a", 500));
        assert_eq!(state.quota().map(|q| q.quota_name.as_str()), Some("team-a"));

        let state = CycleState::for_preemptor(&usage, &in_quota("p", "team-b", 500));
        assert!(state.quota().is_none());
    }
}
