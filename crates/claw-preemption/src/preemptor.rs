//! Quota-aware victim selection.
//!
//! The [`QuotaPreemptor`] is responsible for:
//! - Deciding whether a pending workload may preempt at all
//! - Choosing, per node, the smallest set of same-quota victims that lets
//!   the workload fit while respecting disruption budgets and quota limits
//! - Evaluating every node of a snapshot on isolated copies

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use claw_workload::keys::DEFAULT_QUOTA_NAME;
use claw_workload::Workload;

use crate::config::ElasticQuotaConfig;
use crate::error::Result;
use crate::framework::FrameworkHandle;
use crate::node::NodeInfo;
use crate::pdb::{DisruptionBudget, filter_workloads_with_budget_violation};
use crate::quota::CycleState;
use crate::status::{Status, StatusCode};

/// Whether a pending workload may preempt others.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// Preemption may proceed.
    Eligible,
    /// Preemption must not proceed.
    Ineligible {
        /// Why the workload is not eligible.
        reason: String,
    },
}

impl Eligibility {
    /// Returns true for [`Eligibility::Eligible`].
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible)
    }
}

/// Victims chosen on one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VictimSet {
    /// Workloads to evict, in the order they were given up.
    pub victims: Vec<Workload>,
    /// How many victims violate a disruption budget.
    pub violating_count: usize,
    /// Outcome of the selection.
    pub status: Status,
}

impl VictimSet {
    fn failed(status: Status) -> Self {
        Self {
            victims: Vec::new(),
            violating_count: 0,
            status,
        }
    }

    /// Returns true if the selection succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Victims reported for a node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Victims {
    /// Workloads to evict.
    pub workloads: Vec<Workload>,
    /// How many of them violate a disruption budget.
    pub violating_count: usize,
}

/// A node on which preemption would let the workload fit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Node name.
    pub node_name: String,
    /// Workloads to evict.
    pub victims: Vec<Workload>,
    /// How many victims violate a disruption budget.
    pub violating_count: usize,
}

/// Outcome of evaluating every node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DryRunResult {
    /// Nodes where preemption succeeds, in node-name order.
    pub candidates: Vec<Candidate>,
    /// Status of every node that is not a candidate.
    pub node_statuses: BTreeMap<String, Status>,
}

/// Orders workloads by importance: higher priority first, then the one
/// that started earlier. A workload with no start time sorts last.
#[must_use]
pub fn more_important_first(a: &Workload, b: &Workload) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| match (a.started_at, b.started_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
}

/// Selects preemption victims restricted to the preemptor's quota.
#[derive(Debug)]
pub struct QuotaPreemptor<F: FrameworkHandle> {
    config: ElasticQuotaConfig,
    handle: F,
}

impl<F: FrameworkHandle> QuotaPreemptor<F> {
    /// Creates a preemptor.
    #[must_use]
    pub const fn new(config: ElasticQuotaConfig, handle: F) -> Self {
        Self { config, handle }
    }

    /// Creates a preemptor with default configuration.
    #[must_use]
    pub fn with_defaults(handle: F) -> Self {
        Self::new(ElasticQuotaConfig::default(), handle)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ElasticQuotaConfig {
        &self.config
    }

    /// Returns the framework handle.
    #[must_use]
    pub const fn handle(&self) -> &F {
        &self.handle
    }

    /// Every node in the snapshot is a candidate.
    #[must_use]
    pub const fn offset_and_num_candidates(&self, nodes: usize) -> (usize, usize) {
        (0, nodes)
    }

    /// Decides whether `workload` may preempt others.
    ///
    /// A workload that already nominated a node waits while a lower-priority
    /// workload of its quota is still terminating there, unless filters ruled
    /// that node out for good.
    #[must_use]
    pub fn pod_eligible_to_preempt_others(
        &self,
        workload: &Workload,
        nominated_node_status: &Status,
    ) -> Eligibility {
        if !workload.preemption_policy.allows_preemption() {
            debug!(workload = %workload, "not eligible due to preemption policy Never");
            return Eligibility::Ineligible {
                reason: "not eligible due to preemptionPolicy=Never.".to_string(),
            };
        }

        let Some(nominated) = workload.nominated_node() else {
            return Eligibility::Eligible;
        };
        if nominated_node_status.code() == StatusCode::UnschedulableAndUnresolvable {
            return Eligibility::Eligible;
        }
        let Some(node) = self.handle.snapshot().get(nominated) else {
            return Eligibility::Eligible;
        };

        let quota = workload.quota_name();
        let waiting = node.workloads().iter().any(|other| {
            other.is_terminating()
                && other.quota_name() == quota
                && other.priority < workload.priority
        });
        if waiting {
            debug!(
                workload = %workload,
                node = %nominated,
                "terminating victim still on nominated node"
            );
            return Eligibility::Ineligible {
                reason: "not eligible due to a terminating pod on the nominated node.".to_string(),
            };
        }
        Eligibility::Eligible
    }

    /// Returns true if `preemptor` may evict `victim`.
    #[must_use]
    pub fn can_preempt(&self, preemptor: &Workload, victim: &Workload) -> bool {
        if victim.is_non_preemptible() {
            return false;
        }
        let victim_quota = victim.quota_name();
        if self.config.disable_default_quota_preemption && victim_quota == DEFAULT_QUOTA_NAME {
            return false;
        }
        preemptor.priority > victim.priority && preemptor.quota_name() == victim_quota
    }

    /// Finds the smallest set of workloads on `node` whose eviction lets
    /// `preemptor` fit.
    ///
    /// Every preemptable workload is removed first. If the preemptor then
    /// fits, victims are reprieved one by one, most important first and
    /// budget-violating ones before the rest. A victim stays on the node
    /// only if the preemptor still fits and its quota stays within limit.
    ///
    /// `node` and `state` are simulation copies and are left in the
    /// post-eviction state.
    pub fn select_victims_on_node(
        &self,
        state: &mut CycleState,
        preemptor: &Workload,
        node: &mut NodeInfo,
        budgets: &[DisruptionBudget],
    ) -> VictimSet {
        let preemptable: Vec<Workload> = node
            .workloads()
            .iter()
            .filter(|w| self.can_preempt(preemptor, w))
            .cloned()
            .collect();

        let mut potential_victims = Vec::with_capacity(preemptable.len());
        for victim in preemptable {
            if let Err(e) = self.remove_workload(state, preemptor, &victim, node) {
                return VictimSet::failed(Status::from_error(&e));
            }
            potential_victims.push(victim);
        }

        if potential_victims.is_empty() {
            return VictimSet::failed(Status::new(
                StatusCode::UnschedulableAndUnresolvable,
                format!(
                    "No victims found on node {} for preemptor pod {}",
                    node.name(),
                    preemptor.name
                ),
            ));
        }

        let status = self.handle.run_filter_with_nominated_pods(state, preemptor, node);
        if !status.is_success() {
            debug!(
                workload = %preemptor,
                node = %node.name(),
                status = %status,
                "does not fit even with all victims removed"
            );
            return VictimSet::failed(status);
        }

        potential_victims.sort_by(more_important_first);
        let (violating, non_violating) =
            filter_workloads_with_budget_violation(potential_victims, budgets);

        let mut victims = Vec::new();
        let mut violating_count = 0;
        let ordered = violating
            .into_iter()
            .map(|w| (w, true))
            .chain(non_violating.into_iter().map(|w| (w, false)));
        for (candidate, violates) in ordered {
            match self.reprieve(state, preemptor, &candidate, node) {
                Ok(true) => {}
                Ok(false) => {
                    debug!(
                        victim = %candidate,
                        node = %node.name(),
                        violates,
                        "workload is a preemption victim"
                    );
                    if violates {
                        violating_count += 1;
                    }
                    victims.push(candidate);
                }
                Err(e) => return VictimSet::failed(Status::from_error(&e)),
            }
        }

        VictimSet {
            victims,
            violating_count,
            status: Status::success(),
        }
    }

    /// Evaluates every node of the snapshot on its own copy of the node and
    /// the cycle state.
    #[must_use]
    pub fn dry_run_preemption(
        &self,
        state: &CycleState,
        preemptor: &Workload,
        budgets: &[DisruptionBudget],
    ) -> DryRunResult {
        let snapshot = self.handle.snapshot();
        let (offset, count) = self.offset_and_num_candidates(snapshot.len());
        let mut result = DryRunResult::default();

        for node in snapshot.nodes().skip(offset).take(count) {
            let mut simulated_state = state.clone();
            let mut simulated_node = node.clone();
            let selection = self.select_victims_on_node(
                &mut simulated_state,
                preemptor,
                &mut simulated_node,
                budgets,
            );
            if selection.is_success() {
                result.candidates.push(Candidate {
                    node_name: node.name().to_string(),
                    victims: selection.victims,
                    violating_count: selection.violating_count,
                });
            } else {
                result
                    .node_statuses
                    .insert(node.name().to_string(), selection.status);
            }
        }
        info!(
            workload = %preemptor,
            candidates = result.candidates.len(),
            rejected = result.node_statuses.len(),
            "preemption dry run finished"
        );
        result
    }

    /// Indexes candidates' victims by node name.
    #[must_use]
    pub fn candidates_to_victims_map(&self, candidates: &[Candidate]) -> BTreeMap<String, Victims> {
        candidates
            .iter()
            .map(|c| {
                (
                    c.node_name.clone(),
                    Victims {
                        workloads: c.victims.clone(),
                        violating_count: c.violating_count,
                    },
                )
            })
            .collect()
    }

    /// Puts `candidate` back and keeps it if the preemptor still fits and
    /// its quota stays within limit. Returns whether it was reprieved.
    fn reprieve(
        &self,
        state: &mut CycleState,
        preemptor: &Workload,
        candidate: &Workload,
        node: &mut NodeInfo,
    ) -> Result<bool> {
        self.add_workload(state, preemptor, candidate, node)?;
        let fits = self
            .handle
            .run_filter_with_nominated_pods(state, preemptor, node)
            .is_success();
        let within_quota = state
            .quota()
            .is_none_or(|quota| quota.fits(&preemptor.requests));
        if fits && within_quota {
            return Ok(true);
        }
        self.remove_workload(state, preemptor, candidate, node)?;
        Ok(false)
    }

    fn add_workload(
        &self,
        state: &mut CycleState,
        preemptor: &Workload,
        workload: &Workload,
        node: &mut NodeInfo,
    ) -> Result<()> {
        node.add_workload(workload.clone());
        if let Some(quota) = state.quota_mut() {
            quota.on_add(workload);
        }
        let status = self
            .handle
            .run_prefilter_extension_add_pod(state, preemptor, workload, node);
        status.as_error().map_or(Ok(()), Err)
    }

    fn remove_workload(
        &self,
        state: &mut CycleState,
        preemptor: &Workload,
        workload: &Workload,
        node: &mut NodeInfo,
    ) -> Result<()> {
        node.remove_workload(workload)?;
        if let Some(quota) = state.quota_mut() {
            quota.on_remove(workload);
        }
        let status = self
            .handle
            .run_prefilter_extension_remove_pod(state, preemptor, workload, node);
        status.as_error().map_or(Ok(()), Err)
    }
}
