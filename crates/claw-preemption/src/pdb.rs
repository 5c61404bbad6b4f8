//! Disruption budgets and the budget-violation partition.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use claw_workload::{LabelSelector, Workload};

/// Limits how many matching workloads may be disrupted at once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DisruptionBudget {
    /// Namespace the budget applies to.
    pub namespace: String,
    /// Budget name.
    pub name: String,
    /// Workloads covered by the budget. A missing or empty selector matches
    /// nothing.
    pub selector: Option<LabelSelector>,
    /// Disruptions still allowed.
    pub disruptions_allowed: i32,
    /// Names of workloads whose disruption has already been recorded.
    pub disrupted_workloads: BTreeSet<String>,
}

impl DisruptionBudget {
    /// Creates a budget.
    #[must_use]
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        selector: LabelSelector,
        disruptions_allowed: i32,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            selector: Some(selector),
            disruptions_allowed,
            disrupted_workloads: BTreeSet::new(),
        }
    }

    /// Marks a workload name as already disrupted.
    #[must_use]
    pub fn with_disrupted(mut self, name: impl Into<String>) -> Self {
        self.disrupted_workloads.insert(name.into());
        self
    }

    fn covers(&self, workload: &Workload) -> bool {
        if self.namespace != workload.namespace {
            return false;
        }
        let Some(selector) = &self.selector else {
            return false;
        };
        if let Err(e) = selector.validate() {
            debug!(budget = %self.name, error = %e, "skipping budget with invalid selector");
            return false;
        }
        !selector.is_empty() && selector.matches(&workload.labels)
    }
}

/// Splits workloads into those whose eviction would violate a budget and
/// those whose eviction would not.
///
/// Each matching budget is charged once per workload, in input order, so
/// earlier workloads consume the allowance first. Both partitions keep the
/// relative input order.
#[must_use]
pub fn filter_workloads_with_budget_violation(
    workloads: Vec<Workload>,
    budgets: &[DisruptionBudget],
) -> (Vec<Workload>, Vec<Workload>) {
    let mut allowed: Vec<i32> = budgets.iter().map(|b| b.disruptions_allowed).collect();
    let mut violating = Vec::new();
    let mut non_violating = Vec::new();

    for workload in workloads {
        let mut violates = false;
        // A workload with no labels matches no budget.
        if !workload.labels.is_empty() {
            for (budget, remaining) in budgets.iter().zip(allowed.iter_mut()) {
                if !budget.covers(&workload)
                    || budget.disrupted_workloads.contains(&workload.name)
                {
                    continue;
                }
                *remaining -= 1;
                if *remaining < 0 {
                    violates = true;
                }
            }
        }
        if violates {
            violating.push(workload);
        } else {
            non_violating.push(workload);
        }
    }
    (violating, non_violating)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claw_workload::{SelectorOperator, SelectorRequirement};
    use proptest::prelude::*;

    fn labeled(name: &str, app: &str) -> Workload {
        Workload::new("default", name).with_label("app", app)
    }

    fn budget(app: &str, allowed: i32) -> DisruptionBudget {
        DisruptionBudget::new(
            "default",
            format!("{app}-pdb"),
            LabelSelector::new().with_label("app", app),
            allowed,
        )
    }

    fn names(workloads: &[Workload]) -> Vec<&str> {
        workloads.iter().map(|w| w.name.as_str()).collect()
    }

    #[test]
    fn allowance_consumed_in_order() {
        let input = vec![labeled("a", "web"), labeled("b", "web"), labeled("c", "web")];
        let (violating, ok) = filter_workloads_with_budget_violation(input, &[budget("web", 1)]);
        assert_eq!(names(&ok), vec!["a"]);
        assert_eq!(names(&violating), vec!["b", "c"]);
    }

    #[test]
    fn unlabeled_and_foreign_namespace_never_violate() {
        let input = vec![
            Workload::new("default", "bare"),
            Workload::new("other", "elsewhere").with_label("app", "web"),
        ];
        let (violating, ok) = filter_workloads_with_budget_violation(input, &[budget("web", 0)]);
        assert!(violating.is_empty());
        assert_eq!(names(&ok), vec!["bare", "elsewhere"]);
    }

    #[test]
    fn already_disrupted_is_not_charged() {
        let pdb = budget("web", 0).with_disrupted("a");
        let (violating, ok) = filter_workloads_with_budget_violation(
            vec![labeled("a", "web"), labeled("b", "web")],
            &[pdb],
        );
        assert_eq!(names(&ok), vec!["a"]);
        assert_eq!(names(&violating), vec!["b"]);
    }

    #[test]
    fn empty_missing_or_invalid_selector_matches_nothing() {
        let mut missing = budget("web", 0);
        missing.selector = None;
        let empty = DisruptionBudget::new("default", "empty", LabelSelector::new(), 0);
        let invalid = DisruptionBudget::new(
            "default",
            "invalid",
            LabelSelector::new().with_expression(SelectorRequirement::new(
                "app",
                SelectorOperator::In,
                vec![],
            )),
            0,
        );
        let (violating, _) = filter_workloads_with_budget_violation(
            vec![labeled("a", "web")],
            &[missing, empty, invalid],
        );
        assert!(violating.is_empty());
    }

    #[test]
    fn any_exhausted_budget_violates() {
        let input = vec![labeled("a", "web")];
        let generous = DisruptionBudget::new(
            "default",
            "all",
            LabelSelector::new().with_expression(SelectorRequirement::new(
                "app",
                SelectorOperator::Exists,
                vec![],
            )),
            5,
        );
        let (violating, _) =
            filter_workloads_with_budget_violation(input, &[generous, budget("web", 0)]);
        assert_eq!(names(&violating), vec!["a"]);
    }

    proptest! {
        #[test]
        fn partition_preserves_relative_order(
            apps in prop::collection::vec(prop_oneof![Just("web"), Just("db"), Just("")], 0..30),
            allowed in 0..5i32,
        ) {
            let input: Vec<Workload> = apps
                .iter()
                .enumerate()
                .map(|(i, app)| {
                    let w = Workload::new("default", format!("w{i:02}"));
                    if app.is_empty() { w } else { w.with_label("app", *app) }
                })
                .collect();
            let (violating, ok) = filter_workloads_with_budget_violation(
                input.clone(),
                &[budget("web", allowed), budget("db", allowed)],
            );

            prop_assert_eq!(violating.len() + ok.len(), input.len());
            let position = |w: &Workload| input.iter().position(|x| x.name == w.name);
            for part in [&violating, &ok] {
                let positions: Vec<Option<usize>> = part.iter().map(position).collect();
                prop_assert!(positions.windows(2).all(|p| p[0] < p[1]));
            }
        }
    }
}
