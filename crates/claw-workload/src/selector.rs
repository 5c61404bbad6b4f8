//! Label selectors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkloadError};

/// Operator of a set-based selector requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorOperator {
    /// Label value must be one of the listed values.
    In,
    /// Label must be absent or have a value outside the list.
    NotIn,
    /// Label key must be present.
    Exists,
    /// Label key must be absent.
    DoesNotExist,
}

/// A single set-based selector requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectorRequirement {
    /// Label key the requirement applies to.
    pub key: String,
    /// Comparison operator.
    pub operator: SelectorOperator,
    /// Values for `In` / `NotIn`; must be empty for `Exists` / `DoesNotExist`.
    pub values: Vec<String>,
}

impl SelectorRequirement {
    /// Creates a requirement.
    #[must_use]
    pub fn new(key: impl Into<String>, operator: SelectorOperator, values: Vec<String>) -> Self {
        Self {
            key: key.into(),
            operator,
            values,
        }
    }

    fn validate(&self) -> Result<()> {
        let reason = match self.operator {
            SelectorOperator::In | SelectorOperator::NotIn if self.values.is_empty() => {
                "values must be non-empty for In and NotIn"
            }
            SelectorOperator::Exists | SelectorOperator::DoesNotExist
                if !self.values.is_empty() =>
            {
                "values must be empty for Exists and DoesNotExist"
            }
            _ => return Ok(()),
        };
        Err(WorkloadError::InvalidSelector {
            key: self.key.clone(),
            reason: reason.into(),
        })
    }

    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            SelectorOperator::In => value.is_some_and(|v| self.values.contains(v)),
            SelectorOperator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            SelectorOperator::Exists => value.is_some(),
            SelectorOperator::DoesNotExist => value.is_none(),
        }
    }
}

/// A label query over workloads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LabelSelector {
    /// Exact key/value pairs that must all be present.
    pub match_labels: BTreeMap<String, String>,
    /// Set-based requirements that must all hold.
    pub match_expressions: Vec<SelectorRequirement>,
}

impl LabelSelector {
    /// Creates an empty selector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an exact-match label.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.match_labels.insert(key.into(), value.into());
        self
    }

    /// Adds a set-based requirement.
    #[must_use]
    pub fn with_expression(mut self, requirement: SelectorRequirement) -> Self {
        self.match_expressions.push(requirement);
        self
    }

    /// Returns true if the selector has no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.match_labels.is_empty() && self.match_expressions.is_empty()
    }

    /// Checks that every requirement is well formed.
    pub fn validate(&self) -> Result<()> {
        self.match_expressions
            .iter()
            .try_for_each(SelectorRequirement::validate)
    }

    /// Checks whether the labels satisfy every term.
    ///
    /// An empty selector matches everything here; callers that treat an empty
    /// selector as "match nothing" must check [`LabelSelector::is_empty`].
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
            && self.match_expressions.iter().all(|r| r.matches(labels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn labels(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn match_labels_requires_all_pairs() {
        let selector = LabelSelector::new().with_label("app", "db").with_label("tier", "x");
        assert!(selector.matches(&labels(&[("app", "db"), ("tier", "x"), ("extra", "y")])));
        assert!(!selector.matches(&labels(&[("app", "db")])));
        assert!(!selector.matches(&labels(&[("app", "web"), ("tier", "x")])));
    }

    #[test_case(SelectorOperator::In, &["a", "b"], &[("k", "a")], true ; "in hit")]
    #[test_case(SelectorOperator::In, &["a", "b"], &[("k", "c")], false ; "in miss")]
    #[test_case(SelectorOperator::In, &["a"], &[], false ; "in absent")]
    #[test_case(SelectorOperator::NotIn, &["a"], &[("k", "c")], true ; "notin other value")]
    #[test_case(SelectorOperator::NotIn, &["a"], &[], true ; "notin absent")]
    #[test_case(SelectorOperator::NotIn, &["a"], &[("k", "a")], false ; "notin listed value")]
    #[test_case(SelectorOperator::Exists, &[], &[("k", "")], true ; "exists present")]
    #[test_case(SelectorOperator::Exists, &[], &[], false ; "exists absent")]
    #[test_case(SelectorOperator::DoesNotExist, &[], &[], true ; "doesnotexist absent")]
    #[test_case(SelectorOperator::DoesNotExist, &[], &[("k", "v")], false ; "doesnotexist present")]
    fn expression_matching(
        operator: SelectorOperator,
        values: &[&str],
        pairs: &[(&str, &str)],
        expected: bool,
    ) {
        let selector = LabelSelector::new().with_expression(SelectorRequirement::new(
            "k",
            operator,
            values.iter().map(|v| (*v).to_string()).collect(),
        ));
        assert_eq!(selector.matches(&labels(pairs)), expected);
    }

    #[test]
    fn validate_rejects_malformed_requirements() {
        let bad_in = LabelSelector::new()
            .with_expression(SelectorRequirement::new("k", SelectorOperator::In, vec![]));
        assert!(bad_in.validate().is_err());

        let bad_exists = LabelSelector::new().with_expression(SelectorRequirement::new(
            "k",
            SelectorOperator::Exists,
            vec!["v".into()],
        ));
        assert!(bad_exists.validate().is_err());

        let good = LabelSelector::new().with_expression(SelectorRequirement::new(
            "k",
            SelectorOperator::NotIn,
            vec!["v".into()],
        ));
        assert!(good.validate().is_ok());
    }

    #[test]
    fn empty_selector() {
        let selector = LabelSelector::new();
        assert!(selector.is_empty());
        assert!(selector.matches(&labels(&[("a", "b")])));
    }
}
