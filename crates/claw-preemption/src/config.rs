//! Configuration for quota-aware preemption.

use serde::{Deserialize, Serialize};

/// Tunables for the elastic-quota preemptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ElasticQuotaConfig {
    /// Never pick victims charged to the default quota. Workloads that
    /// never declared a quota land there, so this keeps them out of reach.
    pub disable_default_quota_preemption: bool,
}

impl ElasticQuotaConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether default-quota workloads are protected.
    #[must_use]
    pub const fn with_disable_default_quota_preemption(mut self, disabled: bool) -> Self {
        self.disable_default_quota_preemption = disabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_default_quota_preemption() {
        assert!(!ElasticQuotaConfig::default().disable_default_quota_preemption);
        assert!(ElasticQuotaConfig::new()
            .with_disable_default_quota_preemption(true)
            .disable_default_quota_preemption);
    }

    #[test]
    fn deserializes_from_json() {
        let config: Result<ElasticQuotaConfig, _> =
            serde_json::from_str(r#"{"disable_default_quota_preemption":true}"#);
        assert_eq!(
            config.ok(),
            Some(ElasticQuotaConfig::new().with_disable_default_quota_preemption(true))
        );
    }
}
