//! Configuration for the gang cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunables for gang admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoschedulingConfig {
    /// Admission timeout used when a gang declares none or an invalid one.
    pub default_timeout: Duration,
    /// Whether gangs declared through member annotations get a backing
    /// group resource created on their behalf.
    pub auto_create_group_resource: bool,
}

impl Default for CoschedulingConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(600),
            auto_create_group_resource: true,
        }
    }
}

impl CoschedulingConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default admission timeout.
    #[must_use]
    pub const fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Enables or disables automatic group-resource creation.
    #[must_use]
    pub const fn with_auto_create_group_resource(mut self, enabled: bool) -> Self {
        self.auto_create_group_resource = enabled;
        self
    }
}
