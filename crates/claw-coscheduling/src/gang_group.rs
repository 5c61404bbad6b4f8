//! State shared by every gang of one gang group.

use std::sync::atomic::{AtomicBool, Ordering};

/// Group-wide admission state, shared by reference among gangs.
///
/// The two flags are monotonic latches. They are set by scheduling passes
/// that do not hold the registry lock.
#[derive(Debug, Default)]
pub struct GangGroupInfo {
    gang_group_id: String,
    gang_group: Vec<String>,
    once_resource_satisfied: AtomicBool,
    initialized: AtomicBool,
}

impl GangGroupInfo {
    /// Creates group state for `gang_group` under the given canonical id.
    #[must_use]
    pub fn new(gang_group_id: impl Into<String>, gang_group: Vec<String>) -> Self {
        Self {
            gang_group_id: gang_group_id.into(),
            gang_group,
            once_resource_satisfied: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
        }
    }

    /// Group state held by a placeholder gang; never registered.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Returns the canonical group id.
    #[must_use]
    pub fn gang_group_id(&self) -> &str {
        &self.gang_group_id
    }

    /// Returns the member gang ids.
    #[must_use]
    pub fn gang_group(&self) -> &[String] {
        &self.gang_group
    }

    /// Returns true for placeholder state.
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.gang_group_id.is_empty()
    }

    /// Returns true once any gang of the group has been resource-satisfied.
    #[must_use]
    pub fn is_once_resource_satisfied(&self) -> bool {
        self.once_resource_satisfied.load(Ordering::Acquire)
    }

    /// Latches the resource-satisfied flag.
    pub fn set_once_resource_satisfied(&self) {
        self.once_resource_satisfied.store(true, Ordering::Release);
    }

    /// Returns true once a full admission pass has completed for the group.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Latches the initialized flag.
    pub fn set_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }
}
