//! Named resource quantities.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WorkloadError};

/// CPU in millicores.
pub const RESOURCE_CPU: &str = "cpu";
/// Memory in bytes.
pub const RESOURCE_MEMORY: &str = "memory";
/// GPU device count.
pub const RESOURCE_GPU: &str = "nvidia.com/gpu";

/// A set of named resource quantities.
///
/// Quantities are plain integers in the resource's base unit (millicores for
/// CPU, bytes for memory, devices for GPUs). Arithmetic saturates instead of
/// wrapping; intermediate values may go negative, matching how quota usage is
/// tracked while victims are removed from a simulated node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceList(BTreeMap<String, i64>);

impl ResourceList {
    /// Creates an empty resource list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a quantity, replacing any previous value.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, quantity: i64) -> Self {
        self.0.insert(name.into(), quantity);
        self
    }

    /// Sets the CPU quantity in millicores.
    #[must_use]
    pub fn with_cpu_millis(self, millicores: i64) -> Self {
        self.with(RESOURCE_CPU, millicores)
    }

    /// Sets the memory quantity in bytes.
    #[must_use]
    pub fn with_memory(self, bytes: i64) -> Self {
        self.with(RESOURCE_MEMORY, bytes)
    }

    /// Sets the GPU count.
    #[must_use]
    pub fn with_gpus(self, count: i64) -> Self {
        self.with(RESOURCE_GPU, count)
    }

    /// Returns the quantity of a resource, if present.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<i64> {
        self.0.get(name).copied()
    }

    /// Iterates over `(name, quantity)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Returns the names of all resources in this list.
    #[must_use]
    pub fn resource_names(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if every quantity is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.values().all(|v| *v == 0)
    }

    /// Returns the element-wise sum of both lists.
    #[must_use]
    pub fn add(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.add_assign(other);
        result
    }

    /// Adds `other` into this list in place.
    pub fn add_assign(&mut self, other: &Self) {
        for (name, value) in &other.0 {
            let entry = self.0.entry(name.clone()).or_insert(0);
            *entry = entry.saturating_add(*value);
        }
    }

    /// Returns `self - other`, element-wise.
    #[must_use]
    pub fn subtract(&self, other: &Self) -> Self {
        let mut result = self.clone();
        result.sub_assign(other);
        result
    }

    /// Subtracts `other` from this list in place.
    pub fn sub_assign(&mut self, other: &Self) {
        for (name, value) in &other.0 {
            let entry = self.0.entry(name.clone()).or_insert(0);
            *entry = entry.saturating_sub(*value);
        }
    }

    /// Keeps only the named resources.
    #[must_use]
    pub fn mask(&self, names: &[String]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| names.contains(*k))
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        )
    }

    /// Compares against a limit.
    ///
    /// Only resources present in both lists are compared; a resource the
    /// limit does not mention is unconstrained. Returns whether every compared
    /// quantity is within the limit, plus the names that exceed it.
    #[must_use]
    pub fn less_than_or_equal(&self, limit: &Self) -> (bool, Vec<String>) {
        let exceeded: Vec<String> = limit
            .0
            .iter()
            .filter(|(name, max)| self.0.get(*name).is_some_and(|used| used > *max))
            .map(|(name, _)| name.clone())
            .collect();
        (exceeded.is_empty(), exceeded)
    }

    /// Rejects negative quantities.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in &self.0 {
            if *value < 0 {
                return Err(WorkloadError::InvalidQuantity {
                    resource: name.clone(),
                    reason: format!("quantity {value} is negative"),
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for ResourceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{k}={v}")).collect();
        write!(f, "[{}]", parts.join(","))
    }
}

impl<K: Into<String>> FromIterator<(K, i64)> for ResourceList {
    fn from_iter<I: IntoIterator<Item = (K, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
