//! Group resources: the authoritative gang definition object.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use claw_workload::keys::{
    ANNOTATION_GANG_CREATED_BY_MEMBER, ANNOTATION_GANG_GROUPS, ANNOTATION_GANG_MODE,
    ANNOTATION_GANG_TOTAL_NUM,
};
use claw_workload::object_key;

use crate::error::{CoschedulingError, Result};

/// A group-definition resource delivered by group lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GroupResource {
    /// Namespace of the group.
    pub namespace: String,
    /// Name of the group; also the gang name.
    pub name: String,
    /// Minimum number of members required for admission.
    pub min_member: i32,
    /// Admission timeout in seconds.
    pub schedule_timeout_seconds: Option<i32>,
    /// Optional mode, total-number and group-list annotations.
    pub annotations: BTreeMap<String, String>,
}

impl GroupResource {
    /// Creates a group resource.
    #[must_use]
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the minimum member count.
    #[must_use]
    pub const fn with_min_member(mut self, min_member: i32) -> Self {
        self.min_member = min_member;
        self
    }

    /// Sets the admission timeout in seconds.
    #[must_use]
    pub const fn with_schedule_timeout_seconds(mut self, seconds: i32) -> Self {
        self.schedule_timeout_seconds = Some(seconds);
        self
    }

    /// Adds an annotation.
    #[must_use]
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Returns the `namespace/name` key, which is also the gang id.
    #[must_use]
    pub fn key(&self) -> String {
        object_key(&self.namespace, &self.name)
    }

    /// Returns an annotation value, if set.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    /// Returns true if the cache created this resource to mirror member
    /// declarations.
    #[must_use]
    pub fn is_created_by_member(&self) -> bool {
        self.annotation(ANNOTATION_GANG_CREATED_BY_MEMBER) == Some("true")
    }

    /// Builds the resource mirroring a member-declared gang.
    pub(crate) fn mirror_of(gang: &crate::gang::Gang) -> Self {
        let timeout = i32::try_from(gang.wait_time().as_secs()).unwrap_or(i32::MAX);
        let min_member = i32::try_from(gang.min_required_number()).unwrap_or(i32::MAX);
        let mut group = Self::new(gang.namespace(), gang.name())
            .with_min_member(min_member)
            .with_schedule_timeout_seconds(timeout)
            .with_annotation(ANNOTATION_GANG_CREATED_BY_MEMBER, "true")
            .with_annotation(ANNOTATION_GANG_MODE, gang.mode().as_str())
            .with_annotation(
                ANNOTATION_GANG_TOTAL_NUM,
                gang.total_children_num().to_string(),
            );
        if let Ok(groups) = serde_json::to_string(gang.gang_group()) {
            group = group.with_annotation(ANNOTATION_GANG_GROUPS, groups);
        }
        group
    }
}

/// Writes group resources back to the cluster.
///
/// Implement this trait to integrate with the API server. The cache only
/// uses it for group resources it creates on behalf of member declarations.
pub trait GroupResourceClient: Send + Sync {
    /// Creates a group resource.
    ///
    /// # Errors
    ///
    /// Returns error if the resource exists or the backend rejects it.
    fn create(&self, group: &GroupResource) -> Result<()>;

    /// Deletes a group resource.
    ///
    /// # Errors
    ///
    /// Returns error if the resource does not exist or the backend rejects it.
    fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}

/// A group-resource client that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryGroupResourceClient {
    groups: RwLock<BTreeMap<String, GroupResource>>,
}

impl InMemoryGroupResourceClient {
    /// Creates an empty client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a stored group resource.
    #[must_use]
    pub fn get(&self, namespace: &str, name: &str) -> Option<GroupResource> {
        self.groups.read().get(&object_key(namespace, name)).cloned()
    }

    /// Returns the number of stored group resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}

impl GroupResourceClient for InMemoryGroupResourceClient {
    fn create(&self, group: &GroupResource) -> Result<()> {
        let key = group.key();
        let mut groups = self.groups.write();
        if groups.contains_key(&key) {
            return Err(CoschedulingError::GroupResourceExists { key });
        }
        debug!(group = %key, "storing group resource");
        groups.insert(key, group.clone());
        Ok(())
    }

    fn delete(&self, namespace: &str, name: &str) -> Result<()> {
        let key = object_key(namespace, name);
        match self.groups.write().remove(&key) {
            Some(_) => Ok(()),
            None => Err(CoschedulingError::GroupResourceNotFound { key }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_and_marker() {
        let group = GroupResource::new("default", "gangb").with_min_member(4);
        assert_eq!(group.key(), "default/gangb");
        assert!(!group.is_created_by_member());

        let group = group.with_annotation(ANNOTATION_GANG_CREATED_BY_MEMBER, "true");
        assert!(group.is_created_by_member());
    }

    #[test]
    fn in_memory_client_create_and_delete() {
        let client = InMemoryGroupResourceClient::new();
        let group = GroupResource::new("default", "ganga").with_min_member(2);

        assert!(client.create(&group).is_ok());
        assert_eq!(client.len(), 1);
        assert_eq!(client.get("default", "ganga"), Some(group.clone()));

        assert_eq!(
            client.create(&group),
            Err(CoschedulingError::GroupResourceExists {
                key: "default/ganga".into()
            })
        );

        assert!(client.delete("default", "ganga").is_ok());
        assert!(client.is_empty());
        assert!(client.delete("default", "ganga").is_err());
    }
}
