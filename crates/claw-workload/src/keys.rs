//! Well-known label and annotation keys.
//!
//! Members declare their gang either through the group-resource label, the
//! gang annotations, or the lightweight coscheduling labels. Quota and
//! preemptibility are declared through labels.

/// Label naming the group resource a member belongs to.
pub const LABEL_POD_GROUP: &str = "pod-group.scheduling.sigs.k8s.io";

/// Lightweight coscheduling label carrying the gang name.
pub const LABEL_LIGHTWEIGHT_GROUP_NAME: &str = "pod-group.scheduling.sigs.k8s.io/name";

/// Lightweight coscheduling label carrying the minimum member count.
pub const LABEL_LIGHTWEIGHT_MIN_AVAILABLE: &str = "pod-group.scheduling.sigs.k8s.io/min-available";

/// Annotation carrying the gang name.
pub const ANNOTATION_GANG_NAME: &str = "gang.scheduling.clawbernetes.io/name";

/// Annotation carrying the minimum number of members required for admission.
pub const ANNOTATION_GANG_MIN_NUM: &str = "gang.scheduling.clawbernetes.io/min-available";

/// Annotation carrying the total number of declared members.
pub const ANNOTATION_GANG_TOTAL_NUM: &str = "gang.scheduling.clawbernetes.io/total-number";

/// Annotation carrying the admission timeout, e.g. `30s`.
pub const ANNOTATION_GANG_WAIT_TIME: &str = "gang.scheduling.clawbernetes.io/waiting-time";

/// Annotation carrying the gang mode, `Strict` or `NonStrict`.
pub const ANNOTATION_GANG_MODE: &str = "gang.scheduling.clawbernetes.io/mode";

/// Annotation carrying a JSON list of gang ids admitted together.
pub const ANNOTATION_GANG_GROUPS: &str = "gang.scheduling.clawbernetes.io/groups";

/// Annotation marking a group resource created on behalf of member declarations.
pub const ANNOTATION_GANG_CREATED_BY_MEMBER: &str =
    "gang.scheduling.clawbernetes.io/created-by-member";

/// Label naming the elastic quota a workload is charged to.
pub const LABEL_QUOTA_NAME: &str = "quota.scheduling.clawbernetes.io/name";

/// Label that, set to `"false"`, protects a workload from being chosen as a victim.
pub const LABEL_PREEMPTIBLE: &str = "scheduling.clawbernetes.io/preemptible";

/// Quota assigned to workloads that never declared one.
pub const DEFAULT_QUOTA_NAME: &str = "clawbernetes-default-quota";

/// Builds the `namespace/name` key used to identify namespaced objects.
#[must_use]
pub fn object_key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}
