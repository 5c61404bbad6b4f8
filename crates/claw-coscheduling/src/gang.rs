//! The gang: one all-or-nothing admission unit.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use claw_workload::{Workload, object_key};

use crate::declaration::{GangFrom, GangMatchPolicy, GangMode, GangSpec, gang_group_id};
use crate::gang_group::GangGroupInfo;

/// Partition a gang member currently sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChildPhase {
    /// Known, not yet admitted.
    Pending,
    /// Assumed onto a node, waiting for the rest of the gang.
    WaitingForBind,
    /// Placed on a node.
    Bound,
}

#[derive(Debug, Clone)]
struct GangChild {
    workload: Workload,
    phase: ChildPhase,
}

/// A gang and its membership.
///
/// Every member is stored exactly once together with its phase, so the
/// pending, waiting-for-bind and bound views always partition the children.
#[derive(Debug, Clone)]
pub struct Gang {
    id: String,
    namespace: String,
    name: String,
    create_time: DateTime<Utc>,
    wait_time: Duration,
    mode: GangMode,
    match_policy: GangMatchPolicy,
    min_required_number: usize,
    total_children_num: usize,
    gang_group: Vec<String>,
    gang_group_id: String,
    gang_group_info: Arc<GangGroupInfo>,
    has_gang_init: bool,
    gang_from: GangFrom,
    created_group_resource: bool,
    children: BTreeMap<String, GangChild>,
}

impl Gang {
    /// Creates an uninitialized placeholder gang.
    #[must_use]
    pub fn placeholder(
        namespace: impl Into<String>,
        name: impl Into<String>,
        create_time: DateTime<Utc>,
    ) -> Self {
        let namespace = namespace.into();
        let name = name.into();
        let id = object_key(&namespace, &name);
        Self {
            gang_group: vec![id.clone()],
            gang_group_id: id.clone(),
            id,
            namespace,
            name,
            create_time,
            wait_time: Duration::ZERO,
            mode: GangMode::Strict,
            match_policy: GangMatchPolicy::OnceSatisfied,
            min_required_number: 0,
            total_children_num: 0,
            gang_group_info: Arc::new(GangGroupInfo::detached()),
            has_gang_init: false,
            gang_from: GangFrom::MemberAnnotation,
            created_group_resource: false,
            children: BTreeMap::new(),
        }
    }

    /// Returns the `namespace/name` id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the gang name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns when the gang was first observed.
    #[must_use]
    pub const fn create_time(&self) -> DateTime<Utc> {
        self.create_time
    }

    /// Returns the admission timeout.
    #[must_use]
    pub const fn wait_time(&self) -> Duration {
        self.wait_time
    }

    /// Returns the admission mode.
    #[must_use]
    pub const fn mode(&self) -> GangMode {
        self.mode
    }

    /// Returns the match policy.
    #[must_use]
    pub const fn match_policy(&self) -> GangMatchPolicy {
        self.match_policy
    }

    /// Returns the minimum member count.
    #[must_use]
    pub const fn min_required_number(&self) -> usize {
        self.min_required_number
    }

    /// Returns the total declared member count.
    #[must_use]
    pub const fn total_children_num(&self) -> usize {
        self.total_children_num
    }

    /// Returns the gang ids admitted jointly with this gang.
    #[must_use]
    pub fn gang_group(&self) -> &[String] {
        &self.gang_group
    }

    /// Returns the canonical gang group id.
    #[must_use]
    pub fn gang_group_id(&self) -> &str {
        &self.gang_group_id
    }

    /// Returns the shared group state.
    #[must_use]
    pub fn gang_group_info(&self) -> &Arc<GangGroupInfo> {
        &self.gang_group_info
    }

    /// Returns true once authoritative configuration has been applied.
    #[must_use]
    pub const fn has_gang_init(&self) -> bool {
        self.has_gang_init
    }

    /// Returns which event source configured the gang.
    #[must_use]
    pub const fn gang_from(&self) -> GangFrom {
        self.gang_from
    }

    /// Returns true if a group resource was created on the gang's behalf.
    #[must_use]
    pub const fn created_group_resource(&self) -> bool {
        self.created_group_resource
    }

    /// Returns all member keys, sorted.
    #[must_use]
    pub fn children(&self) -> Vec<&str> {
        self.children.keys().map(String::as_str).collect()
    }

    /// Returns pending member keys, sorted.
    #[must_use]
    pub fn pending_children(&self) -> Vec<&str> {
        self.children_in(ChildPhase::Pending)
    }

    /// Returns waiting-for-bind member keys, sorted.
    #[must_use]
    pub fn waiting_for_bind_children(&self) -> Vec<&str> {
        self.children_in(ChildPhase::WaitingForBind)
    }

    /// Returns bound member keys, sorted.
    #[must_use]
    pub fn bound_children(&self) -> Vec<&str> {
        self.children_in(ChildPhase::Bound)
    }

    fn children_in(&self, phase: ChildPhase) -> Vec<&str> {
        self.children
            .iter()
            .filter(|(_, child)| child.phase == phase)
            .map(|(key, _)| key.as_str())
            .collect()
    }

    /// Returns the phase of a member.
    #[must_use]
    pub fn child_phase(&self, key: &str) -> Option<ChildPhase> {
        self.children.get(key).map(|child| child.phase)
    }

    /// Returns the last observed state of a member.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<&Workload> {
        self.children.get(key).map(|child| &child.workload)
    }

    /// Returns the number of members.
    #[must_use]
    pub fn children_len(&self) -> usize {
        self.children.len()
    }

    /// Members needed before the gang may proceed.
    #[must_use]
    pub const fn required_members(&self) -> usize {
        match self.mode {
            GangMode::Strict => self.total_children_num,
            GangMode::NonStrict => self.min_required_number,
        }
    }

    /// Returns true if enough members are assumed or bound, or the group
    /// has already been satisfied once.
    #[must_use]
    pub fn is_ready_for_admission(&self) -> bool {
        if !self.has_gang_init {
            return false;
        }
        if self.gang_group_info.is_once_resource_satisfied() {
            return true;
        }
        let admitted = self
            .children
            .values()
            .filter(|child| child.phase != ChildPhase::Pending)
            .count();
        admitted >= self.required_members()
    }

    /// Returns true if the gang has waited longer than its timeout.
    #[must_use]
    pub fn is_timed_out(&self, now: DateTime<Utc>) -> bool {
        let waited = now.signed_duration_since(self.create_time);
        waited.to_std().is_ok_and(|waited| waited >= self.wait_time)
    }

    /// Applies authoritative configuration. The caller re-attaches group
    /// state when the group id changes.
    pub(crate) fn apply_spec(&mut self, spec: GangSpec, from: GangFrom) {
        self.gang_group_id = gang_group_id(&spec.gang_group);
        self.gang_group = spec.gang_group;
        self.min_required_number = spec.min_required_number;
        self.total_children_num = spec.total_children_num;
        self.wait_time = spec.wait_time;
        self.mode = spec.mode;
        self.match_policy = spec.match_policy;
        self.has_gang_init = true;
        self.gang_from = from;
    }

    pub(crate) fn attach_group_info(&mut self, info: Arc<GangGroupInfo>) {
        if self.children.values().any(|child| child.phase == ChildPhase::Bound) {
            info.set_once_resource_satisfied();
        }
        self.gang_group_info = info;
    }

    pub(crate) fn set_created_group_resource(&mut self, created: bool) {
        self.created_group_resource = created;
    }

    /// Records the member's latest state and returns its phase.
    ///
    /// A member already placed on a node is bound; otherwise it keeps its
    /// current pre-bind phase, starting as pending.
    pub(crate) fn set_child(&mut self, member: &Workload) -> ChildPhase {
        let key = member.key();
        let phase = if member.assigned_node().is_some() {
            self.gang_group_info.set_once_resource_satisfied();
            ChildPhase::Bound
        } else {
            match self.children.get(&key).map(|child| child.phase) {
                Some(ChildPhase::WaitingForBind) => ChildPhase::WaitingForBind,
                _ => ChildPhase::Pending,
            }
        };
        self.children.insert(
            key,
            GangChild {
                workload: member.clone(),
                phase,
            },
        );
        phase
    }

    pub(crate) fn remove_child(&mut self, key: &str) -> bool {
        self.children.remove(key).is_some()
    }

    /// Moves a member between phases if it currently sits in `from`.
    pub(crate) fn move_child(&mut self, key: &str, from: ChildPhase, to: ChildPhase) -> bool {
        match self.children.get_mut(key) {
            Some(child) if child.phase == from => {
                child.phase = to;
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(min: usize, total: usize, mode: GangMode) -> GangSpec {
        GangSpec {
            min_required_number: min,
            total_children_num: total,
            wait_time: Duration::from_secs(30),
            mode,
            gang_group: vec!["default/ganga".into()],
            match_policy: GangMatchPolicy::OnceSatisfied,
        }
    }

    fn gang() -> Gang {
        Gang::placeholder("default", "ganga", DateTime::<Utc>::UNIX_EPOCH)
    }

    #[test]
    fn placeholder_defaults() {
        let gang = gang();
        assert_eq!(gang.id(), "default/ganga");
        assert!(!gang.has_gang_init());
        assert_eq!(gang.gang_from(), GangFrom::MemberAnnotation);
        assert_eq!(gang.mode(), GangMode::Strict);
        assert_eq!(gang.wait_time(), Duration::ZERO);
        assert_eq!(gang.gang_group(), ["default/ganga".to_string()]);
        assert!(gang.gang_group_info().is_detached());
        assert!(!gang.is_ready_for_admission());
    }

    #[test]
    fn placed_member_is_bound() {
        let mut gang = gang();
        let bound = Workload::new("default", "pod1").with_node("node-a");
        let pending = Workload::new("default", "pod2");

        assert_eq!(gang.set_child(&bound), ChildPhase::Bound);
        assert_eq!(gang.set_child(&pending), ChildPhase::Pending);
        assert_eq!(gang.children(), vec!["default/pod1", "default/pod2"]);
        assert_eq!(gang.bound_children(), vec!["default/pod1"]);
        assert_eq!(gang.pending_children(), vec!["default/pod2"]);
    }

    #[test]
    fn phase_moves() {
        let mut gang = gang();
        gang.set_child(&Workload::new("default", "pod1"));

        assert!(gang.move_child("default/pod1", ChildPhase::Pending, ChildPhase::WaitingForBind));
        assert!(!gang.move_child("default/pod1", ChildPhase::Pending, ChildPhase::WaitingForBind));
        assert_eq!(gang.waiting_for_bind_children(), vec!["default/pod1"]);

        // An update without placement keeps the assumed phase.
        assert_eq!(
            gang.set_child(&Workload::new("default", "pod1")),
            ChildPhase::WaitingForBind
        );
        assert_eq!(
            gang.set_child(&Workload::new("default", "pod1").with_node("n")),
            ChildPhase::Bound
        );
        assert!(gang.remove_child("default/pod1"));
        assert!(!gang.remove_child("default/pod1"));
        assert_eq!(gang.children_len(), 0);
    }

    #[test]
    fn required_members_follows_mode() {
        let mut gang = gang();
        gang.apply_spec(spec(2, 4, GangMode::Strict), GangFrom::MemberAnnotation);
        assert_eq!(gang.required_members(), 4);
        gang.apply_spec(spec(2, 4, GangMode::NonStrict), GangFrom::GroupResource);
        assert_eq!(gang.required_members(), 2);
        assert_eq!(gang.gang_from(), GangFrom::GroupResource);
    }

    #[test]
    fn readiness_counts_assumed_and_bound() {
        let mut gang = gang();
        gang.apply_spec(spec(2, 2, GangMode::NonStrict), GangFrom::MemberAnnotation);
        gang.attach_group_info(Arc::new(GangGroupInfo::new(
            "default/ganga",
            vec!["default/ganga".into()],
        )));

        gang.set_child(&Workload::new("default", "pod1"));
        gang.set_child(&Workload::new("default", "pod2"));
        assert!(!gang.is_ready_for_admission());

        gang.move_child("default/pod1", ChildPhase::Pending, ChildPhase::WaitingForBind);
        assert!(!gang.is_ready_for_admission());
        gang.move_child("default/pod2", ChildPhase::Pending, ChildPhase::WaitingForBind);
        assert!(gang.is_ready_for_admission());
    }

    #[test]
    fn attach_latches_when_members_already_bound() {
        let mut gang = gang();
        gang.set_child(&Workload::new("default", "pod1").with_node("node-a"));
        gang.apply_spec(spec(1, 1, GangMode::Strict), GangFrom::MemberAnnotation);

        let info = Arc::new(GangGroupInfo::new("default/ganga", vec!["default/ganga".into()]));
        gang.attach_group_info(Arc::clone(&info));
        assert!(info.is_once_resource_satisfied());
        assert!(gang.is_ready_for_admission());
    }

    #[test]
    fn timeout() {
        let mut gang = gang();
        gang.apply_spec(spec(1, 1, GangMode::Strict), GangFrom::MemberAnnotation);
        let start = gang.create_time();
        assert!(!gang.is_timed_out(start + chrono::Duration::seconds(29)));
        assert!(gang.is_timed_out(start + chrono::Duration::seconds(30)));
        assert!(!gang.is_timed_out(start - chrono::Duration::seconds(1)));
    }
}
