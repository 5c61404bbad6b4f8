//! The gang registry and its event handlers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use claw_workload::Workload;

use crate::clock::{Clock, SystemClock};
use crate::config::CoschedulingConfig;
use crate::declaration::{
    GangFrom, GangSpec, declares_via_group_resource, gang_id_of, gang_name_of,
};
use crate::gang::{ChildPhase, Gang};
use crate::gang_group::GangGroupInfo;
use crate::group::{GroupResource, GroupResourceClient};

#[derive(Debug)]
struct GroupEntry {
    info: Arc<GangGroupInfo>,
    references: usize,
}

/// Reference-counted gang group state, keyed by canonical group id.
///
/// An initialized gang holds exactly one reference on the entry for its
/// group id.
#[derive(Debug, Default)]
struct GroupRegistry {
    entries: HashMap<String, GroupEntry>,
}

impl GroupRegistry {
    fn get(&self, group_id: &str) -> Option<Arc<GangGroupInfo>> {
        self.entries.get(group_id).map(|entry| Arc::clone(&entry.info))
    }

    fn entry(&mut self, group_id: &str, members: &[String]) -> &mut GroupEntry {
        self.entries.entry(group_id.to_string()).or_insert_with(|| {
            debug!(group = %group_id, "registering gang group");
            GroupEntry {
                info: Arc::new(GangGroupInfo::new(group_id, members.to_vec())),
                references: 0,
            }
        })
    }

    fn get_or_create(&mut self, group_id: &str, members: &[String]) -> Arc<GangGroupInfo> {
        Arc::clone(&self.entry(group_id, members).info)
    }

    fn acquire(&mut self, group_id: &str, members: &[String]) -> Arc<GangGroupInfo> {
        let entry = self.entry(group_id, members);
        entry.references += 1;
        Arc::clone(&entry.info)
    }

    fn release(&mut self, group_id: &str) {
        let Some(entry) = self.entries.get_mut(group_id) else {
            return;
        };
        entry.references = entry.references.saturating_sub(1);
        if entry.references == 0 {
            self.entries.remove(group_id);
            debug!(group = %group_id, "released last reference to gang group");
        }
    }

    fn remove(&mut self, group_id: &str) -> bool {
        self.entries.remove(group_id).is_some()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Default)]
struct CacheState {
    gangs: HashMap<String, Gang>,
    groups: GroupRegistry,
}

impl CacheState {
    /// Applies authoritative configuration, moving the gang's group
    /// reference if its group id changed.
    fn configure(&mut self, gang_id: &str, spec: GangSpec, from: GangFrom) {
        let Self { gangs, groups } = self;
        let Some(gang) = gangs.get_mut(gang_id) else {
            return;
        };
        let previous = gang
            .has_gang_init()
            .then(|| gang.gang_group_id().to_string());
        gang.apply_spec(spec, from);

        if previous.as_deref() == Some(gang.gang_group_id()) {
            return;
        }
        if let Some(previous) = previous {
            debug!(
                gang = %gang_id,
                from = %previous,
                to = %gang.gang_group_id(),
                "gang group changed"
            );
            groups.release(&previous);
        }
        let info = groups.acquire(gang.gang_group_id(), gang.gang_group());
        gang.attach_group_info(info);
    }

    fn remove_gang(&mut self, gang_id: &str) -> Option<Gang> {
        let gang = self.gangs.remove(gang_id)?;
        if gang.has_gang_init() {
            self.groups.release(gang.gang_group_id());
        }
        info!(gang = %gang_id, "deleted gang");
        Some(gang)
    }
}

/// Registry of gangs and gang groups, fed by member and group-resource
/// events.
///
/// Handlers never fail: malformed declarations degrade to defaults and
/// group-resource client failures are logged.
pub struct GangCache {
    config: CoschedulingConfig,
    clock: Arc<dyn Clock>,
    group_client: Option<Arc<dyn GroupResourceClient>>,
    state: RwLock<CacheState>,
}

impl fmt::Debug for GangCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GangCache")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Default for GangCache {
    fn default() -> Self {
        Self::new(CoschedulingConfig::default())
    }
}

impl GangCache {
    /// Creates an empty cache using the system clock.
    #[must_use]
    pub fn new(config: CoschedulingConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            group_client: None,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Replaces the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the client used to create and delete mirrored group resources.
    #[must_use]
    pub fn with_group_resource_client(mut self, client: Arc<dyn GroupResourceClient>) -> Self {
        self.group_client = Some(client);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &CoschedulingConfig {
        &self.config
    }

    /// Handles a member add event.
    pub fn on_member_add(&self, member: &Workload) {
        let Some(gang_id) = gang_id_of(member) else {
            return;
        };
        let mirror = {
            let mut state = self.state.write();
            self.reconcile_member(&mut state, &gang_id, member)
        };
        if let Some(group) = mirror {
            self.create_group_resource(&gang_id, &group);
        }
    }

    /// Handles a member update event.
    ///
    /// The member's partition is re-derived from its new state. If the
    /// member moved to another gang it leaves the old one first.
    pub fn on_member_update(&self, old: &Workload, new: &Workload) {
        let old_id = gang_id_of(old);
        let new_id = gang_id_of(new);
        if old_id.is_some() && old_id != new_id {
            debug!(member = %new, from = ?old_id, to = ?new_id, "member changed gang");
            self.on_member_delete(old);
        }
        self.on_member_add(new);
    }

    /// Handles a member delete event.
    pub fn on_member_delete(&self, member: &Workload) {
        let Some(gang_id) = gang_id_of(member) else {
            return;
        };
        let orphaned = {
            let mut state = self.state.write();
            let Some(gang) = state.gangs.get_mut(&gang_id) else {
                return;
            };
            if !gang.remove_child(&member.key()) {
                debug!(gang = %gang_id, member = %member, "delete for unknown member");
                return;
            }
            debug!(gang = %gang_id, member = %member, "removed member");
            if gang.children_len() > 0 || gang.gang_from() != GangFrom::MemberAnnotation {
                return;
            }
            state
                .remove_gang(&gang_id)
                .filter(Gang::created_group_resource)
        };
        if let Some(gang) = orphaned {
            self.delete_group_resource(gang.namespace(), gang.name());
        }
    }

    /// Records that a member was assumed onto a node. Returns false if the
    /// member was not pending.
    pub fn on_member_assumed(&self, member: &Workload) -> bool {
        self.move_member(member, ChildPhase::Pending, ChildPhase::WaitingForBind)
    }

    /// Records that an assumed member was released. Returns false if the
    /// member was not waiting for bind.
    pub fn on_member_unreserved(&self, member: &Workload) -> bool {
        self.move_member(member, ChildPhase::WaitingForBind, ChildPhase::Pending)
    }

    fn move_member(&self, member: &Workload, from: ChildPhase, to: ChildPhase) -> bool {
        let Some(gang_id) = gang_id_of(member) else {
            return false;
        };
        let mut state = self.state.write();
        let moved = state
            .gangs
            .get_mut(&gang_id)
            .is_some_and(|gang| gang.move_child(&member.key(), from, to));
        if moved {
            debug!(gang = %gang_id, member = %member, from = ?from, to = ?to, "moved member");
        }
        moved
    }

    /// Handles a group-resource add event.
    pub fn on_group_resource_add(&self, group: &GroupResource) {
        let gang_id = group.key();
        let mut state = self.state.write();
        let now = self.clock.now();
        let gang = state.gangs.entry(gang_id.clone()).or_insert_with(|| {
            info!(gang = %gang_id, "created gang from group resource");
            Gang::placeholder(&group.namespace, &group.name, now)
        });

        if group.is_created_by_member() {
            gang.set_created_group_resource(true);
            if gang.has_gang_init() {
                debug!(gang = %gang_id, "group resource mirrors member declaration");
                return;
            }
            let spec = GangSpec::from_group_resource(group, &self.config);
            state.configure(&gang_id, spec, GangFrom::MemberAnnotation);
            return;
        }

        let spec = GangSpec::from_group_resource(group, &self.config);
        state.configure(&gang_id, spec, GangFrom::GroupResource);
        debug!(gang = %gang_id, "applied group resource");
    }

    /// Handles a group-resource update event by reconfiguring the live gang
    /// in place.
    pub fn on_group_resource_update(&self, old: &GroupResource, new: &GroupResource) {
        if old.key() != new.key() {
            warn!(old = %old.key(), new = %new.key(), "group resource update changed identity");
        }
        self.on_group_resource_add(new);
    }

    /// Handles a group-resource delete event.
    ///
    /// Gangs configured by the resource are removed regardless of their
    /// members. A member-declared gang survives unless it has no members.
    pub fn on_group_resource_delete(&self, group: &GroupResource) {
        let gang_id = group.key();
        let mut state = self.state.write();
        let Some(gang) = state.gangs.get_mut(&gang_id) else {
            return;
        };
        if gang.gang_from() == GangFrom::GroupResource || gang.children_len() == 0 {
            state.remove_gang(&gang_id);
        } else {
            gang.set_created_group_resource(false);
            debug!(gang = %gang_id, "group resource deleted, member-declared gang kept");
        }
    }

    /// Returns a snapshot of a gang.
    #[must_use]
    pub fn get_gang(&self, gang_id: &str) -> Option<Gang> {
        self.state.read().gangs.get(gang_id).cloned()
    }

    /// Returns a snapshot of a gang, registering a placeholder if absent.
    pub fn get_or_create_gang(&self, gang_id: &str) -> Gang {
        if let Some(gang) = self.get_gang(gang_id) {
            return gang;
        }
        let (namespace, name) = gang_id.split_once('/').unwrap_or(("", gang_id));
        let now = self.clock.now();
        self.state
            .write()
            .gangs
            .entry(gang_id.to_string())
            .or_insert_with(|| {
                info!(gang = %gang_id, "created placeholder gang");
                Gang::placeholder(namespace, name, now)
            })
            .clone()
    }

    /// Returns all gang ids, sorted.
    #[must_use]
    pub fn gang_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.read().gangs.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns snapshots of the initialized gangs in a gang group, sorted
    /// by id.
    #[must_use]
    pub fn gangs_in_group(&self, group_id: &str) -> Vec<Gang> {
        let mut gangs: Vec<Gang> = self
            .state
            .read()
            .gangs
            .values()
            .filter(|gang| gang.has_gang_init() && gang.gang_group_id() == group_id)
            .cloned()
            .collect();
        gangs.sort_by(|a, b| a.id().cmp(b.id()));
        gangs
    }

    /// Returns the shared state of a gang group, registering it with the
    /// given members when `create` is set.
    pub fn get_gang_group_info(
        &self,
        group_id: &str,
        members: &[String],
        create: bool,
    ) -> Option<Arc<GangGroupInfo>> {
        if !create {
            return self.state.read().groups.get(group_id);
        }
        Some(self.state.write().groups.get_or_create(group_id, members))
    }

    /// Drops a gang group entry. Gangs keep their handle to it.
    pub fn delete_gang_group_info(&self, group_id: &str) -> bool {
        self.state.write().groups.remove(group_id)
    }

    /// Returns the number of registered gang groups.
    #[must_use]
    pub fn gang_group_count(&self) -> usize {
        self.state.read().groups.len()
    }

    /// Returns the number of gangs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().gangs.len()
    }

    /// Returns true if no gang is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().gangs.is_empty()
    }

    /// Adds or refreshes a member and applies its declaration when the gang
    /// has none yet. Returns the group resource to create, if any.
    fn reconcile_member(
        &self,
        state: &mut CacheState,
        gang_id: &str,
        member: &Workload,
    ) -> Option<GroupResource> {
        let name = gang_name_of(member)?;
        let now = self.clock.now();
        let gang = state.gangs.entry(gang_id.to_string()).or_insert_with(|| {
            info!(gang = %gang_id, member = %member, "created gang from member");
            Gang::placeholder(&member.namespace, name, now)
        });
        let phase = gang.set_child(member);
        debug!(gang = %gang_id, member = %member, phase = ?phase, "recorded member");

        if declares_via_group_resource(member) {
            return None;
        }
        if gang.has_gang_init() {
            if GangSpec::from_member(member, gang_id, &self.config).is_some() {
                debug!(
                    gang = %gang_id,
                    member = %member,
                    "gang already configured, ignoring member declaration"
                );
            }
            return None;
        }
        let spec = GangSpec::from_member(member, gang_id, &self.config)?;
        state.configure(gang_id, spec, GangFrom::MemberAnnotation);
        info!(gang = %gang_id, member = %member, "configured gang from member declaration");

        if !self.config.auto_create_group_resource || self.group_client.is_none() {
            return None;
        }
        let gang = state.gangs.get_mut(gang_id)?;
        if gang.created_group_resource() {
            return None;
        }
        gang.set_created_group_resource(true);
        Some(GroupResource::mirror_of(gang))
    }

    fn create_group_resource(&self, gang_id: &str, group: &GroupResource) {
        let Some(client) = &self.group_client else {
            return;
        };
        match client.create(group) {
            Ok(()) => {
                // The gang may have been deleted while the create was in flight.
                let owned = self
                    .state
                    .read()
                    .gangs
                    .get(gang_id)
                    .is_some_and(Gang::created_group_resource);
                if owned {
                    info!(gang = %gang_id, "created group resource for member-declared gang");
                } else {
                    info!(gang = %gang_id, "gang left while creating its group resource");
                    self.delete_group_resource(&group.namespace, &group.name);
                }
            }
            Err(e) => {
                warn!(gang = %gang_id, error = %e, "failed to create group resource");
                if let Some(gang) = self.state.write().gangs.get_mut(gang_id) {
                    gang.set_created_group_resource(false);
                }
            }
        }
    }

    fn delete_group_resource(&self, namespace: &str, name: &str) {
        let Some(client) = &self.group_client else {
            return;
        };
        match client.delete(namespace, name) {
            Ok(()) => info!(namespace, name, "deleted group resource of removed gang"),
            Err(e) => warn!(namespace, name, error = %e, "failed to delete group resource"),
        }
    }
}
