//! Test helpers for E2E tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::{DateTime, Utc};
use claw_coscheduling::{CoschedulingConfig, FakeClock, GangCache, InMemoryGroupResourceClient};
use claw_workload::keys::{
    ANNOTATION_GANG_GROUPS, ANNOTATION_GANG_MIN_NUM, ANNOTATION_GANG_NAME, LABEL_POD_GROUP,
    LABEL_QUOTA_NAME,
};
use claw_workload::{ResourceList, Workload};
use tracing_subscriber::EnvFilter;

static TRACING: Once = Once::new();

/// Installs a test-writer subscriber once per test binary.
///
/// Set `RUST_LOG=debug` to see cache and preemption decisions.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A gang cache wired to a fake clock and an in-memory group client.
pub struct TestCache {
    pub cache: Arc<GangCache>,
    pub clock: Arc<FakeClock>,
    pub groups: Arc<InMemoryGroupResourceClient>,
}

impl TestCache {
    pub fn new() -> Self {
        Self::with_config(CoschedulingConfig::default())
    }

    pub fn with_config(config: CoschedulingConfig) -> Self {
        init_tracing();
        let clock = Arc::new(FakeClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let groups = Arc::new(InMemoryGroupResourceClient::new());
        let cache = GangCache::new(config)
            .with_clock(clock.clone())
            .with_group_resource_client(groups.clone());
        Self {
            cache: Arc::new(cache),
            clock,
            groups,
        }
    }
}

/// A member declaring its gang through annotations.
pub fn annotated_member(name: &str, gang: &str, min: usize) -> Workload {
    Workload::new("default", name)
        .with_annotation(ANNOTATION_GANG_NAME, gang)
        .with_annotation(ANNOTATION_GANG_MIN_NUM, min.to_string())
}

/// A member joining a gang whose group resource is authoritative.
pub fn labeled_member(name: &str, gang: &str) -> Workload {
    Workload::new("default", name).with_label(LABEL_POD_GROUP, gang)
}

/// JSON value of the groups annotation.
pub fn groups_annotation(gangs: &[&str]) -> String {
    serde_json::to_string(gangs).unwrap_or_default()
}

/// Adds the groups annotation to a member.
pub fn in_groups(member: Workload, gangs: &[&str]) -> Workload {
    member.with_annotation(ANNOTATION_GANG_GROUPS, groups_annotation(gangs))
}

/// A running workload charged to a quota.
pub fn quota_workload(name: &str, quota: &str, priority: i32, gpus: i64) -> Workload {
    Workload::new("ml", name)
        .with_label(LABEL_QUOTA_NAME, quota)
        .with_priority(priority)
        .with_requests(ResourceList::new().with_gpus(gpus))
}

/// Resource list with only GPUs.
pub fn gpus(count: i64) -> ResourceList {
    ResourceList::new().with_gpus(count)
}

/// Names of workloads, in order.
pub fn names(workloads: &[Workload]) -> Vec<&str> {
    workloads.iter().map(|w| w.name.as_str()).collect()
}
