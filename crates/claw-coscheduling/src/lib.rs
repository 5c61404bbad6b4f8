//! Gang admission cache for Clawbernetes.
//!
//! `claw-coscheduling` aggregates individually submitted workloads into
//! gangs: units that are admitted all-or-nothing once a quorum of members
//! is ready. Two event streams feed the cache independently:
//!
//! - **Member events**: workloads naming their gang through a label or
//!   annotation, optionally carrying the gang's configuration
//! - **Group-resource events**: an authoritative group definition that
//!   overrides anything declared by members
//!
//! Whichever stream arrives first creates the gang. The first valid
//! declaration configures it; later conflicting member declarations are
//! ignored while membership keeps growing and shrinking.
//!
//! # Gang groups
//!
//! Gangs listing each other in their groups annotation share one
//! [`GangGroupInfo`]. The shared object carries two sticky flags that
//! scheduling passes set without holding the registry lock.
//!
//! # Example
//!
//! ```rust
//! use claw_coscheduling::{GangCache, CoschedulingConfig, GroupResource};
//! use claw_workload::{keys, Workload};
//!
//! let cache = GangCache::new(CoschedulingConfig::default());
//!
//! cache.on_group_resource_add(
//!     &GroupResource::new("default", "trainer")
//!         .with_min_member(2)
//!         .with_schedule_timeout_seconds(30),
//! );
//!
//! for name in ["trainer-0", "trainer-1"] {
//!     let member = Workload::new("default", name)
//!         .with_label(keys::LABEL_POD_GROUP, "trainer");
//!     cache.on_member_add(&member);
//!     cache.on_member_assumed(&member);
//! }
//!
//! let gang = cache.get_gang("default/trainer");
//! assert!(gang.is_some_and(|g| g.is_ready_for_admission()));
//! ```
//!
//! # Architecture
//!
//! ```text
//! member events ──┐                 ┌──────────────────────────┐
//!                 ├──► GangCache ──►│ gang id  ─► Gang         │
//! group events ───┘    (RwLock)     │ group id ─► GangGroupInfo│
//!                                   └──────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]

pub mod cache;
pub mod clock;
pub mod config;
pub mod declaration;
pub mod error;
pub mod gang;
pub mod gang_group;
pub mod group;

pub use cache::GangCache;
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::CoschedulingConfig;
pub use declaration::{
    GangFrom, GangMatchPolicy, GangMode, GangSpec, gang_group_id, gang_id_of, gang_name_of,
};
pub use error::{CoschedulingError, Result};
pub use gang::{ChildPhase, Gang};
pub use gang_group::GangGroupInfo;
pub use group::{GroupResource, GroupResourceClient, InMemoryGroupResourceClient};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::cache::GangCache;
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::config::CoschedulingConfig;
    pub use crate::declaration::{GangFrom, GangMode};
    pub use crate::error::{CoschedulingError, Result};
    pub use crate::gang::{ChildPhase, Gang};
    pub use crate::gang_group::GangGroupInfo;
    pub use crate::group::{GroupResource, GroupResourceClient};
}
