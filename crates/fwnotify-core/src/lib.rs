//! fwnotify-core - Firewall drop-event notifier primitives
//!
//! This crate holds the dependency-free building blocks of the notifier
//! pipeline: device-path resolution, burst deduplication, the bounded
//! producer/consumer queue, and the rule decision cache. Everything here is
//! pure logic over explicit inputs (paths, tick values, rule records); all
//! platform access lives behind the capability traits in `fwnotify-daemon`.

pub mod dedup;
pub mod queue;
pub mod resolve;
pub mod rules;

pub use dedup::DedupCache;
pub use queue::{BoundedQueue, QueueError};
pub use resolve::{resolve_device_path, DriveTable, MAX_EXT_PATH};
pub use rules::{
    NewRule, PortSpec, Profile, RuleAction, RuleCache, RuleDirection, RuleRecord,
};
