//! Firewall rule model and the rule decision cache.
//!
//! The rule store (the host firewall's persisted rule set) is authoritative
//! but slow to enumerate, so decisions about "does this executable already
//! have a rule?" go through [`RuleCache`]: a fixed-bucket hash table of known
//! rule paths, rebuilt from a full store enumeration once the cache goes
//! stale. Only rules passing [`RuleRecord::is_valid_for_cache`] seed the
//! cache; their application paths are lower-cased on the way in.
//!
//! The cache is append-only: inserts skip exact duplicates and rebuilds never
//! clear prior generations. A rule deleted from the store therefore stays
//! suppressed until the process restarts, which is the accepted trade for
//! never re-prompting on paths the user already decided.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Default bucket count for the rule cache hash table.
pub const DEFAULT_BUCKETS: usize = 257;

/// Traffic direction of a firewall rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleDirection {
    Inbound,
    Outbound,
}

/// Action a firewall rule applies to matching traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleAction {
    Allow,
    Block,
}

/// Local-port scope of a rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortSpec {
    /// No port restriction (`*`).
    Any,
    /// A specific port list such as `"80,443"`.
    Ports(String),
}

/// Built-in network profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Profile {
    Public,
    Private,
    Domain,
}

impl Profile {
    /// All built-in profiles, in the order policy operations walk them.
    pub const BUILTIN: [Profile; 3] = [Profile::Public, Profile::Private, Profile::Domain];
}

/// A rule record as read back from the rule store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub direction: RuleDirection,
    pub enabled: bool,
    pub local_ports: PortSpec,
    pub action: RuleAction,
    /// Absolute path of the executable the rule applies to.
    pub application_path: String,
}

impl RuleRecord {
    /// Whether this rule counts as an existing decision for its executable.
    ///
    /// Valid rules are outbound, enabled, and either block rules or allow
    /// rules without a port restriction. A port-restricted allow rule still
    /// leaves other traffic from the executable blocked, so it must not
    /// suppress the prompt.
    #[must_use]
    pub fn is_valid_for_cache(&self) -> bool {
        if self.direction != RuleDirection::Outbound || !self.enabled {
            return false;
        }

        match self.action {
            RuleAction::Block => true,
            RuleAction::Allow => self.local_ports == PortSpec::Any,
        }
    }
}

/// Payload for creating a new rule in the store.
///
/// Rules the notifier persists are always outbound, enabled, scoped to all
/// profiles, and unrestricted by protocol or port; only the action differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRule {
    /// Display name; the notifier names rules after the executable path.
    pub name: String,
    pub application_path: String,
    pub action: RuleAction,
}

impl NewRule {
    /// Builds the rule the notifier persists for `path`.
    #[must_use]
    pub fn for_application(path: &str, action: RuleAction) -> Self {
        Self {
            name: path.to_string(),
            application_path: path.to_string(),
            action,
        }
    }
}

/// Hash-bucketed cache of executable paths that already have a rule.
///
/// Bucket count is fixed at construction; each bucket is an append-only
/// chain of owned paths. Lookup and insert hash the path case-sensitively
/// (FNV-1a, 64-bit); rebuild normalizes store paths to lower case before
/// inserting, so lookups are expected to use lower-cased resolved paths.
#[derive(Debug)]
pub struct RuleCache {
    buckets: Vec<Vec<String>>,
    last_rebuild_ms: Option<u64>,
    rebuild_count: u64,
}

impl RuleCache {
    /// Creates a cache with the given bucket count (clamped to at least 1).
    #[must_use]
    pub fn new(buckets: usize) -> Self {
        Self {
            buckets: vec![Vec::new(); buckets.max(1)],
            last_rebuild_ms: None,
            rebuild_count: 0,
        }
    }

    /// Creates a cache with [`DEFAULT_BUCKETS`].
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_BUCKETS)
    }

    /// Whether the last rebuild is older than `max_age_ms` at tick `now_ms`.
    ///
    /// A cache that has never been rebuilt is always stale, so the first
    /// lookup populates it regardless of how recently the process started.
    #[must_use]
    pub fn is_stale(&self, now_ms: u64, max_age_ms: u64) -> bool {
        match self.last_rebuild_ms {
            None => true,
            Some(rebuilt_ms) => now_ms.saturating_sub(rebuilt_ms) > max_age_ms,
        }
    }

    /// Records a completed rebuild at tick `now_ms`.
    pub fn mark_rebuilt(&mut self, now_ms: u64) {
        self.last_rebuild_ms = Some(now_ms);
    }

    /// Number of rebuilds absorbed so far.
    #[must_use]
    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count
    }

    /// Exact-match lookup.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        let bucket = &self.buckets[self.bucket_index(path)];
        bucket.iter().any(|cached| cached == path)
    }

    /// Appends `path` to its bucket chain unless an exact duplicate exists.
    pub fn insert(&mut self, path: &str) {
        let ix = self.bucket_index(path);
        let bucket = &mut self.buckets[ix];

        if bucket.iter().any(|cached| cached == path) {
            return;
        }

        trace!(path, bucket = ix, "cached rule path");
        bucket.push(path.to_string());
    }

    /// Absorbs one full store enumeration.
    ///
    /// Filters each record through [`RuleRecord::is_valid_for_cache`],
    /// lower-cases the application path, and inserts it. Existing entries are
    /// never removed, so the cache accumulates across generations.
    pub fn absorb<I>(&mut self, rules: I)
    where
        I: IntoIterator<Item = RuleRecord>,
    {
        let mut inserted = 0usize;
        for rule in rules {
            if !rule.is_valid_for_cache() {
                continue;
            }
            self.insert(&rule.application_path.to_lowercase());
            inserted += 1;
        }

        self.rebuild_count += 1;
        debug!(
            inserted,
            generation = self.rebuild_count,
            "rule cache rebuilt from store enumeration"
        );
    }

    fn bucket_index(&self, path: &str) -> usize {
        (fnv1a_64(path) % self.buckets.len() as u64) as usize
    }
}

/// FNV-1a 64-bit hash over the path bytes. Case-sensitive by design; rebuild
/// normalizes case before insert.
fn fnv1a_64(s: &str) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for byte in s.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}
