//! Firewall policy manager.
//!
//! Owns the rule store session and the in-memory decision cache. The manager
//! is only ever driven by the single consumer thread, so it takes `&mut self`
//! for cache-mutating operations and needs no interior locking.
//!
//! A manager whose store session failed to open is *uninitialized*: every
//! operation degrades to an inert answer (`has_rule` false, `add_rule`
//! false, `is_filtering` false) instead of failing, so the worker loop keeps
//! draining the queue and the process stays up.

use std::sync::Arc;

use fwnotify_core::rules::{NewRule, Profile, RuleAction, RuleCache};
use tracing::{debug, info, warn};

use crate::config::NotifierConfig;
use crate::store::{RuleStore, StoreError};
use crate::ticks::TickSource;

/// Rule store session plus the decision cache in front of it.
pub struct PolicyManager<S: RuleStore> {
    store: Option<S>,
    cache: RuleCache,
    ticks: Arc<dyn TickSource>,
    max_age_ms: u64,
    refresh_rebuild_timestamp: bool,
}

impl<S: RuleStore> PolicyManager<S> {
    /// Opens the store session and applies startup enforcement.
    ///
    /// If the session cannot be opened the manager starts uninitialized
    /// rather than failing; the notifier then observes events without being
    /// able to answer or persist decisions. With `enforce_on_startup` set,
    /// a successful open force-enables the firewall and the outbound-block
    /// default on every built-in profile; enforcement failures are logged
    /// and do not poison the session.
    pub fn connect<F>(open: F, config: &NotifierConfig, ticks: Arc<dyn TickSource>) -> Self
    where
        F: FnOnce() -> Result<S, StoreError>,
    {
        let store = match open() {
            Ok(store) => {
                info!("rule store session opened");
                Some(store)
            }
            Err(err) => {
                warn!(error = %err, "policy manager starting uninitialized");
                None
            }
        };

        let manager = Self {
            store,
            cache: RuleCache::new(config.rule_cache_buckets),
            ticks,
            max_age_ms: u64::try_from(config.rule_cache_max_age.as_millis()).unwrap_or(u64::MAX),
            refresh_rebuild_timestamp: config.refresh_rebuild_timestamp,
        };

        if config.enforce_on_startup {
            manager.enforce_startup_state();
        }
        manager
    }

    fn enforce_startup_state(&self) {
        let Some(store) = self.store.as_ref() else {
            return;
        };

        for profile in Profile::BUILTIN {
            if let Err(err) = store.set_firewall_enabled(profile, true) {
                warn!(?profile, error = %err, "failed to enable firewall");
            }
        }
        self.set_filtering(true);
    }

    /// Whether the manager has a usable store session.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.store.is_some()
    }

    /// Whether `path` already has a rule, consulting the cache first.
    ///
    /// The lookup is case-insensitive: the path is lower-cased before the
    /// cache probe, matching the normalization rebuilds apply. A stale cache
    /// triggers a full store enumeration first; if enumeration fails the
    /// existing cache contents still answer, erring toward suppressing a
    /// prompt rather than repeating one.
    pub fn has_rule(&mut self, path: &str) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let now_ms = self.ticks.now_ms();
        if self.cache.is_stale(now_ms, self.max_age_ms) {
            match store.enumerate_rules() {
                Ok(rules) => {
                    self.cache.absorb(rules);
                    if self.refresh_rebuild_timestamp {
                        self.cache.mark_rebuilt(now_ms);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "rule enumeration failed; answering from stale cache");
                }
            }
        }

        self.cache.contains(&path.to_lowercase())
    }

    /// Persists a rule for `path` with the given action.
    ///
    /// The cache is updated either way, so a subsequent [`Self::has_rule`]
    /// answers true without waiting for a rebuild. On persistence failure
    /// that cache entry is all that remains: the user is not prompted again
    /// for a decision they already made, but the rule is not durable.
    /// Returns whether persistence succeeded.
    pub fn add_rule(&mut self, path: &str, action: RuleAction) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let persisted = match store.create_rule(&NewRule::for_application(path, action)) {
            Ok(()) => {
                debug!(path, ?action, "persisted firewall rule");
                true
            }
            Err(err) => {
                warn!(path, ?action, error = %err, "rule persistence failed; caching decision only");
                false
            }
        };

        self.cache.insert(&path.to_lowercase());
        persisted
    }

    /// Whether outbound traffic is blocked by default on every active
    /// profile. Any store error reports `false`.
    #[must_use]
    pub fn is_filtering(&self) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let profiles = match store.active_profiles() {
            Ok(profiles) => profiles,
            Err(err) => {
                warn!(error = %err, "failed to read active profiles");
                return false;
            }
        };

        for profile in profiles {
            match store.default_outbound_action(profile) {
                Ok(RuleAction::Block) => {}
                Ok(RuleAction::Allow) => return false,
                Err(err) => {
                    warn!(?profile, error = %err, "failed to read outbound default");
                    return false;
                }
            }
        }
        true
    }

    /// Sets the default outbound action on every built-in profile: block
    /// when `enabled`, allow otherwise. Attempts every profile even after a
    /// failure; returns whether all succeeded.
    pub fn set_filtering(&self, enabled: bool) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let action = if enabled {
            RuleAction::Block
        } else {
            RuleAction::Allow
        };

        let mut ok = true;
        for profile in Profile::BUILTIN {
            if let Err(err) = store.set_default_outbound_action(profile, action) {
                warn!(?profile, ?action, error = %err, "failed to set outbound default");
                ok = false;
            }
        }
        ok
    }
}
