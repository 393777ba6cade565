//! Notifier configuration.
//!
//! All knobs have defaults matching the sizes the pipeline was tuned for:
//! a small dedup cache (bursts of one executable), a queue deep enough to
//! absorb event storms while the user reads a prompt, and a rule cache
//! rebuilt from the store at most every few minutes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A field holds a value outside its valid range.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Tunables for the intake pipeline and the rule decision cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotifierConfig {
    /// Slot count of the drop-event dedup cache.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Age after which a deduplicated path may propagate again.
    #[serde(default = "default_dedup_window")]
    #[serde(with = "humantime_serde")]
    pub dedup_window: Duration,

    /// Capacity of the bounded event queue between the event-source
    /// callbacks and the consumer thread.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Bucket count of the rule decision cache hash table.
    #[serde(default = "default_rule_cache_buckets")]
    pub rule_cache_buckets: usize,

    /// Age after which a rule lookup triggers a full store enumeration.
    #[serde(default = "default_rule_cache_max_age")]
    #[serde(with = "humantime_serde")]
    pub rule_cache_max_age: Duration,

    /// Whether a successful rebuild advances the staleness timestamp.
    ///
    /// Disabling this reproduces the legacy cadence where the timestamp
    /// never moved and every staleness check after the first re-enumerated
    /// the whole store.
    #[serde(default = "default_true")]
    pub refresh_rebuild_timestamp: bool,

    /// Whether connecting the policy manager force-enables the firewall
    /// and outbound-block defaults for every built-in profile.
    #[serde(default = "default_true")]
    pub enforce_on_startup: bool,
}

const fn default_dedup_capacity() -> usize {
    32
}

const fn default_dedup_window() -> Duration {
    Duration::from_secs(60)
}

const fn default_queue_capacity() -> usize {
    1024
}

const fn default_rule_cache_buckets() -> usize {
    257
}

const fn default_rule_cache_max_age() -> Duration {
    Duration::from_secs(300)
}

const fn default_true() -> bool {
    true
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: default_dedup_capacity(),
            dedup_window: default_dedup_window(),
            queue_capacity: default_queue_capacity(),
            rule_cache_buckets: default_rule_cache_buckets(),
            rule_cache_max_age: default_rule_cache_max_age(),
            refresh_rebuild_timestamp: default_true(),
            enforce_on_startup: default_true(),
        }
    }
}

impl NotifierConfig {
    /// Overrides the dedup cache capacity.
    #[must_use]
    pub const fn with_dedup_capacity(mut self, capacity: usize) -> Self {
        self.dedup_capacity = capacity;
        self
    }

    /// Overrides the dedup staleness window.
    #[must_use]
    pub const fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }

    /// Overrides the event queue capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Overrides the rule cache staleness threshold.
    #[must_use]
    pub const fn with_rule_cache_max_age(mut self, max_age: Duration) -> Self {
        self.rule_cache_max_age = max_age;
        self
    }

    /// Restores the legacy behavior where rebuilds never advance the
    /// staleness timestamp.
    #[must_use]
    pub const fn with_legacy_rebuild_cadence(mut self) -> Self {
        self.refresh_rebuild_timestamp = false;
        self
    }

    /// Disables startup enforcement of firewall state.
    #[must_use]
    pub const fn without_startup_enforcement(mut self) -> Self {
        self.enforce_on_startup = false;
        self
    }

    /// Checks all fields for usable values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dedup_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "dedup_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "queue_capacity",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.rule_cache_buckets == 0 {
            return Err(ConfigError::InvalidValue {
                field: "rule_cache_buckets",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.dedup_window.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "dedup_window",
                reason: "must be a positive duration".to_string(),
            });
        }
        Ok(())
    }
}
