//! Rule store capability.
//!
//! The persisted firewall policy (on Windows, the `INetFwPolicy2` COM
//! surface) is modeled as a trait so the policy manager can be exercised
//! against an in-memory store. All methods take `&self`; implementations
//! over apartment-threaded COM objects serialize internally.

use fwnotify_core::rules::{NewRule, Profile, RuleAction, RuleRecord};
use thiserror::Error;

/// Errors surfaced by the rule-store capability.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The store session could not be established.
    #[error("rule store unavailable: {reason}")]
    Unavailable {
        /// Platform-reported failure detail.
        reason: String,
    },

    /// Enumerating the persisted rule set failed.
    #[error("rule enumeration failed: {reason}")]
    Enumerate {
        /// Platform-reported failure detail.
        reason: String,
    },

    /// Persisting a new rule failed.
    #[error("rule persistence failed: {reason}")]
    Persist {
        /// Platform-reported failure detail.
        reason: String,
    },

    /// Reading or writing per-profile policy failed.
    #[error("profile policy operation failed for {profile:?}: {reason}")]
    ProfilePolicy {
        /// The profile the operation targeted.
        profile: Profile,
        /// Platform-reported failure detail.
        reason: String,
    },
}

/// Persisted firewall rule set and per-profile policy.
pub trait RuleStore {
    /// Snapshots every persisted rule. Order is store-defined.
    fn enumerate_rules(&self) -> Result<Vec<RuleRecord>, StoreError>;

    /// Persists a new outbound rule for an application.
    fn create_rule(&self, rule: &NewRule) -> Result<(), StoreError>;

    /// The default action applied to outbound traffic on `profile`.
    fn default_outbound_action(&self, profile: Profile) -> Result<RuleAction, StoreError>;

    /// Sets the default outbound action on `profile`.
    fn set_default_outbound_action(
        &self,
        profile: Profile,
        action: RuleAction,
    ) -> Result<(), StoreError>;

    /// Enables or disables the firewall on `profile`.
    fn set_firewall_enabled(&self, profile: Profile, enabled: bool) -> Result<(), StoreError>;

    /// The profiles currently active on the local machine. A machine may be
    /// in several profiles at once (one per attached network).
    fn active_profiles(&self) -> Result<Vec<Profile>, StoreError>;
}
