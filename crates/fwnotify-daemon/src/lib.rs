//! fwnotify-daemon - Firewall drop-event notifier pipeline
//!
//! Coordinates the event intake pipeline: the platform's net-event source
//! delivers outbound-connection drop events on its own threads, the
//! [`monitor::ConnectionMonitor`] deduplicates and resolves them into a
//! bounded queue, and a single consumer thread runs [`worker::run`] to decide
//! (via the [`policy::PolicyManager`] and a [`prompt::DecisionPrompt`])
//! whether to persist a new allow/block rule.
//!
//! Platform backends are capability traits supplied by the embedder:
//! [`source::NetEventSource`] for the drop-event subscription,
//! [`store::RuleStore`] for the persisted rule set and profile policy,
//! [`fwnotify_core::resolve::DriveTable`] for drive enumeration, and
//! [`prompt::DecisionPrompt`] for the user-facing decision UI. One monitor
//! and one policy manager exist per process; all cache state is in-memory
//! and rebuilt from the store on demand.

pub mod config;
pub mod monitor;
pub mod policy;
pub mod prompt;
pub mod source;
pub mod store;
pub mod ticks;
pub mod worker;

pub use config::{ConfigError, NotifierConfig};
pub use monitor::{ConnectionMonitor, MonitorError};
pub use policy::PolicyManager;
pub use prompt::{DecisionPrompt, Verdict};
pub use source::{NetEvent, NetEventKind, NetEventSource};
pub use store::{RuleStore, StoreError};
pub use ticks::{SystemTicks, TickSource};
