//! Net-event source capability.
//!
//! The platform's packet-filtering layer reports connection verdicts through
//! a callback subscription (on Windows, a WFP net-event session). The
//! monitor only consumes the subscription surface modeled here; the events
//! themselves arrive on threads owned by the source, possibly several at
//! once.

use std::sync::Arc;

use crate::monitor::MonitorError;

/// Kind of a net event. Only [`NetEventKind::ClassifyDrop`] enters the
/// pipeline; every other kind is ignored at the callback boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum NetEventKind {
    /// An outbound connection attempt was blocked by the filtering layer.
    ClassifyDrop,
    /// A connection attempt was permitted.
    ClassifyAllow,
    /// Any other event kind the platform reports.
    Other,
}

/// A single event delivered by the source.
#[derive(Debug, Clone)]
pub struct NetEvent {
    pub kind: NetEventKind,
    /// Application identity: the device-namespace path of the executable
    /// that attempted the connection, when the platform captured one.
    pub app_id: Option<String>,
}

impl NetEvent {
    /// A classify-drop event carrying an application identity.
    #[must_use]
    pub fn classify_drop(device_path: impl Into<String>) -> Self {
        Self {
            kind: NetEventKind::ClassifyDrop,
            app_id: Some(device_path.into()),
        }
    }
}

/// Handler invoked by the source for every event. Runs on arbitrary
/// source-owned threads and must therefore be `Send + Sync`; concurrent
/// invocations are possible.
pub type EventHandler = Arc<dyn Fn(&NetEvent) + Send + Sync>;

/// Subscription surface of the platform event source.
///
/// Callbacks carry their owning component through the captured handler
/// rather than process-global state, so `subscribe` takes a closure value
/// and returns an opaque token that `unsubscribe` later consumes.
pub trait NetEventSource {
    /// Token identifying an active subscription.
    type Subscription;

    /// Registers `handler` for event delivery.
    fn subscribe(&self, handler: EventHandler) -> Result<Self::Subscription, MonitorError>;

    /// Deregisters a subscription. After this returns, the source delivers
    /// no further callbacks for it.
    fn unsubscribe(&self, subscription: Self::Subscription) -> Result<(), MonitorError>;
}
