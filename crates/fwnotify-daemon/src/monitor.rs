//! Connection event monitor.
//!
//! Bridges the platform event source to the consumer thread: each qualifying
//! drop event is deduplicated, resolved to a drive-letter path, and pushed
//! onto the bounded queue. The callback may run concurrently on several
//! source-owned threads, so the dedup cache sits behind its own mutex,
//! separate from the queue's lock; the O(capacity) dedup scan never happens
//! under the queue lock.
//!
//! Lifecycle is `Idle -> Subscribed -> Idle`. [`ConnectionMonitor::stop`]
//! unsubscribes first, confirming no further callbacks can arrive, then
//! closes the queue so the consumer drains and observes end-of-stream. An
//! event already past the dedup stage when stop runs may still attempt one
//! push; it observes the closed queue and is discarded rather than blocking.

use std::sync::{Arc, Mutex};

use fwnotify_core::dedup::DedupCache;
use fwnotify_core::queue::{BoundedQueue, QueueError};
use fwnotify_core::resolve::{resolve_device_path, DriveTable};
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::NotifierConfig;
use crate::source::{EventHandler, NetEvent, NetEventKind, NetEventSource};
use crate::ticks::TickSource;

/// Errors surfaced by the monitor and the event-source capability.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MonitorError {
    /// The event-source session could not be established.
    #[error("event source session failed to initialize: {reason}")]
    SessionInit {
        /// Platform-reported failure detail.
        reason: String,
    },

    /// Subscribing the drop-event handler failed.
    #[error("event subscription failed: {reason}")]
    Subscribe {
        /// Platform-reported failure detail.
        reason: String,
    },

    /// Deregistering the subscription failed.
    #[error("event unsubscription failed: {reason}")]
    Unsubscribe {
        /// Platform-reported failure detail.
        reason: String,
    },

    /// The monitor never initialized and cannot subscribe.
    #[error("monitor is not initialized")]
    NotInitialized,
}

/// State shared with the event-source callback.
struct MonitorShared {
    dedup: Mutex<DedupCache>,
    queue: BoundedQueue<String>,
    drives: Arc<dyn DriveTable + Send + Sync>,
    ticks: Arc<dyn TickSource>,
}

impl MonitorShared {
    /// Callback body. Filter, dedup, resolve, enqueue - short-circuiting on
    /// the first stage that rejects the event.
    fn handle_event(&self, event: &NetEvent) {
        if event.kind != NetEventKind::ClassifyDrop {
            return;
        }

        let Some(device_path) = event.app_id.as_deref() else {
            return;
        };
        if device_path.is_empty() {
            return;
        }

        let fresh = {
            let mut dedup = self.dedup.lock().unwrap_or_else(|e| e.into_inner());
            dedup.observe(device_path, self.ticks.now_ms())
        };
        if !fresh {
            return;
        }

        let Some(resolved) = resolve_device_path(self.drives.as_ref(), device_path) else {
            // No mounted drive maps this device path; nothing actionable.
            trace!(device_path, "drop event path did not resolve");
            return;
        };

        if let Err(QueueError::Closed) = self.queue.push(resolved) {
            debug!(device_path, "discarded drop event during shutdown");
        }
    }
}

/// Subscribes to the event source and feeds the bounded queue.
pub struct ConnectionMonitor<S: NetEventSource> {
    source: Option<S>,
    shared: Arc<MonitorShared>,
    subscription: Mutex<Option<S::Subscription>>,
}

impl<S: NetEventSource> ConnectionMonitor<S> {
    /// Builds a monitor over an already-established source session.
    #[must_use]
    pub fn new(
        source: S,
        drives: Arc<dyn DriveTable + Send + Sync>,
        ticks: Arc<dyn TickSource>,
        config: &NotifierConfig,
    ) -> Self {
        Self::build(Some(source), drives, ticks, config)
    }

    /// Builds a monitor from a fallible source-session constructor.
    ///
    /// If the session cannot be established the monitor starts
    /// uninitialized: [`Self::start`] reports [`MonitorError::NotInitialized`]
    /// and [`Self::receive`] returns `None` immediately, so a consumer
    /// thread spun up anyway terminates instead of blocking forever.
    pub fn connect<F>(
        connect: F,
        drives: Arc<dyn DriveTable + Send + Sync>,
        ticks: Arc<dyn TickSource>,
        config: &NotifierConfig,
    ) -> Self
    where
        F: FnOnce() -> Result<S, MonitorError>,
    {
        match connect() {
            Ok(source) => Self::build(Some(source), drives, ticks, config),
            Err(err) => {
                warn!(error = %err, "connection monitor starting uninitialized");
                let monitor = Self::build(None, drives, ticks, config);
                monitor.shared.queue.close();
                monitor
            }
        }
    }

    fn build(
        source: Option<S>,
        drives: Arc<dyn DriveTable + Send + Sync>,
        ticks: Arc<dyn TickSource>,
        config: &NotifierConfig,
    ) -> Self {
        Self {
            source,
            shared: Arc::new(MonitorShared {
                dedup: Mutex::new(DedupCache::new(config.dedup_capacity, config.dedup_window)),
                queue: BoundedQueue::new(config.queue_capacity),
                drives,
                ticks,
            }),
            subscription: Mutex::new(None),
        }
    }

    /// Registers the drop-event handler with the source.
    ///
    /// Idempotent: starting an already-subscribed monitor is a no-op. A
    /// failed subscription leaves the queue open so a retried `start` can
    /// still deliver events; a consumer blocked in [`Self::receive`]
    /// meanwhile is released by [`Self::stop`] as usual.
    pub fn start(&self) -> Result<(), MonitorError> {
        let Some(source) = self.source.as_ref() else {
            return Err(MonitorError::NotInitialized);
        };

        let mut subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if subscription.is_some() {
            return Ok(());
        }

        let shared = Arc::clone(&self.shared);
        let handler: EventHandler = Arc::new(move |event| shared.handle_event(event));

        match source.subscribe(handler) {
            Ok(token) => {
                info!("connection monitor subscribed to drop events");
                *subscription = Some(token);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "drop event subscription failed");
                Err(err)
            }
        }
    }

    /// Deregisters the handler and closes the queue.
    ///
    /// Unsubscription happens before the close so no callback can race the
    /// queue teardown; only then is the consumer unblocked. Idempotent:
    /// stopping an idle monitor is a no-op.
    pub fn stop(&self) {
        let token = {
            let mut subscription = self
                .subscription
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            subscription.take()
        };

        if let Some(token) = token {
            if let Some(source) = self.source.as_ref() {
                if let Err(err) = source.unsubscribe(token) {
                    warn!(error = %err, "drop event unsubscription failed");
                }
            }
            info!("connection monitor stopped");
        }

        // Closed even when no subscription was ever established, so a
        // consumer blocked in receive() is always released.
        self.shared.queue.close();
    }

    /// Blocks for the next resolved drop-event path.
    ///
    /// Returns `None` once the monitor has stopped and the queue drained.
    pub fn receive(&self) -> Option<String> {
        self.shared.queue.pop()
    }
}

impl<S: NetEventSource> Drop for ConnectionMonitor<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::ticks::ManualTicks;

    /// Event source driven by hand from tests. Cloneable so the test keeps a
    /// handle after the monitor takes ownership.
    #[derive(Clone, Default)]
    struct ManualSource {
        inner: Arc<ManualSourceInner>,
    }

    #[derive(Default)]
    struct ManualSourceInner {
        handler: Mutex<Option<EventHandler>>,
        next_token: AtomicU64,
        fail_next_subscribe: std::sync::atomic::AtomicBool,
    }

    impl ManualSource {
        fn emit(&self, event: &NetEvent) {
            let handler = self
                .inner
                .handler
                .lock()
                .unwrap()
                .clone();
            if let Some(handler) = handler {
                handler(event);
            }
        }

        fn is_subscribed(&self) -> bool {
            self.inner.handler.lock().unwrap().is_some()
        }
    }

    impl NetEventSource for ManualSource {
        type Subscription = u64;

        fn subscribe(&self, handler: EventHandler) -> Result<u64, MonitorError> {
            if self.inner.fail_next_subscribe.swap(false, Ordering::SeqCst) {
                return Err(MonitorError::Subscribe {
                    reason: "simulated".to_string(),
                });
            }
            *self.inner.handler.lock().unwrap() = Some(handler);
            Ok(self.inner.next_token.fetch_add(1, Ordering::SeqCst))
        }

        fn unsubscribe(&self, _subscription: u64) -> Result<(), MonitorError> {
            *self.inner.handler.lock().unwrap() = None;
            Ok(())
        }
    }

    struct OneDrive;

    impl DriveTable for OneDrive {
        fn logical_drives(&self) -> u32 {
            1 << 2 // C:
        }

        fn device_target(&self, drive: &str) -> Option<String> {
            let mut targets = HashMap::new();
            targets.insert("C:", r"\Device\HarddiskVolume3");
            targets.get(drive).map(|t| (*t).to_string())
        }
    }

    fn monitor_with(
        source: ManualSource,
        ticks: Arc<ManualTicks>,
    ) -> ConnectionMonitor<ManualSource> {
        ConnectionMonitor::new(
            source,
            Arc::new(OneDrive),
            ticks,
            &NotifierConfig::default(),
        )
    }

    #[test]
    fn qualifying_drop_event_reaches_the_queue() {
        let source = ManualSource::default();
        let ticks = Arc::new(ManualTicks::new(1_000));
        let monitor = monitor_with(source.clone(), Arc::clone(&ticks));

        monitor.start().unwrap();
        source.emit(&NetEvent::classify_drop(r"\Device\HarddiskVolume3\app.exe"));

        assert_eq!(monitor.receive().as_deref(), Some(r"C:\app.exe"));
    }

    #[test]
    fn non_drop_kinds_and_missing_app_id_are_ignored() {
        let source = ManualSource::default();
        let ticks = Arc::new(ManualTicks::new(1_000));
        let monitor = monitor_with(source.clone(), Arc::clone(&ticks));
        monitor.start().unwrap();

        source.emit(&NetEvent {
            kind: NetEventKind::ClassifyAllow,
            app_id: Some(r"\Device\HarddiskVolume3\app.exe".to_string()),
        });
        source.emit(&NetEvent {
            kind: NetEventKind::ClassifyDrop,
            app_id: None,
        });
        source.emit(&NetEvent {
            kind: NetEventKind::ClassifyDrop,
            app_id: Some(String::new()),
        });

        monitor.stop();
        assert_eq!(monitor.receive(), None);
    }

    #[test]
    fn burst_of_identical_drops_is_deduplicated() {
        let source = ManualSource::default();
        let ticks = Arc::new(ManualTicks::new(1_000));
        let monitor = monitor_with(source.clone(), Arc::clone(&ticks));
        monitor.start().unwrap();

        for _ in 0..5 {
            source.emit(&NetEvent::classify_drop(r"\Device\HarddiskVolume3\app.exe"));
        }
        // Past the window the same path propagates again.
        ticks.advance(60_000);
        source.emit(&NetEvent::classify_drop(r"\Device\HarddiskVolume3\app.exe"));

        monitor.stop();
        assert_eq!(monitor.receive().as_deref(), Some(r"C:\app.exe"));
        assert_eq!(monitor.receive().as_deref(), Some(r"C:\app.exe"));
        assert_eq!(monitor.receive(), None);
    }

    #[test]
    fn unresolvable_paths_are_dropped_silently() {
        let source = ManualSource::default();
        let ticks = Arc::new(ManualTicks::new(1_000));
        let monitor = monitor_with(source.clone(), Arc::clone(&ticks));
        monitor.start().unwrap();

        source.emit(&NetEvent::classify_drop(r"\Device\HarddiskVolume9\app.exe"));

        monitor.stop();
        assert_eq!(monitor.receive(), None);
    }

    #[test]
    fn start_is_idempotent() {
        let source = ManualSource::default();
        let ticks = Arc::new(ManualTicks::new(0));
        let monitor = monitor_with(source.clone(), Arc::clone(&ticks));

        monitor.start().unwrap();
        monitor.start().unwrap();
        assert!(source.is_subscribed());
    }

    #[test]
    fn stop_unsubscribes_then_ends_the_stream() {
        let source = ManualSource::default();
        let ticks = Arc::new(ManualTicks::new(0));
        let monitor = monitor_with(source.clone(), Arc::clone(&ticks));

        monitor.start().unwrap();
        monitor.stop();
        assert!(!source.is_subscribed());
        assert_eq!(monitor.receive(), None);

        // Idempotent.
        monitor.stop();
    }

    #[test]
    fn stop_unblocks_a_waiting_consumer() {
        let source = ManualSource::default();
        let ticks = Arc::new(ManualTicks::new(0));
        let monitor = Arc::new(monitor_with(source.clone(), Arc::clone(&ticks)));
        monitor.start().unwrap();

        let consumer = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.receive())
        };

        thread::sleep(Duration::from_millis(50));
        monitor.stop();
        assert_eq!(consumer.join().unwrap(), None);
    }

    #[test]
    fn event_after_stop_is_discarded() {
        let source = ManualSource::default();
        let ticks = Arc::new(ManualTicks::new(0));
        let monitor = monitor_with(source.clone(), Arc::clone(&ticks));
        monitor.start().unwrap();

        // Keep a handler clone alive to simulate a callback still in flight
        // while stop() runs.
        let in_flight = source.inner.handler.lock().unwrap().clone().unwrap();
        monitor.stop();
        in_flight(&NetEvent::classify_drop(r"\Device\HarddiskVolume3\late.exe"));

        assert_eq!(monitor.receive(), None);
    }

    #[test]
    fn failed_subscription_does_not_poison_a_retry() {
        let source = ManualSource::default();
        source
            .inner
            .fail_next_subscribe
            .store(true, Ordering::SeqCst);
        let ticks = Arc::new(ManualTicks::new(1_000));
        let monitor = monitor_with(source.clone(), Arc::clone(&ticks));

        assert!(matches!(
            monitor.start(),
            Err(MonitorError::Subscribe { .. })
        ));

        // The queue stays open, so a successful retry delivers events.
        monitor.start().unwrap();
        source.emit(&NetEvent::classify_drop(r"\Device\HarddiskVolume3\app.exe"));
        assert_eq!(monitor.receive().as_deref(), Some(r"C:\app.exe"));
    }

    #[test]
    fn failed_session_yields_inert_monitor() {
        let ticks: Arc<ManualTicks> = Arc::new(ManualTicks::new(0));
        let monitor: ConnectionMonitor<ManualSource> = ConnectionMonitor::connect(
            || {
                Err(MonitorError::SessionInit {
                    reason: "engine unavailable".to_string(),
                })
            },
            Arc::new(OneDrive),
            ticks,
            &NotifierConfig::default(),
        );

        assert!(matches!(
            monitor.start(),
            Err(MonitorError::NotInitialized)
        ));
        assert_eq!(monitor.receive(), None);
    }
}
