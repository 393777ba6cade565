//! Consumer loop.
//!
//! Runs on the single dedicated consumer thread: drains the monitor's queue,
//! skips paths that already have a rule, prompts the user for the rest, and
//! persists the answer. The prompt call blocks this thread for as long as
//! the user takes; events arriving meanwhile pile up in the bounded queue.
//! The loop exits when the monitor stops and the queue drains.

use fwnotify_core::rules::RuleAction;
use tracing::{debug, info, warn};

use crate::monitor::ConnectionMonitor;
use crate::policy::PolicyManager;
use crate::prompt::{DecisionPrompt, Verdict};
use crate::source::NetEventSource;
use crate::store::RuleStore;

/// Drains the monitor until end-of-stream.
///
/// A `Skip` verdict persists nothing and leaves the decision cache alone,
/// so the same path can prompt again once its dedup entry ages out.
pub fn run<S, R, P>(monitor: &ConnectionMonitor<S>, policy: &mut PolicyManager<R>, prompt: &P)
where
    S: NetEventSource,
    R: RuleStore,
    P: DecisionPrompt + ?Sized,
{
    while let Some(path) = monitor.receive() {
        if policy.has_rule(&path) {
            debug!(path, "drop event already ruled");
            continue;
        }

        let action = match prompt.decide(&path) {
            Verdict::Allow => RuleAction::Allow,
            Verdict::Block => RuleAction::Block,
            Verdict::Skip => {
                debug!(path, "user skipped decision");
                continue;
            }
        };

        if !policy.add_rule(&path, action) {
            warn!(path, ?action, "rule was not persisted");
        }
    }

    info!("consumer loop finished");
}
