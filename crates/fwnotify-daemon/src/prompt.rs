//! User decision capability.
//!
//! The worker loop asks the embedder's UI what to do with an unruled
//! application. The call blocks the consumer thread until the user answers;
//! events arriving meanwhile accumulate in the bounded queue.

/// User's answer for an unruled application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Persist an allow rule for the application.
    Allow,
    /// Persist a block rule for the application.
    Block,
    /// Persist nothing; the application may prompt again later.
    Skip,
}

/// Decision surface presented to the user.
pub trait DecisionPrompt {
    /// Asks the user what to do about `path`. Blocks until answered.
    fn decide(&self, path: &str) -> Verdict;
}
