//! Replay guard: a set of previously seen countersigned tokens.

use parking_lot::Mutex;
use std::collections::HashSet;

/// Set-membership over countersigned token strings.
///
/// `record` must be a single atomic check-and-insert so that two concurrent
/// submissions of the same token cannot both observe it as fresh. Scope and
/// eviction are deployment concerns; the contract here is only membership.
pub trait ReplayGuard: Send + Sync {
    /// Record a token. Returns `true` if it had not been seen before.
    /// Idempotent: recording an already seen token returns `false` and
    /// changes nothing.
    fn record(&self, encoded: &str) -> bool;

    /// Whether a token has been recorded. `true` means callers must refuse
    /// the token.
    fn seen(&self, encoded: &str) -> bool;
}

/// In-memory, process-lifetime replay guard.
#[derive(Debug, Default)]
pub struct MemoryReplayGuard {
    seen: Mutex<HashSet<String>>,
}

impl MemoryReplayGuard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplayGuard for MemoryReplayGuard {
    fn record(&self, encoded: &str) -> bool {
        self.seen.lock().insert(encoded.to_string())
    }

    fn seen(&self, encoded: &str) -> bool {
        self.seen.lock().contains(encoded)
    }
}
