//! Stability gate — debounces fleet snapshots before any correction.
//!
//! The gate counts how many polls in a row returned a snapshot identical
//! to the one before. Only once that count reaches the threshold does it
//! authorize a rebalance, and the caller resets it right after, so every
//! correction has to be re-earned from scratch.

use tracing::debug;

use crate::types::Snapshot;

/// Outcome of feeding one successful poll to the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision<'a> {
    /// Not stable long enough yet.
    Unstable { stable_iterations: u32 },
    /// The just-recorded snapshot may be rebalanced.
    Stable(&'a Snapshot),
}

/// Consecutive-match counter over fleet snapshots.
#[derive(Debug, Clone)]
pub struct StabilityGate {
    /// Most recent successfully polled snapshot.
    last_snapshot: Option<Snapshot>,
    /// Polls in a row that matched their predecessor.
    stable_iterations: u32,
    /// Matches required before a rebalance is authorized.
    threshold: u32,
}

impl StabilityGate {
    pub fn new(threshold: u32) -> Self {
        Self {
            last_snapshot: None,
            stable_iterations: 0,
            threshold,
        }
    }

    /// Record a freshly polled snapshot.
    ///
    /// The snapshot always replaces the recorded one, whether or not it
    /// matched.
    pub fn observe(&mut self, snapshot: Snapshot) -> GateDecision<'_> {
        let unchanged = self.last_snapshot.as_ref() == Some(&snapshot);
        if unchanged {
            self.stable_iterations = self.stable_iterations.saturating_add(1);
            debug!(
                stable_iterations = self.stable_iterations,
                threshold = self.threshold,
                "fleet snapshot unchanged"
            );
        } else {
            if self.stable_iterations > 0 {
                debug!(
                    previous = self.stable_iterations,
                    "fleet snapshot changed, stability reset"
                );
            }
            self.stable_iterations = 0;
        }
        let stable_iterations = self.stable_iterations;
        let stable = stable_iterations >= self.threshold;
        let recorded = self.last_snapshot.insert(snapshot);

        if stable {
            GateDecision::Stable(recorded)
        } else {
            GateDecision::Unstable { stable_iterations }
        }
    }

    /// A poll failed: stability is lost but the stale snapshot is kept.
    pub fn record_poll_failure(&mut self) {
        self.stable_iterations = 0;
    }

    /// Start counting again, e.g. after a correction was attempted.
    pub fn reset(&mut self) {
        self.stable_iterations = 0;
    }

    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last_snapshot.as_ref()
    }

    pub fn stable_iterations(&self) -> u32 {
        self.stable_iterations
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}
