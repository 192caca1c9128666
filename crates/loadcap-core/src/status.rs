//! Read-only controller status for dashboards and the HTTP API.
//!
//! The control loop publishes a complete [`StatusView`] after every cycle
//! through a `watch` channel. Readers clone the latest value, so they
//! always see a snapshot and counter that belong to the same cycle.

use serde::Serialize;
use tokio::sync::watch;

use crate::applier::ApplyReport;
use crate::error::ApplyPhase;
use crate::types::{Directive, ServerId, Snapshot};

/// What one control cycle did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// A server could not be polled; stability was reset.
    PollFailed { server: ServerId, error: String },
    /// Polled fine but not stable long enough.
    Unstable { stable_iterations: u32 },
    /// A directive was computed and fully applied.
    Rebalanced {
        directive: Directive,
        report: ApplyReport,
    },
    /// A directive was computed but applying it was aborted.
    ApplyFailed {
        directive: Directive,
        phase: ApplyPhase,
        server: ServerId,
        error: String,
    },
}

/// Everything an observer may know about the controller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusView {
    /// Last successfully polled snapshot. Stale after a failed poll.
    pub last_snapshot: Option<Snapshot>,
    pub stable_iterations: u32,
    pub stability_threshold: u32,
    /// Configured servers, in poll order.
    pub servers: Vec<ServerId>,
    pub cycles: u64,
    pub poll_failures: u64,
    pub apply_failures: u64,
    pub rebalances: u64,
    /// Directive from the most recent rebalance attempt.
    pub last_directive: Option<Directive>,
    pub last_outcome: Option<CycleOutcome>,
    /// Unix seconds of the last publish.
    pub updated_at: u64,
}

/// Cloneable read handle onto the published status.
#[derive(Debug, Clone)]
pub struct StatusHandle {
    rx: watch::Receiver<StatusView>,
}

impl StatusHandle {
    /// A copy of the latest published status.
    pub fn view(&self) -> StatusView {
        self.rx.borrow().clone()
    }

    /// Wait until the controller publishes again.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }

    /// A handle on a fixed status, for tests and tooling.
    pub fn fixed(view: StatusView) -> Self {
        let (_tx, rx) = watch::channel(view);
        Self { rx }
    }
}

/// Write side, owned by the control loop.
#[derive(Debug)]
pub(crate) struct StatusPublisher {
    tx: watch::Sender<StatusView>,
}

impl StatusPublisher {
    pub(crate) fn new(initial: StatusView) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub(crate) fn subscribe(&self) -> StatusHandle {
        StatusHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub(crate) fn publish(&self, view: StatusView) {
        self.tx.send_replace(view);
    }
}
