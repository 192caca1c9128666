//! The rebalancing control loop.
//!
//! One cycle per tick, never overlapping:
//!
//! ```text
//! poll fleet ──fail──▶ reset stability, keep stale snapshot
//!     │
//!     ▼
//! stability gate ──unstable──▶ done
//!     │ stable
//!     ▼
//! compute directive → apply (release, then restrict) → reset stability
//! ```
//!
//! Stability is reset after every apply attempt, successful or not, since
//! the fleet is expected to move to a new, unobserved state.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::applier::apply_directive;
use crate::client::FleetClient;
use crate::config::RebalancerConfig;
use crate::error::ConfigError;
use crate::gate::{GateDecision, StabilityGate};
use crate::poller::poll_snapshot;
use crate::rebalance::compute_directive;
use crate::status::{CycleOutcome, StatusHandle, StatusPublisher, StatusView};
use crate::types::{Directive, ServerId};

/// Running totals across cycles.
#[derive(Debug, Clone, Copy, Default)]
struct CycleStats {
    cycles: u64,
    poll_failures: u64,
    apply_failures: u64,
    rebalances: u64,
}

/// Owns all mutable controller state. Only the loop mutates it; everyone
/// else reads through a [`StatusHandle`].
pub struct Rebalancer<C> {
    client: C,
    servers: Vec<ServerId>,
    poll_interval: Duration,
    gate: StabilityGate,
    stats: CycleStats,
    last_directive: Option<Directive>,
    last_outcome: Option<CycleOutcome>,
    publisher: StatusPublisher,
}

impl<C: FleetClient> Rebalancer<C> {
    /// Create a controller for the configured fleet.
    ///
    /// Fails on invalid configuration; in particular an empty server list
    /// is never accepted.
    pub fn new(config: &RebalancerConfig, client: C) -> Result<Self, ConfigError> {
        config.validate()?;

        let publisher = StatusPublisher::new(StatusView {
            stability_threshold: config.stability_threshold,
            servers: config.servers.clone(),
            ..Default::default()
        });

        Ok(Self {
            client,
            servers: config.servers.clone(),
            poll_interval: config.poll_interval,
            gate: StabilityGate::new(config.stability_threshold),
            stats: CycleStats::default(),
            last_directive: None,
            last_outcome: None,
            publisher,
        })
    }

    /// A read-only handle on the published status.
    pub fn status_handle(&self) -> StatusHandle {
        self.publisher.subscribe()
    }

    pub fn gate(&self) -> &StabilityGate {
        &self.gate
    }

    /// Run exactly one poll → gate → (compute → apply) cycle.
    pub async fn run_cycle(&mut self) -> CycleOutcome {
        self.stats.cycles += 1;
        let outcome = self.cycle().await;
        self.last_outcome = Some(outcome.clone());
        self.publish();
        outcome
    }

    async fn cycle(&mut self) -> CycleOutcome {
        debug!(cycle = self.stats.cycles, "fetching server data");

        let snapshot = match poll_snapshot(&self.client, &self.servers).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                // Without a full view we cannot assume stability.
                self.gate.record_poll_failure();
                self.stats.poll_failures += 1;
                warn!(error = %e, "could not get all data, stability reset");
                return CycleOutcome::PollFailed {
                    server: e.0.server().to_string(),
                    error: e.to_string(),
                };
            }
        };

        let threshold = self.gate.threshold();
        let directive = match self.gate.observe(snapshot) {
            GateDecision::Unstable { stable_iterations } => {
                debug!(stable_iterations, threshold, "fleet not stable yet");
                return CycleOutcome::Unstable { stable_iterations };
            }
            GateDecision::Stable(recorded) => compute_directive(recorded),
        };
        info!(
            stable_iterations = self.gate.stable_iterations(),
            %directive,
            "fleet stable, applying rebalancing"
        );

        let result = apply_directive(&self.client, &directive).await;

        // Whatever happened, the fleet has to re-earn stability.
        self.gate.reset();
        self.last_directive = Some(directive.clone());

        match result {
            Ok(report) => {
                self.stats.rebalances += 1;
                CycleOutcome::Rebalanced { directive, report }
            }
            Err(e) => {
                self.stats.apply_failures += 1;
                warn!(error = %e, "error while applying rebalancing results");
                CycleOutcome::ApplyFailed {
                    server: e.source.server().to_string(),
                    phase: e.phase,
                    error: e.to_string(),
                    directive,
                }
            }
        }
    }

    fn publish(&self) {
        self.publisher.publish(StatusView {
            last_snapshot: self.gate.last_snapshot().cloned(),
            stable_iterations: self.gate.stable_iterations(),
            stability_threshold: self.gate.threshold(),
            servers: self.servers.clone(),
            cycles: self.stats.cycles,
            poll_failures: self.stats.poll_failures,
            apply_failures: self.stats.apply_failures,
            rebalances: self.stats.rebalances,
            last_directive: self.last_directive.clone(),
            last_outcome: self.last_outcome.clone(),
            updated_at: epoch_secs(),
        });
    }

    /// Run the control loop until `shutdown` changes.
    ///
    /// Ticks that fire while a cycle is still running are delayed, not
    /// queued up, so cycles never overlap or burst.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            servers = self.servers.len(),
            interval_ms = self.poll_interval.as_millis() as u64,
            threshold = self.gate.threshold(),
            "rebalancer started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.run_cycle().await;
                }
                _ = shutdown.changed() => {
                    info!("rebalancer shutting down");
                    break;
                }
            }
        }
    }
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
