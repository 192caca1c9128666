//! loadcap-core — admission-cap controller for a small server fleet.
//!
//! Watches client load across a fixed set of backends, waits until the
//! observed distribution stops changing, then caps the single most
//! overloaded server at its fair share and releases everyone else.
//!
//! # Architecture
//!
//! ```text
//! Rebalancer (one cycle per tick)
//!   ├── poller::poll_snapshot()      → GetClientStatus on every server
//!   ├── gate::StabilityGate          → counts identical snapshots
//!   ├── rebalance::compute_directive → fair share, busiest server only
//!   ├── applier::apply_directive()   → release phase, then restrict phase
//!   └── status::StatusHandle         → read-only view for the API
//!
//! Backend (every fleet member)
//!   ├── backend::serve_clients()     → counts client connections, refuses over cap
//!   └── backend::CapBackend (gRPC)
//!       ├── GetClientStatus() → active clients, current cap
//!       └── SetMaxClients()   → stores the new cap
//! ```

pub mod applier;
pub mod backend;
pub mod client;
pub mod config;
pub mod controller;
pub mod error;
pub mod gate;
pub mod poller;
pub mod rebalance;
pub mod status;
pub mod types;

#[cfg(test)]
mod testing;

pub use applier::{ApplyReport, apply_directive};
pub use backend::{CapBackend, ClientCounter, ClientGuard, serve_clients};
pub use client::{FleetClient, GrpcFleetClient};
pub use config::RebalancerConfig;
pub use controller::Rebalancer;
pub use error::{ApplyError, ApplyPhase, ConfigError, PollError, RpcError};
pub use gate::{GateDecision, StabilityGate};
pub use poller::poll_snapshot;
pub use rebalance::compute_directive;
pub use status::{CycleOutcome, StatusHandle, StatusView};
pub use types::{ClientCap, Directive, ServerId, ServerStatus, Snapshot};
