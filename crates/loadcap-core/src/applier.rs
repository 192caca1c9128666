//! Directive applier — pushes caps to the fleet in two ordered phases.
//!
//! ```text
//! release phase:  every Unbounded entry  → SetMaxClients(-1)
//! restrict phase: the single Limit entry → SetMaxClients(n)
//! ```
//!
//! The first failed call aborts the whole apply. Releasing first means a
//! communication failure can leave the fleet too permissive but never
//! leaves a server limited while the others are still constrained or
//! unreachable.

use serde::Serialize;
use tracing::{info, warn};

use crate::client::FleetClient;
use crate::error::{ApplyError, ApplyPhase};
use crate::types::{ClientCap, Directive, ServerId};

/// What a successful apply pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    /// Servers set to unbounded, in push order.
    pub released: Vec<ServerId>,
    /// The server limited in the restrict phase, with its new cap.
    pub restricted: Option<(ServerId, u32)>,
}

/// Push `directive` to the fleet.
pub async fn apply_directive<C>(client: &C, directive: &Directive) -> Result<ApplyReport, ApplyError>
where
    C: FleetClient + ?Sized,
{
    let mut report = ApplyReport::default();

    for (server, cap) in directive.iter() {
        if cap.is_limited() {
            continue;
        }
        push(client, ApplyPhase::Release, server, cap).await?;
        report.released.push(server.to_string());
    }

    for (server, cap) in directive.iter() {
        let ClientCap::Limit(limit) = cap else {
            continue;
        };
        push(client, ApplyPhase::Restrict, server, cap).await?;
        report.restricted = Some((server.to_string(), limit));
    }

    info!(
        released = report.released.len(),
        restricted = ?report.restricted,
        "directive applied"
    );
    Ok(report)
}

async fn push<C>(client: &C, phase: ApplyPhase, server: &str, cap: ClientCap) -> Result<(), ApplyError>
where
    C: FleetClient + ?Sized,
{
    client.set_max_clients(server, cap).await.map_err(|source| {
        warn!(%server, %phase, %cap, error = %source, "could not set max clients");
        ApplyError { phase, source }
    })
}
