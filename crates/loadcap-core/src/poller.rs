//! Snapshot poller. Reads every server's status, all or nothing.

use tracing::{debug, warn};

use crate::client::FleetClient;
use crate::error::PollError;
use crate::types::{ServerId, Snapshot};

/// Query `servers` one after another, in the given order.
///
/// The first failing server aborts the poll; servers after it are not
/// contacted and no partial snapshot is returned. The fair-share
/// computation needs the true fleet total, so a partial view is useless.
pub async fn poll_snapshot<C>(client: &C, servers: &[ServerId]) -> Result<Snapshot, PollError>
where
    C: FleetClient + ?Sized,
{
    let mut snapshot = Snapshot::new();
    for server in servers {
        debug!(%server, "polling client status");
        match client.client_status(server).await {
            Ok(status) => snapshot.insert(server.as_str(), status),
            Err(e) => {
                warn!(%server, error = %e, "could not get client status");
                return Err(PollError(e));
            }
        }
    }
    Ok(snapshot)
}
