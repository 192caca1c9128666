//! Rebalance computation — decides the cap directive for a stable fleet.
//!
//! # Algorithm
//!
//! ```text
//! total      = Σ active_clients
//! fair_share = ceil(total / servers)
//!
//! every server → unbounded
//! if total > 0 and busiest.active_clients > fair_share:
//!     busiest → fair_share
//! ```
//!
//! At most one server is ever limited, in case the estimate is wrong.

use tracing::{debug, info};

use crate::types::{Directive, Snapshot};

/// Compute the directive for `snapshot`. Pure: the same snapshot always
/// yields the same directive.
pub fn compute_directive(snapshot: &Snapshot) -> Directive {
    let mut directive = Directive::unbounded(snapshot.server_ids());

    let total = snapshot.total_active_clients();
    let servers = snapshot.len() as u64;
    debug!(total_clients = total, servers, "computing rebalance");

    if total == 0 || servers == 0 {
        return directive;
    }

    let fair_share = total.div_ceil(servers);
    let Some((busiest, load)) = snapshot.busiest() else {
        return directive;
    };

    if u64::from(load) > fair_share {
        // fair_share <= load, so it fits in a u32.
        let limit = u32::try_from(fair_share).unwrap_or(load);
        info!(
            server = %busiest,
            active_clients = load,
            fair_share,
            "busiest server above fair share, limiting"
        );
        directive.restrict(busiest, limit);
    } else {
        debug!(
            server = %busiest,
            active_clients = load,
            fair_share,
            "no rebalancing required"
        );
    }

    directive
}
