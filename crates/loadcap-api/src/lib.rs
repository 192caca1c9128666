//! loadcap-api — read-only HTTP view of a running controller.
//!
//! Nothing here can change controller state. Handlers read the latest
//! [`StatusView`](loadcap_core::StatusView) published after each cycle.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/api/v1/status` | Full controller status |
//! | GET | `/api/v1/servers` | Per-server load, cap and directive |
//! | GET | `/api/v1/servers/{id}` | One server's row, 404 if not configured |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/healthz` | Liveness |

pub mod handlers;
pub mod prometheus;

use axum::Router;
use axum::routing::get;
use loadcap_core::StatusHandle;

pub use prometheus::render_prometheus;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub status: StatusHandle,
}

/// Build the complete API router.
pub fn build_router(status: StatusHandle) -> Router {
    let api_state = ApiState { status };

    let api_routes = Router::new()
        .route("/status", get(handlers::get_status))
        .route("/servers", get(handlers::list_servers))
        .route("/servers/{id}", get(handlers::get_server))
        .with_state(api_state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(api_state))
        .route("/healthz", get(handlers::healthz))
}
