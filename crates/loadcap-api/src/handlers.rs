//! Status API handlers.
//!
//! Every handler takes one copy of the published view and answers from
//! it, so a single response never mixes two cycles.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;

use loadcap_core::{ClientCap, ServerId, StatusView};

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// One row of `/api/v1/servers`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerRow {
    pub server: ServerId,
    /// `None` until the server has been polled successfully.
    pub active_clients: Option<u32>,
    pub max_clients: Option<ClientCap>,
    /// Cap from the most recent directive, if one was computed.
    pub directive: Option<ClientCap>,
}

/// Rows for every configured server, in poll order.
pub fn server_rows(view: &StatusView) -> Vec<ServerRow> {
    view.servers
        .iter()
        .map(|server| {
            let status = view.last_snapshot.as_ref().and_then(|s| s.get(server));
            ServerRow {
                server: server.clone(),
                active_clients: status.map(|s| s.active_clients),
                max_clients: status.map(|s| s.max_clients),
                directive: view.last_directive.as_ref().and_then(|d| d.get(server)),
            }
        })
        .collect()
}

/// GET /api/v1/status
pub async fn get_status(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.status.view())
}

/// GET /api/v1/servers
pub async fn list_servers(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(server_rows(&state.status.view()))
}

/// GET /api/v1/servers/{id}
pub async fn get_server(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match server_rows(&state.status.view())
        .into_iter()
        .find(|row| row.server == id)
    {
        Some(row) => ApiResponse::ok(row).into_response(),
        None => error_response(&format!("server {id} is not in the fleet"), StatusCode::NOT_FOUND)
            .into_response(),
    }
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = crate::prometheus::render_prometheus(&state.status.view());
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
