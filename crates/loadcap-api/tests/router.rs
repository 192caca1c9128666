//! Router tests against a fixed controller status.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use loadcap_api::build_router;
use loadcap_core::{ClientCap, Directive, ServerStatus, Snapshot, StatusHandle, StatusView};
use tower::ServiceExt;

fn status() -> StatusHandle {
    let snapshot: Snapshot = [
        ("a:50052", ServerStatus::new(10, ClientCap::Unbounded)),
        ("b:50052", ServerStatus::new(2, ClientCap::Unbounded)),
    ]
    .into_iter()
    .collect();
    let mut directive = Directive::unbounded(["a:50052", "b:50052"]);
    directive.restrict("a:50052", 6);

    StatusHandle::fixed(StatusView {
        last_snapshot: Some(snapshot),
        stable_iterations: 10,
        stability_threshold: 10,
        servers: vec!["a:50052".into(), "b:50052".into()],
        cycles: 11,
        rebalances: 1,
        last_directive: Some(directive),
        ..Default::default()
    })
}

async fn get(uri: &str) -> (StatusCode, Vec<u8>) {
    let router = build_router(status());
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn status_endpoint_returns_envelope() {
    let (status, body) = get("/api/v1/status").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["stable_iterations"], 10);
    assert_eq!(json["data"]["stability_threshold"], 10);
    assert_eq!(json["data"]["last_snapshot"]["a:50052"]["active_clients"], 10);
    assert_eq!(json["data"]["last_snapshot"]["a:50052"]["max_clients"], -1);
    assert_eq!(json["data"]["last_directive"]["a:50052"], 6);
    assert!(json.get("error").is_none());
}

#[tokio::test]
async fn servers_endpoint_lists_rows() {
    let (status, body) = get("/api/v1/servers").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let rows = json["data"].as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["server"], "a:50052");
    assert_eq!(rows[0]["directive"], 6);
    assert_eq!(rows[1]["active_clients"], 2);
    assert_eq!(rows[1]["directive"], -1);
}

#[tokio::test]
async fn server_endpoint_returns_one_row() {
    let (status, body) = get("/api/v1/servers/a:50052").await;
    assert_eq!(status, StatusCode::OK);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["server"], "a:50052");
    assert_eq!(json["data"]["active_clients"], 10);
    assert_eq!(json["data"]["directive"], 6);
}

#[tokio::test]
async fn unknown_server_returns_error_envelope() {
    let (status, body) = get("/api/v1/servers/c:50052").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], false);
    assert!(json.get("data").is_none());
    assert_eq!(json["error"], "server c:50052 is not in the fleet");
}

#[tokio::test]
async fn metrics_endpoint_serves_prometheus_text() {
    let (status, body) = get("/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("loadcap_rebalances_total 1"));
    assert!(text.contains("loadcap_server_active_clients{server=\"b:50052\"} 2"));
}

#[tokio::test]
async fn healthz_is_ok() {
    let (status, body) = get("/healthz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"ok");
}

#[tokio::test]
async fn unknown_route_is_404() {
    let (status, _) = get("/api/v1/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
