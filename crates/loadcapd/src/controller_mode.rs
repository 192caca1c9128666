//! Controller mode: polls the fleet and applies caps until Ctrl-C.
//!
//! The control loop runs as its own task. When `api_port` is set the
//! status API is served alongside it and shares its shutdown signal.

use std::net::SocketAddr;

use tokio::sync::watch;
use tracing::{info, warn};

use loadcap_core::{GrpcFleetClient, Rebalancer, RebalancerConfig};

/// Run the controller.
pub async fn run_controller(config: RebalancerConfig, api_port: Option<u16>) -> anyhow::Result<()> {
    info!(
        servers = ?config.servers,
        stability_threshold = config.stability_threshold,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        rpc_timeout_ms = config.rpc_timeout.as_millis() as u64,
        "loadcap controller starting"
    );

    let client = GrpcFleetClient::new(&config.servers, config.rpc_timeout)?;
    let mut rebalancer = Rebalancer::new(&config, client)?;
    let status = rebalancer.status_handle();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let loop_handle = tokio::spawn(async move {
        rebalancer.run(shutdown_rx).await;
    });

    match api_port {
        Some(port) => {
            let router = loadcap_api::build_router(status);
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!(%addr, "status API listening");

            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    wait_for_ctrl_c().await;
                    let _ = shutdown_tx.send(true);
                })
                .await?;
        }
        None => {
            wait_for_ctrl_c().await;
            let _ = shutdown_tx.send(true);
        }
    }

    let _ = loop_handle.await;
    info!("loadcap controller stopped");
    Ok(())
}

pub(crate) async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "could not listen for Ctrl-C, shutting down");
    }
    info!("shutdown signal received");
}
