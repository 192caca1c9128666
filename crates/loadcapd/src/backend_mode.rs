//! Backend mode: a single fleet member for local testing and demos.
//!
//! Clients connect on `client_port` and are counted while connected. The
//! controller talks `LoadBalancingManager` on `port`. Both listeners stop
//! on Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tonic::transport::Server;
use tracing::info;

use loadcap_core::{CapBackend, ClientCap, ClientCounter, serve_clients};

use crate::controller_mode::wait_for_ctrl_c;

/// Serve clients on `client_port` and the control service on `port`.
pub async fn run_backend(port: u16, client_port: u16, max_clients: i32) -> anyhow::Result<()> {
    let counter = Arc::new(ClientCounter::new());
    counter.set_max_clients(ClientCap::from_wire(max_clients));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let client_addr = SocketAddr::from(([0, 0, 0, 0], client_port));
    let client_listener = TcpListener::bind(client_addr).await?;
    info!(
        %addr,
        %client_addr,
        max_clients = %counter.max_clients(),
        "loadcap backend listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let clients = tokio::spawn(serve_clients(client_listener, Arc::clone(&counter), shutdown_rx));

    Server::builder()
        .add_service(CapBackend::new(counter).into_service())
        .serve_with_shutdown(addr, async move {
            wait_for_ctrl_c().await;
            let _ = shutdown_tx.send(true);
        })
        .await?;

    clients.await??;
    info!("loadcap backend stopped");
    Ok(())
}
