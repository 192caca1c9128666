//! Reference backend: a server that counts its client connections, reports
//! the count, and refuses new clients beyond the cap pushed by the
//! controller.
//!
//! Clients connect on their own TCP port, served by [`serve_clients`].
//! Each admitted connection holds a [`ClientGuard`] for as long as it stays
//! open. [`CapBackend`] exposes the count and the cap over the
//! `LoadBalancingManager` service.
//!
//! A cap only gates admission. Clients already connected when a lower cap
//! arrives stay connected until they leave on their own.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};

use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

use loadcap_proto::v1::{ClientStatus, ClientStatusRequest, SetMaxClientsReply, SetMaxClientsRequest};
use loadcap_proto::{LoadBalancingManager, LoadBalancingManagerServer, UNBOUNDED};

use crate::types::{ClientCap, ServerStatus};

/// Live client count and the cap last pushed by the controller.
#[derive(Debug)]
pub struct ClientCounter {
    active: AtomicU32,
    max: AtomicI32,
}

impl Default for ClientCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientCounter {
    /// A counter with no clients and no cap.
    pub fn new() -> Self {
        Self {
            active: AtomicU32::new(0),
            max: AtomicI32::new(UNBOUNDED),
        }
    }

    /// Admit one client if the cap allows it.
    ///
    /// The returned guard keeps the client counted until it is dropped.
    /// `None` means the server is at or above its cap.
    pub fn try_admit(self: &Arc<Self>) -> Option<ClientGuard> {
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match self.max_clients() {
                ClientCap::Limit(max) if n >= max => None,
                _ => n.checked_add(1),
            })
            .ok()
            .map(|_| ClientGuard {
                counter: Arc::clone(self),
            })
    }

    pub fn active_clients(&self) -> u32 {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_clients(&self) -> ClientCap {
        ClientCap::from_wire(self.max.load(Ordering::SeqCst))
    }

    pub fn set_max_clients(&self, cap: ClientCap) {
        self.max.store(cap.to_wire(), Ordering::SeqCst);
        if self.over_capacity() {
            warn!(
                %cap,
                active_clients = self.active_clients(),
                "cap below current load, admitting no one until clients leave"
            );
        }
    }

    /// Whether the server holds more clients than its cap allows.
    pub fn over_capacity(&self) -> bool {
        match self.max_clients() {
            ClientCap::Unbounded => false,
            ClientCap::Limit(n) => self.active_clients() > n,
        }
    }

    pub fn status(&self) -> ServerStatus {
        ServerStatus::new(self.active_clients(), self.max_clients())
    }
}

/// One admitted client. Dropping it releases the slot.
#[derive(Debug)]
pub struct ClientGuard {
    counter: Arc<ClientCounter>,
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        let _ = self
            .counter
            .active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_sub(1)));
    }
}

/// Accept client connections on `listener` until `shutdown` flips to true.
///
/// Admitted connections are counted until the peer closes them. Connections
/// arriving while the server is at its cap are closed immediately.
pub async fn serve_clients(
    listener: TcpListener,
    counter: Arc<ClientCounter>,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = accepted?;
                match counter.try_admit() {
                    Some(guard) => {
                        debug!(%peer, active_clients = counter.active_clients(), "client admitted");
                        tokio::spawn(hold_client(stream, guard));
                    }
                    None => {
                        info!(
                            %peer,
                            max_clients = %counter.max_clients(),
                            "client refused, server at capacity"
                        );
                        drop(stream);
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("client listener shutting down");
                    return Ok(());
                }
            }
        }
    }
}

/// Keep a client counted until it disconnects. Incoming bytes are discarded.
async fn hold_client(mut stream: TcpStream, guard: ClientGuard) {
    let mut buf = [0u8; 1024];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "client connection failed");
                break;
            }
        }
    }
    drop(guard);
}

/// gRPC implementation of the `LoadBalancingManager` service.
#[derive(Debug, Clone)]
pub struct CapBackend {
    counter: Arc<ClientCounter>,
}

impl CapBackend {
    pub fn new(counter: Arc<ClientCounter>) -> Self {
        Self { counter }
    }

    pub fn counter(&self) -> &Arc<ClientCounter> {
        &self.counter
    }

    /// Get the tonic service for mounting on a gRPC server.
    pub fn into_service(self) -> LoadBalancingManagerServer<Self> {
        LoadBalancingManagerServer::new(self)
    }
}

#[tonic::async_trait]
impl LoadBalancingManager for CapBackend {
    async fn get_client_status(
        &self,
        _request: Request<ClientStatusRequest>,
    ) -> Result<Response<ClientStatus>, Status> {
        let status = self.counter.status();
        debug!(
            active_clients = status.active_clients,
            max_clients = %status.max_clients,
            "client status requested"
        );
        Ok(Response::new(ClientStatus {
            active_clients: i32::try_from(status.active_clients).unwrap_or(i32::MAX),
            max_clients: status.max_clients.to_wire(),
        }))
    }

    async fn set_max_clients(
        &self,
        request: Request<SetMaxClientsRequest>,
    ) -> Result<Response<SetMaxClientsReply>, Status> {
        let cap = ClientCap::from_wire(request.into_inner().max_clients);
        self.counter.set_max_clients(cap);
        info!(
            %cap,
            active_clients = self.counter.active_clients(),
            "max clients set by controller"
        );
        Ok(Response::new(SetMaxClientsReply {}))
    }
}
