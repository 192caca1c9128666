//! Fleet RPC client.
//!
//! [`FleetClient`] is the seam between the control loop and the network.
//! [`GrpcFleetClient`] is the production implementation over tonic; tests
//! substitute an in-memory fleet.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tonic::transport::{Channel, Endpoint};
use tracing::debug;

use loadcap_proto::LoadBalancingManagerClient;
use loadcap_proto::v1::{ClientStatusRequest, SetMaxClientsRequest};

use crate::error::{ConfigError, RpcError};
use crate::types::{ClientCap, ServerId, ServerStatus};

/// The two calls the controller makes against a backend server.
#[tonic::async_trait]
pub trait FleetClient: Send + Sync {
    /// Fetch the server's current client count and cap.
    async fn client_status(&self, server: &str) -> Result<ServerStatus, RpcError>;

    /// Push a new cap to the server.
    async fn set_max_clients(&self, server: &str, cap: ClientCap) -> Result<(), RpcError>;
}

#[tonic::async_trait]
impl<T: FleetClient + ?Sized> FleetClient for Arc<T> {
    async fn client_status(&self, server: &str) -> Result<ServerStatus, RpcError> {
        (**self).client_status(server).await
    }

    async fn set_max_clients(&self, server: &str, cap: ClientCap) -> Result<(), RpcError> {
        (**self).set_max_clients(server, cap).await
    }
}

/// gRPC client holding one lazily connected channel per server.
///
/// Every call is bounded by `rpc_timeout`, covering connection setup and
/// the request itself. Failed calls are not retried.
#[derive(Debug, Clone)]
pub struct GrpcFleetClient {
    channels: HashMap<ServerId, Channel>,
    rpc_timeout: Duration,
}

impl GrpcFleetClient {
    /// Prepare channels for `servers`. No connection is made until the
    /// first call.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(servers: &[ServerId], rpc_timeout: Duration) -> Result<Self, ConfigError> {
        let mut channels = HashMap::with_capacity(servers.len());
        for server in servers {
            let uri = if server.contains("://") {
                server.clone()
            } else {
                format!("http://{server}")
            };
            let endpoint = Endpoint::from_shared(uri)
                .map_err(|e| ConfigError::InvalidAddress {
                    server: server.clone(),
                    reason: e.to_string(),
                })?
                .connect_timeout(rpc_timeout)
                .timeout(rpc_timeout);
            channels.insert(server.clone(), endpoint.connect_lazy());
        }
        Ok(Self {
            channels,
            rpc_timeout,
        })
    }

    pub fn rpc_timeout(&self) -> Duration {
        self.rpc_timeout
    }

    fn client_for(
        &self,
        server: &str,
    ) -> Result<LoadBalancingManagerClient<Channel>, RpcError> {
        self.channels
            .get(server)
            .cloned()
            .map(LoadBalancingManagerClient::new)
            .ok_or_else(|| RpcError::UnknownServer(server.to_string()))
    }

    /// Run `call` under the per-call deadline.
    async fn with_deadline<T, F>(&self, server: &str, call: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        match tokio::time::timeout(self.rpc_timeout, call).await {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) if status.code() == tonic::Code::DeadlineExceeded => {
                Err(RpcError::Timeout {
                    server: server.to_string(),
                    timeout: self.rpc_timeout,
                })
            }
            Ok(Err(status)) => Err(RpcError::Status {
                server: server.to_string(),
                status,
            }),
            Err(_) => Err(RpcError::Timeout {
                server: server.to_string(),
                timeout: self.rpc_timeout,
            }),
        }
    }
}

#[tonic::async_trait]
impl FleetClient for GrpcFleetClient {
    async fn client_status(&self, server: &str) -> Result<ServerStatus, RpcError> {
        let mut client = self.client_for(server)?;
        let reply = self
            .with_deadline(server, client.get_client_status(ClientStatusRequest {}))
            .await?;

        let active_clients =
            u32::try_from(reply.active_clients).map_err(|_| RpcError::InvalidResponse {
                server: server.to_string(),
                reason: format!("negative active client count {}", reply.active_clients),
            })?;
        let status = ServerStatus::new(active_clients, ClientCap::from_wire(reply.max_clients));
        debug!(
            %server,
            active_clients,
            max_clients = %status.max_clients,
            "client status received"
        );
        Ok(status)
    }

    async fn set_max_clients(&self, server: &str, cap: ClientCap) -> Result<(), RpcError> {
        let mut client = self.client_for(server)?;
        self.with_deadline(
            server,
            client.set_max_clients(SetMaxClientsRequest {
                max_clients: cap.to_wire(),
            }),
        )
        .await?;
        debug!(%server, %cap, "max clients updated");
        Ok(())
    }
}
