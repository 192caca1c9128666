//! In-memory fleet for deterministic controller tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::client::FleetClient;
use crate::error::RpcError;
use crate::types::{ClientCap, ServerId, ServerStatus};

/// One call received by a [`ScriptedFleet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Status(ServerId),
    SetMax(ServerId, ClientCap),
}

#[derive(Default)]
struct Inner {
    order: Vec<ServerId>,
    statuses: HashMap<ServerId, ServerStatus>,
    failing_status: HashSet<ServerId>,
    failing_set_max: HashSet<ServerId>,
    calls: Vec<Call>,
}

/// A fleet whose loads and failures are set by the test.
pub struct ScriptedFleet {
    inner: Mutex<Inner>,
}

impl ScriptedFleet {
    pub fn new<'a>(loads: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let mut inner = Inner::default();
        for (id, active) in loads {
            inner.order.push(id.to_string());
            inner
                .statuses
                .insert(id.to_string(), ServerStatus::new(active, ClientCap::Unbounded));
        }
        Self {
            inner: Mutex::new(inner),
        }
    }

    pub fn servers(&self) -> Vec<ServerId> {
        self.inner.lock().unwrap().order.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    pub fn set_active(&self, server: &str, active: u32) {
        if let Some(status) = self.inner.lock().unwrap().statuses.get_mut(server) {
            status.active_clients = active;
        }
    }

    pub fn cap_of(&self, server: &str) -> Option<ClientCap> {
        self.inner
            .lock()
            .unwrap()
            .statuses
            .get(server)
            .map(|s| s.max_clients)
    }

    pub fn fail_status(&self, server: &str) {
        self.inner.lock().unwrap().failing_status.insert(server.to_string());
    }

    pub fn fail_set_max(&self, server: &str) {
        self.inner.lock().unwrap().failing_set_max.insert(server.to_string());
    }

    pub fn heal(&self, server: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.failing_status.remove(server);
        inner.failing_set_max.remove(server);
    }
}

fn unavailable(server: &str) -> RpcError {
    RpcError::Status {
        server: server.to_string(),
        status: tonic::Status::unavailable("scripted failure"),
    }
}

#[tonic::async_trait]
impl FleetClient for ScriptedFleet {
    async fn client_status(&self, server: &str) -> Result<ServerStatus, RpcError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::Status(server.to_string()));
        if inner.failing_status.contains(server) {
            return Err(unavailable(server));
        }
        inner
            .statuses
            .get(server)
            .copied()
            .ok_or_else(|| RpcError::UnknownServer(server.to_string()))
    }

    async fn set_max_clients(&self, server: &str, cap: ClientCap) -> Result<(), RpcError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(Call::SetMax(server.to_string(), cap));
        if inner.failing_set_max.contains(server) {
            return Err(unavailable(server));
        }
        match inner.statuses.get_mut(server) {
            Some(status) => {
                status.max_clients = cap;
                Ok(())
            }
            None => Err(RpcError::UnknownServer(server.to_string())),
        }
    }
}
