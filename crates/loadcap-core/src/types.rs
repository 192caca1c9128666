//! Core data model: per-server status, fleet snapshots, and cap directives.

use std::collections::BTreeMap;
use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

/// Stable identity of a backend server (its `host:port` address).
pub type ServerId = String;

/// A client ceiling for one server.
///
/// On the wire a cap is a single `i32` where any negative value means
/// "no cap". The controller always sends `-1` for [`ClientCap::Unbounded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i32", into = "i32")]
pub enum ClientCap {
    /// No ceiling on new connections.
    Unbounded,
    /// At most this many clients.
    Limit(u32),
}

impl ClientCap {
    /// Decode a wire value.
    pub fn from_wire(value: i32) -> Self {
        match u32::try_from(value) {
            Ok(n) => ClientCap::Limit(n),
            Err(_) => ClientCap::Unbounded,
        }
    }

    /// Encode as a wire value. Limits beyond `i32::MAX` saturate.
    pub fn to_wire(self) -> i32 {
        match self {
            ClientCap::Unbounded => loadcap_proto::UNBOUNDED,
            ClientCap::Limit(n) => i32::try_from(n).unwrap_or(i32::MAX),
        }
    }

    pub fn is_limited(&self) -> bool {
        matches!(self, ClientCap::Limit(_))
    }
}

impl From<i32> for ClientCap {
    fn from(value: i32) -> Self {
        ClientCap::from_wire(value)
    }
}

impl From<ClientCap> for i32 {
    fn from(cap: ClientCap) -> Self {
        cap.to_wire()
    }
}

impl fmt::Display for ClientCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientCap::Unbounded => f.write_str("unbounded"),
            ClientCap::Limit(n) => write!(f, "{n}"),
        }
    }
}

/// A point-in-time report from one server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Clients currently connected.
    pub active_clients: u32,
    /// Ceiling the server is currently enforcing.
    pub max_clients: ClientCap,
}

impl ServerStatus {
    pub fn new(active_clients: u32, max_clients: ClientCap) -> Self {
        Self {
            active_clients,
            max_clients,
        }
    }
}

/// One cycle's load reports, keyed by server.
///
/// Equality is value equality over the whole map: two snapshots are equal
/// when they hold the same servers with identical statuses. The order in
/// which servers were polled or inserted plays no part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    servers: BTreeMap<ServerId, ServerStatus>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a server's status, replacing any previous entry for it.
    pub fn insert(&mut self, server: impl Into<ServerId>, status: ServerStatus) {
        self.servers.insert(server.into(), status);
    }

    pub fn get(&self, server: &str) -> Option<&ServerStatus> {
        self.servers.get(server)
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }

    /// Servers in identifier order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ServerStatus)> {
        self.servers.iter().map(|(id, s)| (id.as_str(), s))
    }

    pub fn server_ids(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }

    /// Sum of active clients across the fleet.
    pub fn total_active_clients(&self) -> u64 {
        self.servers
            .values()
            .map(|s| u64::from(s.active_clients))
            .sum()
    }

    /// The most loaded server. Ties go to the lowest identifier.
    pub fn busiest(&self) -> Option<(&str, u32)> {
        let mut best: Option<(&str, u32)> = None;
        for (id, status) in &self.servers {
            match best {
                Some((_, max)) if status.active_clients <= max => {}
                _ => best = Some((id.as_str(), status.active_clients)),
            }
        }
        best
    }
}

impl<S: Into<ServerId>> FromIterator<(S, ServerStatus)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (S, ServerStatus)>>(iter: I) -> Self {
        Self {
            servers: iter.into_iter().map(|(id, s)| (id.into(), s)).collect(),
        }
    }
}

/// Per-server cap instructions for one correction.
///
/// Every server has exactly one entry and at most one entry is a
/// [`ClientCap::Limit`]. The type only hands out constructors that keep
/// both properties: start from [`Directive::unbounded`] and call
/// [`Directive::restrict`] for the single server to limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Directive {
    caps: BTreeMap<ServerId, ClientCap>,
}

impl<'de> Deserialize<'de> for Directive {
    /// Accepts the serialized map only if at most one entry is limited.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let caps = BTreeMap::<ServerId, ClientCap>::deserialize(deserializer)?;
        let limited = caps.values().filter(|cap| cap.is_limited()).count();
        if limited > 1 {
            return Err(D::Error::custom(format!(
                "directive limits {limited} servers, at most one allowed"
            )));
        }
        Ok(Self { caps })
    }
}

impl Directive {
    /// A directive releasing every listed server.
    pub fn unbounded<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ServerId>,
    {
        Self {
            caps: servers
                .into_iter()
                .map(|id| (id.into(), ClientCap::Unbounded))
                .collect(),
        }
    }

    /// Limit `server` to `limit` clients.
    ///
    /// Any server limited earlier is released. Returns `false` (and changes
    /// nothing) when `server` has no entry.
    pub fn restrict(&mut self, server: &str, limit: u32) -> bool {
        if !self.caps.contains_key(server) {
            return false;
        }
        for cap in self.caps.values_mut() {
            *cap = ClientCap::Unbounded;
        }
        if let Some(cap) = self.caps.get_mut(server) {
            *cap = ClientCap::Limit(limit);
        }
        true
    }

    pub fn get(&self, server: &str) -> Option<ClientCap> {
        self.caps.get(server).copied()
    }

    /// The restricted server and its limit, if any.
    pub fn restricted(&self) -> Option<(&str, u32)> {
        self.caps.iter().find_map(|(id, cap)| match cap {
            ClientCap::Limit(n) => Some((id.as_str(), *n)),
            ClientCap::Unbounded => None,
        })
    }

    pub fn len(&self) -> usize {
        self.caps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.caps.is_empty()
    }

    /// Entries in identifier order. This is the order they are applied in.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ClientCap)> {
        self.caps.iter().map(|(id, cap)| (id.as_str(), *cap))
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (id, cap)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{id}: {cap}")?;
        }
        f.write_str("}")
    }
}
