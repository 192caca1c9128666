//! Error types for the loadcap controller.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// A single RPC to a backend server failed.
#[derive(Debug, Error)]
pub enum RpcError {
    #[error("server {0} is not part of the fleet")]
    UnknownServer(String),

    #[error("server {server} did not answer within {timeout:?}")]
    Timeout { server: String, timeout: Duration },

    #[error("server {server} returned {}: {}", .status.code(), .status.message())]
    Status {
        server: String,
        #[source]
        status: tonic::Status,
    },

    #[error("server {server} sent an invalid response: {reason}")]
    InvalidResponse { server: String, reason: String },
}

impl RpcError {
    /// The server the failed call was addressed to.
    pub fn server(&self) -> &str {
        match self {
            RpcError::UnknownServer(server)
            | RpcError::Timeout { server, .. }
            | RpcError::Status { server, .. }
            | RpcError::InvalidResponse { server, .. } => server,
        }
    }
}

/// Fetching the fleet snapshot failed. No partial snapshot is produced.
#[derive(Debug, Error)]
#[error("poll failed: {0}")]
pub struct PollError(#[from] pub RpcError);

/// The phase of directive application a failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyPhase {
    /// Returning servers to unbounded.
    Release,
    /// Imposing the single new limit.
    Restrict,
}

impl fmt::Display for ApplyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyPhase::Release => f.write_str("release"),
            ApplyPhase::Restrict => f.write_str("restrict"),
        }
    }
}

/// Pushing a directive was aborted at the first failed call.
#[derive(Debug, Error)]
#[error("apply aborted in {phase} phase: {source}")]
pub struct ApplyError {
    pub phase: ApplyPhase,
    #[source]
    pub source: RpcError,
}

/// Invalid controller configuration. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("at least one server address is required")]
    NoServers,

    #[error("server {0} is listed more than once")]
    DuplicateServer(String),

    #[error("stability threshold must be at least 1")]
    InvalidThreshold,

    #[error("invalid duration for {field}: {value:?}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("invalid server address {server}: {reason}")]
    InvalidAddress { server: String, reason: String },

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}
