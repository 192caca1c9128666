//! Controller configuration and the `loadcap.toml` file format.
//!
//! ```toml
//! servers = ["10.0.0.1:50052", "10.0.0.2:50052", "10.0.0.3:50052"]
//! stability_threshold = 10
//! poll_interval = "2s"
//! rpc_timeout = "1s"
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::ServerId;

pub const DEFAULT_STABILITY_THRESHOLD: u32 = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(1);

/// Raw contents of a `loadcap.toml` file. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub servers: Option<Vec<String>>,
    pub stability_threshold: Option<u32>,
    pub poll_interval: Option<String>,
    pub rpc_timeout: Option<String>,
}

impl ConfigFile {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }
}

/// Validated settings for one controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebalancerConfig {
    /// Backend addresses, polled in this order.
    pub servers: Vec<ServerId>,
    /// Consecutive identical snapshots required before acting.
    pub stability_threshold: u32,
    /// Tick period of the control loop.
    pub poll_interval: Duration,
    /// Deadline for each individual RPC.
    pub rpc_timeout: Duration,
}

impl RebalancerConfig {
    /// Configuration for `servers` with reference defaults.
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ServerId>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            stability_threshold: DEFAULT_STABILITY_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }

    /// Build from a parsed file, filling gaps with defaults.
    pub fn from_file_config(file: ConfigFile) -> Result<Self, ConfigError> {
        let mut config = Self::new(file.servers.unwrap_or_default());
        if let Some(threshold) = file.stability_threshold {
            config.stability_threshold = threshold;
        }
        if let Some(raw) = file.poll_interval {
            config.poll_interval = parse_duration(&raw).ok_or(ConfigError::InvalidDuration {
                field: "poll_interval",
                value: raw,
            })?;
        }
        if let Some(raw) = file.rpc_timeout {
            config.rpc_timeout = parse_duration(&raw).ok_or(ConfigError::InvalidDuration {
                field: "rpc_timeout",
                value: raw,
            })?;
        }
        Ok(config)
    }

    /// Load and validate a `loadcap.toml` file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::from_file_config(ConfigFile::from_file(path)?)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the control loop relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        let mut seen = HashSet::new();
        for server in &self.servers {
            if !seen.insert(server.as_str()) {
                return Err(ConfigError::DuplicateServer(server.clone()));
            }
        }
        if self.stability_threshold == 0 {
            return Err(ConfigError::InvalidThreshold);
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidDuration {
                field: "poll_interval",
                value: format!("{:?}", self.poll_interval),
            });
        }
        if self.rpc_timeout.is_zero() {
            return Err(ConfigError::InvalidDuration {
                field: "rpc_timeout",
                value: format!("{:?}", self.rpc_timeout),
            });
        }
        Ok(())
    }
}

/// Parse a duration string like "500ms", "2s" or "1m".
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_values() {
        assert_eq!(parse_duration("2s"), Some(Duration::from_secs(2)));
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("3"), Some(Duration::from_secs(3)));
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn defaults_match_reference_values() {
        let config = RebalancerConfig::new(["a:1"]);
        assert_eq!(config.stability_threshold, 10);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.rpc_timeout, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_server_list_is_rejected() {
        let config = RebalancerConfig::new(Vec::<String>::new());
        assert!(matches!(config.validate(), Err(ConfigError::NoServers)));
    }

    #[test]
    fn duplicate_servers_are_rejected() {
        let config = RebalancerConfig::new(["a:1", "b:1", "a:1"]);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateServer(s)) if s == "a:1"
        ));
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut config = RebalancerConfig::new(["a:1"]);
        config.stability_threshold = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidThreshold)));
    }

    #[test]
    fn zero_durations_are_rejected() {
        let mut config = RebalancerConfig::new(["a:1"]);
        config.rpc_timeout = Duration::ZERO;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDuration { field: "rpc_timeout", .. })
        ));
    }

    #[test]
    fn parses_toml_file_contents() {
        let file = ConfigFile::from_toml_str(
            r#"
            servers = ["localhost:50052", "localhost:50054"]
            stability_threshold = 3
            poll_interval = "500ms"
            "#,
        )
        .unwrap();
        let config = RebalancerConfig::from_file_config(file).unwrap();

        assert_eq!(config.servers, vec!["localhost:50052", "localhost:50054"]);
        assert_eq!(config.stability_threshold, 3);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.rpc_timeout, DEFAULT_RPC_TIMEOUT);
    }

    #[test]
    fn bad_duration_in_file_is_an_error() {
        let file = ConfigFile::from_toml_str(r#"rpc_timeout = "fast""#).unwrap();
        assert!(matches!(
            RebalancerConfig::from_file_config(file),
            Err(ConfigError::InvalidDuration { field: "rpc_timeout", .. })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            ConfigFile::from_toml_str("threshold = 4"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn load_reads_and_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loadcap.toml");

        std::fs::write(&path, "servers = []\n").unwrap();
        assert!(matches!(RebalancerConfig::load(&path), Err(ConfigError::NoServers)));

        std::fs::write(&path, "servers = [\"a:1\"]\n").unwrap();
        assert_eq!(RebalancerConfig::load(&path).unwrap().servers, vec!["a:1"]);
    }
}
