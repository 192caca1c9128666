//! loadcapd — the loadcap daemon.
//!
//! Two roles in one binary:
//! - `run`: the rebalancing controller, with an optional status API
//! - `backend`: a reference fleet member serving `LoadBalancingManager`
//!
//! # Usage
//!
//! ```text
//! loadcapd run --server 10.0.0.1:50052 --server 10.0.0.2:50052 --api-port 9090
//! loadcapd run --config /etc/loadcap/loadcap.toml
//! loadcapd backend --port 50052 --client-port 50051 --max-clients 8
//! ```

mod backend_mode;
mod controller_mode;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use loadcap_core::RebalancerConfig;
use loadcap_core::config::{ConfigFile, parse_duration};

#[derive(Parser)]
#[command(name = "loadcapd", about = "loadcap admission-cap daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the rebalancing controller against a fixed fleet.
    Run {
        /// TOML configuration file. Flags override its values.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Backend address (host:port). Repeat for each server.
        #[arg(long = "server")]
        servers: Vec<String>,

        /// Identical polls required before rebalancing.
        #[arg(long)]
        stability_threshold: Option<u32>,

        /// Time between control cycles, e.g. "2s" or "500ms".
        #[arg(long, value_parser = duration_arg)]
        poll_interval: Option<Duration>,

        /// Deadline for each RPC, e.g. "1s".
        #[arg(long, value_parser = duration_arg)]
        rpc_timeout: Option<Duration>,

        /// Serve the read-only status API on this port.
        #[arg(long)]
        api_port: Option<u16>,
    },
    /// Run a reference backend that counts its clients and enforces its cap.
    Backend {
        /// Port for the controller's `LoadBalancingManager` service.
        #[arg(long, default_value = "50052")]
        port: u16,

        /// Port clients connect to.
        #[arg(long, default_value = "50051")]
        client_port: u16,

        /// Initial cap. Negative means unbounded.
        #[arg(long, default_value = "-1", allow_hyphen_values = true)]
        max_clients: i32,
    },
}

fn duration_arg(s: &str) -> Result<Duration, String> {
    parse_duration(s).ok_or_else(|| format!("invalid duration '{s}' (expected e.g. 500ms, 2s, 1m)"))
}

/// Command-line values that override the configuration file.
#[derive(Debug, Default)]
struct Overrides {
    servers: Vec<String>,
    stability_threshold: Option<u32>,
    poll_interval: Option<Duration>,
    rpc_timeout: Option<Duration>,
}

/// Merge the optional file with flag overrides and validate the result.
fn resolve_config(path: Option<&Path>, overrides: Overrides) -> anyhow::Result<RebalancerConfig> {
    let mut config = match path {
        Some(path) => RebalancerConfig::from_file_config(ConfigFile::from_file(path)?)?,
        None => RebalancerConfig::new(Vec::<String>::new()),
    };

    if !overrides.servers.is_empty() {
        config.servers = overrides.servers;
    }
    if let Some(threshold) = overrides.stability_threshold {
        config.stability_threshold = threshold;
    }
    if let Some(interval) = overrides.poll_interval {
        config.poll_interval = interval;
    }
    if let Some(timeout) = overrides.rpc_timeout {
        config.rpc_timeout = timeout;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,loadcapd=debug,loadcap=debug")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            config,
            servers,
            stability_threshold,
            poll_interval,
            rpc_timeout,
            api_port,
        } => {
            let config = resolve_config(
                config.as_deref(),
                Overrides {
                    servers,
                    stability_threshold,
                    poll_interval,
                    rpc_timeout,
                },
            )?;
            controller_mode::run_controller(config, api_port).await
        }
        Command::Backend {
            port,
            client_port,
            max_clients,
        } => backend_mode::run_backend(port, client_port, max_clients).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadcap_core::ConfigError;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("loadcap.toml");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "loadcapd",
            "run",
            "--server",
            "a:1",
            "--server",
            "b:1",
            "--poll-interval",
            "500ms",
            "--api-port",
            "9090",
        ])
        .unwrap();

        match cli.command {
            Command::Run {
                servers,
                poll_interval,
                api_port,
                ..
            } => {
                assert_eq!(servers, vec!["a:1", "b:1"]);
                assert_eq!(poll_interval, Some(Duration::from_millis(500)));
                assert_eq!(api_port, Some(9090));
            }
            Command::Backend { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn cli_rejects_bad_duration() {
        let result = Cli::try_parse_from(["loadcapd", "run", "--rpc-timeout", "soon"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_backend_accepts_negative_cap() {
        let cli = Cli::try_parse_from(["loadcapd", "backend", "--max-clients", "-1"]).unwrap();
        match cli.command {
            Command::Backend {
                port,
                client_port,
                max_clients,
            } => {
                assert_eq!((port, client_port, max_clients), (50052, 50051, -1));
            }
            Command::Run { .. } => panic!("expected backend"),
        }
    }

    #[test]
    fn cli_backend_no_longer_takes_a_fixed_client_count() {
        let result = Cli::try_parse_from(["loadcapd", "backend", "--clients", "3"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["loadcapd", "backend", "--client-port", "6000"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Backend {
                client_port: 6000,
                ..
            }
        ));
    }

    #[test]
    fn flags_alone_use_defaults() {
        let config = resolve_config(
            None,
            Overrides {
                servers: vec!["a:1".into()],
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.stability_threshold, 10);
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.rpc_timeout, Duration::from_secs(1));
    }

    #[test]
    fn flags_override_file() {
        let (_dir, path) = write_config(
            "servers = [\"a:1\", \"b:1\"]\nstability_threshold = 5\npoll_interval = \"3s\"\n",
        );
        let config = resolve_config(
            Some(&path),
            Overrides {
                stability_threshold: Some(2),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(config.servers, vec!["a:1", "b:1"]);
        assert_eq!(config.stability_threshold, 2);
        assert_eq!(config.poll_interval, Duration::from_secs(3));
    }

    #[test]
    fn empty_fleet_is_fatal() {
        let err = resolve_config(None, Overrides::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::NoServers)
        ));
    }
}
