//! Server configuration.
//!
//! Every setting has a default and can be overridden by an environment
//! variable.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::approval::ApprovalConfig;
use crate::handoff::DEFAULT_OUTBOX_CAPACITY;

/// Environment variable names.
pub const BIND_ADDR_VAR: &str = "RAIL_BIND_ADDR";
pub const NETWORK_PATH_VAR: &str = "RAIL_NETWORK_PATH";
pub const LAYOUT_DIR_VAR: &str = "RAIL_LAYOUT_DIR";
pub const APPROVAL_TIMEOUT_VAR: &str = "RAIL_APPROVAL_TIMEOUT_SECS";
pub const SWEEP_INTERVAL_VAR: &str = "RAIL_SWEEP_INTERVAL_MS";
pub const MOTION_OUTBOX_VAR: &str = "RAIL_MOTION_OUTBOX_CAPACITY";

/// An environment variable held a value that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value for {var}: {value:?}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

/// Configuration for the control server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP/WebSocket server binds to.
    pub bind_addr: SocketAddr,

    /// Network description file.
    pub network_path: PathBuf,

    /// Directory of per-station layout documents.
    pub layout_dir: PathBuf,

    /// How long an approval may stay pending before it is denied.
    pub approval_timeout: Duration,

    /// How often overdue approvals are swept.
    pub sweep_interval: Duration,

    /// Motion commands kept for the simulation before the oldest are dropped.
    pub motion_outbox_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            network_path: PathBuf::from("data/network.json"),
            layout_dir: PathBuf::from("data/layouts"),
            approval_timeout: Duration::from_secs(60),
            sweep_interval: Duration::from_millis(1000),
            motion_outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
        }
    }
}

impl ServerConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup(BIND_ADDR_VAR) {
            config.bind_addr = parse(BIND_ADDR_VAR, value)?;
        }
        if let Some(value) = lookup(NETWORK_PATH_VAR) {
            config.network_path = PathBuf::from(value);
        }
        if let Some(value) = lookup(LAYOUT_DIR_VAR) {
            config.layout_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(APPROVAL_TIMEOUT_VAR) {
            config.approval_timeout = Duration::from_secs(parse(APPROVAL_TIMEOUT_VAR, value)?);
        }
        if let Some(value) = lookup(SWEEP_INTERVAL_VAR) {
            let millis: u64 = parse(SWEEP_INTERVAL_VAR, value)?;
            if millis == 0 {
                return Err(ConfigError {
                    var: SWEEP_INTERVAL_VAR,
                    value: millis.to_string(),
                });
            }
            config.sweep_interval = Duration::from_millis(millis);
        }
        if let Some(value) = lookup(MOTION_OUTBOX_VAR) {
            let capacity: usize = parse(MOTION_OUTBOX_VAR, value)?;
            if capacity == 0 {
                return Err(ConfigError {
                    var: MOTION_OUTBOX_VAR,
                    value: capacity.to_string(),
                });
            }
            config.motion_outbox_capacity = capacity;
        }

        Ok(config)
    }

    /// Approval policy derived from this configuration.
    pub fn approval(&self) -> ApprovalConfig {
        ApprovalConfig::new(self.approval_timeout)
    }
}

fn parse<T: std::str::FromStr>(var: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError { var, value })
}
