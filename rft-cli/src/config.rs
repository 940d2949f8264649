//! Configuration file support and argument validation for RFT CLI tools

use rft::{ServerOptions, Timeouts};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

/// Lowest port a user may bind or target
pub const MIN_PORT: u32 = 1023;

/// Timing overrides, all in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TimeoutConfig {
    pub poll_interval_ms: Option<u64>,
    pub handshake_timeout_ms: Option<u64>,
    pub ack_timeout_ms: Option<u64>,
    pub drain_timeout_ms: Option<u64>,
}

impl TimeoutConfig {
    /// Overlay the configured values on `base`
    pub fn apply(&self, base: Timeouts) -> Timeouts {
        let pick = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_millis).unwrap_or(default)
        };
        Timeouts {
            poll_interval: pick(self.poll_interval_ms, base.poll_interval),
            handshake_timeout: pick(self.handshake_timeout_ms, base.handshake_timeout),
            ack_timeout: pick(self.ack_timeout_ms, base.ack_timeout),
            drain_timeout: pick(self.drain_timeout_ms, base.drain_timeout),
        }
    }
}

/// Receiver-only settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub max_connections: Option<usize>,
}

/// Combined configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub timeouts: TimeoutConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Config::default()),
        }
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeouts.poll_interval_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.server.max_connections == Some(0) {
            return Err(ConfigError::Invalid(
                "max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts.apply(Timeouts::default())
    }

    pub fn server_options(&self) -> ServerOptions {
        let defaults = ServerOptions::default();
        ServerOptions {
            max_connections: self
                .server
                .max_connections
                .unwrap_or(defaults.max_connections),
            timeouts: self.timeouts(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Incorrect port")]
    InvalidPort(String),

    #[error("Incorrect host: {0}")]
    InvalidHost(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Parse a port argument, accepting only unprivileged ports
pub fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    let port: u32 = raw
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidPort(raw.to_string()))?;

    if !(MIN_PORT..=u32::from(u16::MAX)).contains(&port) {
        return Err(ConfigError::InvalidPort(raw.to_string()));
    }
    Ok(port as u16)
}

/// Resolve a host name or address to the first matching socket address
pub fn resolve_host(host: &str, port: u16) -> Result<SocketAddr, ConfigError> {
    (host, port)
        .to_socket_addrs()
        .map_err(|_| ConfigError::InvalidHost(host.to_string()))?
        .next()
        .ok_or_else(|| ConfigError::InvalidHost(host.to_string()))
}
