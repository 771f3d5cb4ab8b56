// src/redis/config.rs

use crate::error::{AppError, AppResult};
use serde::Deserialize;
use std::time::Duration;

/// Connection block of the config file.
///
/// Direct mode uses `host`/`port`. Sentinel mode is selected by a non-empty
/// `sentinels` list; `master_name` and `use_master` are read by the resolver
/// only and never forwarded to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub db: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,

    // --------------------------
    // Sentinel (HA) mode
    // --------------------------
    /// Sentinel addresses as `host:port`.
    #[serde(default)]
    pub sentinels: Vec<String>,
    /// Monitored group name.
    #[serde(default)]
    pub master_name: Option<String>,
    /// Resolve the primary instead of a replica.
    #[serde(default)]
    pub use_master: bool,
    #[serde(default)]
    pub sentinel_password: Option<String>,

    // --------------------------
    // Timeouts
    // --------------------------
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub command_timeout_ms: u64,
}

fn default_host() -> String {
    "localhost".into()
}

fn default_port() -> u16 {
    6379
}

fn default_timeout_ms() -> u64 {
    2_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            db: 0,
            username: None,
            password: None,
            sentinels: Vec::new(),
            master_name: None,
            use_master: false,
            sentinel_password: None,
            connect_timeout_ms: default_timeout_ms(),
            command_timeout_ms: default_timeout_ms(),
        }
    }
}

/// Address plus credentials of one Redis node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeParams {
    pub host: String,
    pub port: u16,
    pub db: i64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeouts: Timeouts,
}

impl NodeParams {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Same credentials and timeouts, another address.
    pub fn at(&self, host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..self.clone()
        }
    }
}

/// What the discovery layer needs: where the sentinels are, how to talk to
/// them, and the parameters for the node it hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryParams {
    pub sentinels: Vec<(String, u16)>,
    pub sentinel_password: Option<String>,
    pub node: NodeParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub command: Duration,
}

impl ConnectionConfig {
    pub fn is_sentinel(&self) -> bool {
        !self.sentinels.is_empty()
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_millis(self.connect_timeout_ms),
            command: Duration::from_millis(self.command_timeout_ms),
        }
    }

    /// Direct-mode parameters.
    pub fn node_params(&self) -> NodeParams {
        NodeParams {
            host: self.host.clone(),
            port: self.port,
            db: self.db,
            username: self.username.clone(),
            password: self.password.clone(),
            timeouts: self.timeouts(),
        }
    }

    /// Non-blank group name, required in sentinel mode.
    pub fn group_name(&self) -> AppResult<&str> {
        match self.master_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(AppError::MissingConfig("master_name")),
        }
    }

    /// Discovery view of this config, without the resolver-only fields.
    pub fn discovery_params(&self) -> AppResult<DiscoveryParams> {
        let sentinels = self
            .sentinels
            .iter()
            .map(|addr| parse_addr(addr))
            .collect::<AppResult<Vec<_>>>()?;

        Ok(DiscoveryParams {
            sentinels,
            sentinel_password: self.sentinel_password.clone(),
            node: self.node_params(),
        })
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.port == 0 {
            return Err(AppError::InvalidConfig("connection.port must be > 0".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(AppError::InvalidConfig(
                "connection.connect_timeout_ms must be > 0".into(),
            ));
        }
        if self.command_timeout_ms == 0 {
            return Err(AppError::InvalidConfig(
                "connection.command_timeout_ms must be > 0".into(),
            ));
        }

        if self.is_sentinel() {
            self.group_name()?;
            self.discovery_params()?;
        } else if self.host.trim().is_empty() {
            return Err(AppError::InvalidConfig("connection.host must not be empty".into()));
        }

        Ok(())
    }
}

/// Parse `host:port` (IPv6 hosts may be bracketed: `[::1]:26379`).
fn parse_addr(addr: &str) -> AppResult<(String, u16)> {
    let invalid = || AppError::InvalidConfig(format!("sentinel address '{addr}' must be host:port"));

    let (host, port) = addr.trim().rsplit_once(':').ok_or_else(invalid)?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(invalid());
    }
    let port: u16 = port.parse().map_err(|_| invalid())?;
    if port == 0 {
        return Err(invalid());
    }
    Ok((host.to_string(), port))
}
