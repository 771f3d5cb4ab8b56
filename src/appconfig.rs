use crate::checks::types::{CheckConfig, CheckKind};
use crate::error::{AppError, AppResult};
use crate::redis::config::ConnectionConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,

    pub checks: Vec<CheckConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

const APP_CONFIG_ENV: &str = "REDIS_CHECKS_CONFIG";
const APP_CONFIG_PATH: &str = "config/redis_checks.toml";

/// Explicit path, else `$REDIS_CHECKS_CONFIG`, else `config/redis_checks.toml`.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(p) => p.to_path_buf(),
        None => std::env::var(APP_CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(APP_CONFIG_PATH)),
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> AppResult<Self> {
        let raw = fs::read_to_string(path)?; // AppError::ConfigIo
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> AppResult<Self> {
        let cfg: Self = toml::from_str(raw)?; // AppError::ConfigToml
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.connection.validate()?;

        if self.checks.is_empty() {
            return Err(AppError::InvalidConfig(
                "must define at least one [[checks]]".into(),
            ));
        }

        for (i, check) in self.checks.iter().enumerate() {
            let prefix = format!("checks[{i}] ({})", check.name());

            if check.kind == CheckKind::ListLength
                && check.key.as_deref().is_none_or(|k| k.trim().is_empty())
            {
                return Err(AppError::MissingKey(check.name().to_string()));
            }

            // Resolve bounds now so typos fail at startup, not mid-run.
            for (side, bound) in [("warn", &check.warn), ("crit", &check.crit)] {
                if let Some(b) = bound {
                    b.resolve(check.kind.normalizes_bounds()).map_err(|e| {
                        AppError::InvalidConfig(format!("{prefix}: {side}: {e}"))
                    })?;
                }
            }
        }

        Ok(())
    }
}

/// Annotated sample configuration.
pub fn config_sample() -> &'static str {
    r#"# Redis checks
[logging]
level = "info"

[connection]
host = "localhost"
port = 6379
# db = 0
# password = "secret"
# connect_timeout_ms = 2000
# command_timeout_ms = 2000

# Sentinel mode: set sentinels and master_name instead of host/port.
# sentinels = ["10.0.0.1:26379", "10.0.0.2:26379"]
# master_name = "mymaster"
# use_master = false

[[checks]]
type = "used_memory"
warn = "128M"
crit = "1024M"

[[checks]]
type = "used_memory_rss"
warn = "128M"
crit = "1024M"

# Check the size of a list
[[checks]]
type = "llen"
key = "celery"
warn = 10
crit = 20
"#
}
