/// Crate-wide result type.
pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // =========
    // Config / startup
    // =========
    #[error("Configuration file IO error: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse TOML config: {0}")]
    ConfigToml(#[from] toml::de::Error),

    #[error("Missing configuration field: {0}")]
    MissingConfig(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A required client capability was compiled out of this build.
    #[error("{component} is unavailable: rebuild with the '{feature}' feature")]
    DependencyUnavailable {
        component: &'static str,
        feature: &'static str,
    },

    // =========
    // Thresholds / units
    // =========
    #[error("Invalid size format: {0}")]
    Format(String),

    // =========
    // Checks
    // =========
    #[error("Unknown check type: {0}")]
    UnknownCheck(String),

    #[error("Check '{0}' requires a 'key' field")]
    MissingKey(String),

    #[error("Server info field '{field}': {reason}")]
    InfoField { field: String, reason: String },

    #[error("Server info snapshot unavailable in this context: {0}")]
    SnapshotUnavailable(String),

    // =========
    // Redis / Sentinel
    // =========
    #[error("Redis connection error ({endpoint}): {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("No sentinel reachable: {0}")]
    DiscoveryUnavailable(String),

    #[error("Sentinel group not found: {0}")]
    GroupNotFound(String),

    #[error("Sentinel reports primary {endpoint} of group '{group}' as down ({flags})")]
    PrimaryDown {
        group: String,
        endpoint: String,
        flags: String,
    },

    // =========
    // Output
    // =========
    #[error("JSON serialization/deserialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Prometheus registry error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

impl AppError {
    pub(crate) fn connection(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        AppError::Connection {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }
}
