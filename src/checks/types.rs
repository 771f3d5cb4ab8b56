// src/checks/types.rs

use crate::error::{AppError, AppResult};
use crate::units::human_to_bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity reported by a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Ok,
    Warning,
    Critical,
}

impl Status {
    /// Log / metric label string.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warning => "WARNING",
            Status::Critical => "CRITICAL",
        }
    }

    /// Monitoring-plugin exit code.
    #[inline]
    pub fn exit_code(&self) -> i32 {
        match self {
            Status::Ok => 0,
            Status::Warning => 1,
            Status::Critical => 2,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of one check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub status: Status,
    pub message: String,
}

impl CheckResult {
    pub fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// A warning or critical limit: a plain number, or a string that may carry a
/// size suffix ("128M").
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Bound {
    Count(u64),
    Text(String),
}

impl Bound {
    /// Numeric value of the bound.
    ///
    /// With `normalize` a text bound goes through [`human_to_bytes`]; without
    /// it the text must be a plain integer.
    pub fn resolve(&self, normalize: bool) -> AppResult<u64> {
        match self {
            Bound::Count(n) => Ok(*n),
            Bound::Text(s) if normalize => human_to_bytes(s),
            Bound::Text(s) => s
                .trim()
                .parse::<u64>()
                .map_err(|_| AppError::Format(format!("'{s}' is not a plain count"))),
        }
    }
}

impl From<u64> for Bound {
    fn from(n: u64) -> Self {
        Bound::Count(n)
    }
}

impl From<&str> for Bound {
    fn from(s: &str) -> Self {
        Bound::Text(s.to_string())
    }
}

/// Warning / critical pair. Either side may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdSpec {
    pub warn: Option<Bound>,
    pub crit: Option<Bound>,
}

impl ThresholdSpec {
    pub fn new(warn: Option<Bound>, crit: Option<Bound>) -> Self {
        Self { warn, crit }
    }
}

/// Check operations understood by [`crate::checks::CheckSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum CheckKind {
    #[serde(rename = "used_memory")]
    UsedMemory,
    #[serde(rename = "used_memory_rss")]
    UsedMemoryRss,
    #[serde(rename = "llen", alias = "list_length")]
    ListLength,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::UsedMemory => "used_memory",
            CheckKind::UsedMemoryRss => "used_memory_rss",
            CheckKind::ListLength => "llen",
        }
    }

    /// Whether bounds for this check are byte sizes rather than counts.
    pub fn normalizes_bounds(&self) -> bool {
        matches!(self, CheckKind::UsedMemory | CheckKind::UsedMemoryRss)
    }
}

/// One `[[checks]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckConfig {
    #[serde(rename = "type")]
    pub kind: CheckKind,

    /// Display name; defaults to the check type.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub warn: Option<Bound>,

    #[serde(default)]
    pub crit: Option<Bound>,

    /// List key, required by `llen`.
    #[serde(default)]
    pub key: Option<String>,
}

impl CheckConfig {
    pub fn new(kind: CheckKind, warn: Option<Bound>, crit: Option<Bound>) -> Self {
        Self {
            kind,
            name: None,
            warn,
            crit,
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.kind.as_str())
    }

    pub fn thresholds(&self) -> ThresholdSpec {
        ThresholdSpec::new(self.warn.clone(), self.crit.clone())
    }
}

/// Result of one check within a run. Errors stay errors: they are not folded
/// into a status.
#[derive(Debug)]
pub struct CheckOutcome {
    pub name: String,
    pub result: AppResult<CheckResult>,
}
