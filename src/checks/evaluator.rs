// src/checks/evaluator.rs

use crate::checks::types::{Status, ThresholdSpec};
use crate::error::AppResult;

/// Warning / critical limits resolved to plain numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThresholdEvaluator {
    warn: Option<u64>,
    crit: Option<u64>,
}

impl ThresholdEvaluator {
    /// Resolve both bounds of `spec`.
    ///
    /// `normalize` sends text bounds through the size parser ("128M" -> bytes);
    /// otherwise they must be plain counts.
    pub fn new(spec: &ThresholdSpec, normalize: bool) -> AppResult<Self> {
        Ok(Self {
            warn: spec.warn.as_ref().map(|b| b.resolve(normalize)).transpose()?,
            crit: spec.crit.as_ref().map(|b| b.resolve(normalize)).transpose()?,
        })
    }

    /// Higher is worse, bounds are inclusive.
    ///
    /// Rules (in priority order):
    /// 1) critical configured and value >= critical -> Critical
    /// 2) warning configured and value >= warning -> Warning
    /// 3) Ok
    ///
    /// An absent bound simply does not trigger its rule.
    pub fn evaluate(&self, value: u64) -> Status {
        if let Some(crit) = self.crit {
            if value >= crit {
                return Status::Critical;
            }
        }

        if let Some(warn) = self.warn {
            if value >= warn {
                return Status::Warning;
            }
        }

        Status::Ok
    }
}

/// One-shot form of [`ThresholdEvaluator`].
pub fn evaluate(value: u64, spec: &ThresholdSpec, normalize: bool) -> AppResult<Status> {
    Ok(ThresholdEvaluator::new(spec, normalize)?.evaluate(value))
}
