// src/checks/set.rs

use crate::checks::evaluator::ThresholdEvaluator;
use crate::checks::metrics::CheckMetrics;
use crate::checks::snapshot::SnapshotCache;
use crate::checks::types::{CheckConfig, CheckKind, CheckOutcome, CheckResult};
use crate::error::{AppError, AppResult};
use crate::redis::config::ConnectionConfig;
use crate::redis::resolver::EndpointResolver;
use crate::units::bytes_to_human;
use std::time::Instant;
use tracing::{info, warn};

/// The Redis checks bound to one connection config.
///
/// Holds no per-run state: every run gets its own [`SnapshotCache`] from
/// [`CheckSet::context`], so runs never share a snapshot or a connection.
#[derive(Debug)]
pub struct CheckSet {
    connection: ConnectionConfig,
    resolver: EndpointResolver,
    metrics: CheckMetrics,
}

impl CheckSet {
    /// Fails with `DependencyUnavailable` when the config needs sentinel
    /// discovery and the resolver has none.
    pub fn new(
        connection: ConnectionConfig,
        resolver: EndpointResolver,
        metrics: CheckMetrics,
    ) -> AppResult<Self> {
        resolver.ensure_supports(&connection)?;
        Ok(Self {
            connection,
            resolver,
            metrics,
        })
    }

    pub fn metrics(&self) -> &CheckMetrics {
        &self.metrics
    }

    /// Fresh evaluation context (one per scheduler tick).
    pub fn context(&self) -> SnapshotCache<'_> {
        SnapshotCache::new(&self.resolver, &self.connection, &self.metrics)
    }

    /// `used_memory` against human-size bounds; the message echoes the
    /// server's own `used_memory_human`.
    pub async fn used_memory(
        &self,
        ctx: &mut SnapshotCache<'_>,
        check: &CheckConfig,
    ) -> AppResult<CheckResult> {
        let evaluator = ThresholdEvaluator::new(&check.thresholds(), true)?;
        let snapshot = ctx.get().await?;

        let used = snapshot.get_u64("used_memory")?;
        let human = snapshot.get("used_memory_human")?;

        Ok(CheckResult::new(
            evaluator.evaluate(used),
            format!("Used memory: {human}"),
        ))
    }

    /// `used_memory_rss` against human-size bounds. INFO has no human RSS
    /// field, so the message formats it here.
    pub async fn used_memory_rss(
        &self,
        ctx: &mut SnapshotCache<'_>,
        check: &CheckConfig,
    ) -> AppResult<CheckResult> {
        let evaluator = ThresholdEvaluator::new(&check.thresholds(), true)?;
        let snapshot = ctx.get().await?;

        let rss = snapshot.get_u64("used_memory_rss")?;

        Ok(CheckResult::new(
            evaluator.evaluate(rss),
            format!("Used memory RSS: {}", bytes_to_human(rss)),
        ))
    }

    /// `LLEN key` against plain-count bounds, on its own connection.
    pub async fn list_length(&self, check: &CheckConfig) -> AppResult<CheckResult> {
        let key = check
            .key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| AppError::MissingKey(check.name().to_string()))?;
        let evaluator = ThresholdEvaluator::new(&check.thresholds(), false)?;

        let mut handle = self.resolver.resolve(&self.connection).await?;
        let items = handle.llen(key).await?;

        Ok(CheckResult::new(
            evaluator.evaluate(items),
            format!("{items} items in key {key}"),
        ))
    }

    /// Run one check inside `ctx`, recording metrics and logging the verdict.
    pub async fn run_check(
        &self,
        ctx: &mut SnapshotCache<'_>,
        check: &CheckConfig,
    ) -> AppResult<CheckResult> {
        let t0 = Instant::now();

        let result = match check.kind {
            CheckKind::UsedMemory => self.used_memory(ctx, check).await,
            CheckKind::UsedMemoryRss => self.used_memory_rss(ctx, check).await,
            CheckKind::ListLength => self.list_length(check).await,
        };

        let name = check.name();
        self.metrics
            .observe_check(name, &result, t0.elapsed().as_secs_f64());

        match &result {
            Ok(r) => info!(check = %name, status = %r.status, message = %r.message, "check evaluated"),
            Err(e) => warn!(check = %name, error = %e, "check failed"),
        }

        result
    }

    /// Run `checks` in order within one fresh context. A failing check does
    /// not stop the ones after it.
    pub async fn run_all(&self, checks: &[CheckConfig]) -> Vec<CheckOutcome> {
        let mut ctx = self.context();
        let mut outcomes = Vec::with_capacity(checks.len());

        for check in checks {
            let result = self.run_check(&mut ctx, check).await;
            outcomes.push(CheckOutcome {
                name: check.name().to_string(),
                result,
            });
        }

        outcomes
    }
}
