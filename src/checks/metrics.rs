// src/checks/metrics.rs

use crate::checks::types::CheckResult;
use crate::error::AppResult;

#[cfg(feature = "metrics")]
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone, Debug)]
pub struct CheckMetrics {
    #[cfg(feature = "metrics")]
    registry: Registry,

    // --------------------------------------------
    // Verdicts
    // --------------------------------------------
    /// Completed checks, labeled by check name and status.
    #[cfg(feature = "metrics")]
    pub runs_total: IntCounterVec,

    /// Checks that ended in an error instead of a status.
    #[cfg(feature = "metrics")]
    pub errors_total: IntCounterVec,

    // --------------------------------------------
    // Remote work
    // --------------------------------------------
    /// INFO round trips issued by snapshot caches.
    #[cfg(feature = "metrics")]
    pub info_queries_total: IntCounter,

    #[cfg(feature = "metrics")]
    pub duration_seconds: HistogramVec,

    #[cfg(not(feature = "metrics"))]
    _noop: (),
}

impl CheckMetrics {
    pub fn new() -> AppResult<Self> {
        #[cfg(feature = "metrics")]
        {
            let registry = Registry::new();

            let runs_total = IntCounterVec::new(
                Opts::new("redis_check_runs_total", "Redis checks evaluated, by status"),
                &["check", "status"],
            )?;

            let errors_total = IntCounterVec::new(
                Opts::new(
                    "redis_check_errors_total",
                    "Redis checks that failed to produce a status",
                ),
                &["check"],
            )?;

            let info_queries_total = IntCounter::with_opts(Opts::new(
                "redis_info_queries_total",
                "INFO queries issued to Redis",
            ))?;

            // Local round trips sit in the low ms; sentinel lookups add a hop.
            let duration_seconds = HistogramVec::new(
                HistogramOpts::new("redis_check_duration_seconds", "Redis check duration (seconds)")
                    .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0]),
                &["check"],
            )?;

            registry.register(Box::new(runs_total.clone()))?;
            registry.register(Box::new(errors_total.clone()))?;
            registry.register(Box::new(info_queries_total.clone()))?;
            registry.register(Box::new(duration_seconds.clone()))?;

            Ok(Self {
                registry,
                runs_total,
                errors_total,
                info_queries_total,
                duration_seconds,
            })
        }

        #[cfg(not(feature = "metrics"))]
        {
            Ok(Self { _noop: () })
        }
    }

    /// Prometheus text exposition. Empty when built without `metrics`.
    pub fn encode_text(&self) -> AppResult<String> {
        #[cfg(feature = "metrics")]
        {
            let mf = self.registry.gather();
            let mut buf = Vec::new();
            TextEncoder::new().encode(&mf, &mut buf)?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        }

        #[cfg(not(feature = "metrics"))]
        {
            Ok(String::new())
        }
    }

    // ------------------------------------------------------------
    // No-op helpers (compile away when metrics feature is off)
    // ------------------------------------------------------------

    #[inline]
    pub fn inc_info_query(&self) {
        #[cfg(feature = "metrics")]
        self.info_queries_total.inc();
    }

    /// Records one finished check.
    #[inline]
    pub fn observe_check(&self, _check: &str, _result: &AppResult<CheckResult>, _secs: f64) {
        #[cfg(feature = "metrics")]
        {
            match _result {
                Ok(r) => self
                    .runs_total
                    .with_label_values(&[_check, r.status.as_str()])
                    .inc(),
                Err(_) => self.errors_total.with_label_values(&[_check]).inc(),
            }
            self.duration_seconds
                .with_label_values(&[_check])
                .observe(_secs);
        }
    }
}
