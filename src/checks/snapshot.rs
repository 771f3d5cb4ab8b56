// src/checks/snapshot.rs

use crate::checks::metrics::CheckMetrics;
use crate::error::{AppError, AppResult};
use crate::redis::client::ServerInfo;
use crate::redis::config::ConnectionConfig;
use crate::redis::resolver::EndpointResolver;
use std::time::SystemTime;
use tracing::debug;

/// One INFO capture.
#[derive(Debug, Clone)]
pub struct Snapshot {
    info: ServerInfo,
    fetched_at: SystemTime,
}

impl Snapshot {
    pub fn new(info: ServerInfo) -> Self {
        Self {
            info,
            fetched_at: SystemTime::now(),
        }
    }

    pub fn fetched_at(&self) -> SystemTime {
        self.fetched_at
    }

    pub fn get(&self, field: &str) -> AppResult<&str> {
        self.info.get(field).ok_or_else(|| AppError::InfoField {
            field: field.to_string(),
            reason: "missing from INFO reply".into(),
        })
    }

    pub fn get_u64(&self, field: &str) -> AppResult<u64> {
        let raw = self.get(field)?;
        raw.parse().map_err(|_| AppError::InfoField {
            field: field.to_string(),
            reason: format!("'{raw}' is not an unsigned integer"),
        })
    }
}

#[derive(Debug)]
enum CacheState {
    Empty,
    Ready(Snapshot),
    /// The one fetch of this context failed; siblings see the same failure.
    Failed(String),
}

/// Per-evaluation-context INFO cache.
///
/// The first [`SnapshotCache::get`] resolves a connection and issues INFO; later
/// calls reuse the result. At most one INFO per cache, success or not. Create
/// one per scheduler tick and drop it afterwards.
#[derive(Debug)]
pub struct SnapshotCache<'a> {
    resolver: &'a EndpointResolver,
    connection: &'a ConnectionConfig,
    metrics: &'a CheckMetrics,
    state: CacheState,
}

impl<'a> SnapshotCache<'a> {
    pub fn new(
        resolver: &'a EndpointResolver,
        connection: &'a ConnectionConfig,
        metrics: &'a CheckMetrics,
    ) -> Self {
        Self {
            resolver,
            connection,
            metrics,
            state: CacheState::Empty,
        }
    }

    pub fn is_fetched(&self) -> bool {
        !matches!(self.state, CacheState::Empty)
    }

    pub async fn get(&mut self) -> AppResult<&Snapshot> {
        if let CacheState::Empty = self.state {
            debug!("snapshot cache miss, querying INFO");
            match self.fetch().await {
                Ok(snapshot) => self.state = CacheState::Ready(snapshot),
                Err(e) => {
                    self.state = CacheState::Failed(e.to_string());
                    return Err(e);
                }
            }
        } else {
            debug!("snapshot cache hit");
        }

        match &self.state {
            CacheState::Ready(snapshot) => Ok(snapshot),
            CacheState::Failed(reason) => Err(AppError::SnapshotUnavailable(reason.clone())),
            CacheState::Empty => Err(AppError::SnapshotUnavailable("not fetched".into())),
        }
    }

    async fn fetch(&self) -> AppResult<Snapshot> {
        let mut handle = self.resolver.resolve(self.connection).await?;
        self.metrics.inc_info_query();
        let info = handle.info().await?;
        debug!(endpoint = %handle.endpoint(), fields = info.len(), "INFO snapshot fetched");
        Ok(Snapshot::new(info))
    }
}
