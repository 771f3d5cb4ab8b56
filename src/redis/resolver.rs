// src/redis/resolver.rs

use crate::error::{AppError, AppResult};
use crate::redis::client::{RedisConnector, ServerInfo};
use crate::redis::config::{ConnectionConfig, DiscoveryParams, NodeParams};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A live handle to one Redis node: the two commands the checks need.
///
/// Dropping the handle releases its connection.
#[async_trait]
pub trait StoreHandle: Send {
    /// `host:port` of the node, for logs and errors.
    fn endpoint(&self) -> &str;

    /// `INFO`, parsed.
    async fn info(&mut self) -> AppResult<ServerInfo>;

    /// `LLEN key`.
    async fn llen(&mut self, key: &str) -> AppResult<u64>;
}

/// Builds direct handles. Construction is lazy: connection errors surface on
/// the first command.
pub trait StoreConnector: Send + Sync {
    fn connect(&self, node: &NodeParams) -> AppResult<Box<dyn StoreHandle>>;
}

/// "Which node serves group G right now?"
#[async_trait]
pub trait Discovery: Send + Sync {
    async fn primary_for(
        &self,
        params: &DiscoveryParams,
        group: &str,
    ) -> AppResult<Box<dyn StoreHandle>>;

    async fn replica_for(
        &self,
        params: &DiscoveryParams,
        group: &str,
    ) -> AppResult<Box<dyn StoreHandle>>;
}

/// Turns a [`ConnectionConfig`] into a [`StoreHandle`], direct or through
/// discovery. The config is only borrowed; resolving twice from the same
/// config gives the same answer.
#[derive(Clone)]
pub struct EndpointResolver {
    connector: Arc<dyn StoreConnector>,
    discovery: Option<Arc<dyn Discovery>>,
}

impl EndpointResolver {
    pub fn new(connector: Arc<dyn StoreConnector>, discovery: Option<Arc<dyn Discovery>>) -> Self {
        Self {
            connector,
            discovery,
        }
    }

    /// Resolver backed by the `redis` crate. Sentinel discovery is present
    /// only when built with the `sentinel` feature.
    pub fn redis() -> Self {
        let connector = Arc::new(RedisConnector);

        #[cfg(feature = "sentinel")]
        let discovery: Option<Arc<dyn Discovery>> =
            Some(Arc::new(crate::redis::sentinel::SentinelDiscovery::redis()));
        #[cfg(not(feature = "sentinel"))]
        let discovery: Option<Arc<dyn Discovery>> = None;

        Self::new(connector, discovery)
    }

    pub fn has_discovery(&self) -> bool {
        self.discovery.is_some()
    }

    /// Fails when `cfg` needs a capability this resolver lacks.
    pub fn ensure_supports(&self, cfg: &ConnectionConfig) -> AppResult<()> {
        if cfg.is_sentinel() && self.discovery.is_none() {
            return Err(AppError::DependencyUnavailable {
                component: "sentinel discovery",
                feature: "sentinel",
            });
        }
        Ok(())
    }

    pub async fn resolve(&self, cfg: &ConnectionConfig) -> AppResult<Box<dyn StoreHandle>> {
        if !cfg.is_sentinel() {
            let node = cfg.node_params();
            debug!(endpoint = %node.endpoint(), "resolving direct endpoint");
            return self.connector.connect(&node);
        }

        let discovery = self
            .discovery
            .as_ref()
            .ok_or(AppError::DependencyUnavailable {
                component: "sentinel discovery",
                feature: "sentinel",
            })?;

        let group = cfg.group_name()?;
        let params = cfg.discovery_params()?;

        debug!(
            group = %group,
            use_master = cfg.use_master,
            sentinels = params.sentinels.len(),
            "resolving endpoint via sentinel"
        );

        if cfg.use_master {
            discovery.primary_for(&params, group).await
        } else {
            discovery.replica_for(&params, group).await
        }
    }
}

impl fmt::Debug for EndpointResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointResolver")
            .field("discovery", &self.has_discovery())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fakes::{FakeConnector, FakeDiscovery, FakeStore};

    fn sentinel_cfg(use_master: bool) -> ConnectionConfig {
        ConnectionConfig {
            sentinels: vec!["127.0.0.1:26379".into()],
            master_name: Some("mymaster".into()),
            use_master,
            ..ConnectionConfig::default()
        }
    }

    #[tokio::test]
    async fn direct_mode_uses_host_and_port() {
        let store = FakeStore::default();
        let connector = Arc::new(FakeConnector::new(store.clone()));
        let resolver = EndpointResolver::new(connector.clone(), None);

        let cfg = ConnectionConfig {
            host: "redis.internal".into(),
            port: 6380,
            ..ConnectionConfig::default()
        };
        let handle = resolver.resolve(&cfg).await.unwrap();

        assert_eq!(handle.endpoint(), "redis.internal:6380");
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn sentinel_mode_picks_replica_by_default() {
        let discovery = Arc::new(FakeDiscovery::new(FakeStore::default()));
        let resolver = EndpointResolver::new(
            Arc::new(FakeConnector::new(FakeStore::default())),
            Some(discovery.clone()),
        );

        let handle = resolver.resolve(&sentinel_cfg(false)).await.unwrap();
        assert_eq!(handle.endpoint(), "replica-of-mymaster:6379");
        assert_eq!(discovery.calls(), vec!["replica:mymaster".to_string()]);
    }

    #[tokio::test]
    async fn sentinel_mode_picks_primary_when_asked() {
        let discovery = Arc::new(FakeDiscovery::new(FakeStore::default()));
        let resolver = EndpointResolver::new(
            Arc::new(FakeConnector::new(FakeStore::default())),
            Some(discovery.clone()),
        );

        let handle = resolver.resolve(&sentinel_cfg(true)).await.unwrap();
        assert_eq!(handle.endpoint(), "primary-of-mymaster:6379");
    }

    #[tokio::test]
    async fn config_is_reusable_across_resolutions() {
        let discovery = Arc::new(FakeDiscovery::new(FakeStore::default()));
        let resolver = EndpointResolver::new(
            Arc::new(FakeConnector::new(FakeStore::default())),
            Some(discovery.clone()),
        );

        let cfg = sentinel_cfg(true);
        let before = cfg.clone();
        resolver.resolve(&cfg).await.unwrap();
        resolver.resolve(&cfg).await.unwrap();

        assert_eq!(cfg, before);
        assert_eq!(
            discovery.calls(),
            vec!["primary:mymaster".to_string(), "primary:mymaster".to_string()]
        );
    }

    #[tokio::test]
    async fn sentinel_without_group_is_config_error() {
        let discovery = Arc::new(FakeDiscovery::new(FakeStore::default()));
        let resolver = EndpointResolver::new(
            Arc::new(FakeConnector::new(FakeStore::default())),
            Some(discovery.clone()),
        );

        let mut cfg = sentinel_cfg(false);
        cfg.master_name = None;
        let err = resolver.resolve(&cfg).await.err().unwrap();

        assert!(matches!(err, AppError::MissingConfig("master_name")));
        assert!(discovery.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_discovery_is_dependency_error() {
        let resolver = EndpointResolver::new(Arc::new(FakeConnector::new(FakeStore::default())), None);
        let cfg = sentinel_cfg(false);

        assert!(matches!(
            resolver.ensure_supports(&cfg),
            Err(AppError::DependencyUnavailable { .. })
        ));
        assert!(matches!(
            resolver.resolve(&cfg).await.err().unwrap(),
            AppError::DependencyUnavailable { .. }
        ));
        resolver
            .ensure_supports(&ConnectionConfig::default())
            .unwrap();
    }

    #[tokio::test]
    async fn discovery_errors_propagate() {
        let discovery = Arc::new(FakeDiscovery::failing(|| {
            AppError::GroupNotFound("mymaster".into())
        }));
        let resolver = EndpointResolver::new(
            Arc::new(FakeConnector::new(FakeStore::default())),
            Some(discovery),
        );

        assert!(matches!(
            resolver.resolve(&sentinel_cfg(false)).await.err().unwrap(),
            AppError::GroupNotFound(_)
        ));
    }
}
