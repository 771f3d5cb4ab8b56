// src/redis/sentinel.rs

use crate::error::{AppError, AppResult};
use crate::redis::client::RedisConnector;
use crate::redis::config::{DiscoveryParams, NodeParams};
use crate::redis::resolver::{Discovery, StoreConnector, StoreHandle};
use async_trait::async_trait;
use rand::Rng;
use redis::FromRedisValue;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Node flags that make a primary or replica unusable.
const UNHEALTHY_FLAGS: [&str; 3] = ["s_down", "o_down", "disconnected"];

/// Raw `SENTINEL` queries against one sentinel node.
///
/// Transport failures must come back as `Connection` and error replies as
/// `Redis`; discovery treats the first as "unreachable" and the second as
/// "answered".
#[async_trait]
pub trait SentinelClient: Send + Sync {
    /// `SENTINEL get-master-addr-by-name <group>`: `[ip, port]`, nil if unknown.
    async fn master_addr(
        &self,
        sentinel: &NodeParams,
        group: &str,
    ) -> AppResult<Option<(String, String)>>;

    /// `SENTINEL master <group>`: flat `[field, value, ...]`.
    async fn master(&self, sentinel: &NodeParams, group: &str) -> AppResult<Vec<String>>;

    /// `SENTINEL replicas <group>`: one flat array per replica.
    async fn replicas(&self, sentinel: &NodeParams, group: &str) -> AppResult<Vec<Vec<String>>>;
}

impl RedisConnector {
    async fn sentinel_query<T>(
        &self,
        sentinel: &NodeParams,
        subcommand: &str,
        group: &str,
    ) -> AppResult<T>
    where
        T: FromRedisValue + Send,
    {
        let mut cmd = redis::cmd("SENTINEL");
        cmd.arg(subcommand).arg(group);
        self.open(sentinel)?.query(&cmd).await
    }
}

#[async_trait]
impl SentinelClient for RedisConnector {
    async fn master_addr(
        &self,
        sentinel: &NodeParams,
        group: &str,
    ) -> AppResult<Option<(String, String)>> {
        self.sentinel_query(sentinel, "get-master-addr-by-name", group)
            .await
    }

    async fn master(&self, sentinel: &NodeParams, group: &str) -> AppResult<Vec<String>> {
        self.sentinel_query(sentinel, "master", group).await
    }

    async fn replicas(&self, sentinel: &NodeParams, group: &str) -> AppResult<Vec<Vec<String>>> {
        self.sentinel_query(sentinel, "replicas", group).await
    }
}

/// One question asked of each sentinel in turn. `Ok(None)` means the sentinel
/// answered but does not know the group.
#[async_trait]
trait SentinelQuery: Sync {
    type Answer: Send;

    async fn ask(
        &self,
        client: &dyn SentinelClient,
        sentinel: &NodeParams,
        group: &str,
    ) -> AppResult<Option<Self::Answer>>;
}

/// Current primary address; refuses one the sentinel sees as down.
struct PrimaryQuery;

#[async_trait]
impl SentinelQuery for PrimaryQuery {
    type Answer = (String, u16);

    async fn ask(
        &self,
        client: &dyn SentinelClient,
        sentinel: &NodeParams,
        group: &str,
    ) -> AppResult<Option<(String, u16)>> {
        let Some((host, port)) = parse_master_addr(client.master_addr(sentinel, group).await?)
        else {
            return Ok(None);
        };

        let state = client.master(sentinel, group).await?;
        if let Some(flags) = down_flags(&state) {
            return Err(AppError::PrimaryDown {
                group: group.to_string(),
                endpoint: format!("{host}:{port}"),
                flags,
            });
        }

        Ok(Some((host, port)))
    }
}

/// Healthy replicas; possibly empty.
struct ReplicasQuery;

#[async_trait]
impl SentinelQuery for ReplicasQuery {
    type Answer = Vec<(String, u16)>;

    async fn ask(
        &self,
        client: &dyn SentinelClient,
        sentinel: &NodeParams,
        group: &str,
    ) -> AppResult<Option<Vec<(String, u16)>>> {
        Ok(Some(healthy_replicas(client.replicas(sentinel, group).await?)))
    }
}

/// Discovery through Redis Sentinel.
///
/// Sentinels are asked in configured order. An unreachable sentinel is skipped;
/// one that answers but does not know the group counts as an answer.
#[derive(Clone)]
pub struct SentinelDiscovery {
    client: Arc<dyn SentinelClient>,
    connector: Arc<dyn StoreConnector>,
}

impl SentinelDiscovery {
    pub fn new(client: Arc<dyn SentinelClient>, connector: Arc<dyn StoreConnector>) -> Self {
        Self { client, connector }
    }

    /// Sentinel queries and node handles both over the `redis` crate.
    pub fn redis() -> Self {
        Self::new(Arc::new(RedisConnector), Arc::new(RedisConnector))
    }

    async fn first_answer<Q: SentinelQuery>(
        &self,
        params: &DiscoveryParams,
        group: &str,
        query: &Q,
    ) -> AppResult<Q::Answer> {
        let mut answered = false;
        let mut failures = Vec::new();

        for (host, port) in &params.sentinels {
            let node = sentinel_node(params, host, *port);
            let endpoint = node.endpoint();

            match query.ask(self.client.as_ref(), &node, group).await {
                Ok(Some(found)) => return Ok(found),
                Ok(None) => {
                    answered = true;
                    debug!(sentinel = %endpoint, group = %group, "sentinel does not know group");
                }
                Err(AppError::Redis(e)) => {
                    answered = true;
                    debug!(sentinel = %endpoint, group = %group, error = %e, "sentinel rejected query");
                }
                Err(e @ AppError::Connection { .. }) => {
                    warn!(sentinel = %endpoint, error = %e, "sentinel unreachable");
                    failures.push(format!("{endpoint}: {e}"));
                }
                Err(e) => return Err(e),
            }
        }

        if answered {
            Err(AppError::GroupNotFound(group.to_string()))
        } else {
            Err(AppError::DiscoveryUnavailable(failures.join("; ")))
        }
    }
}

#[async_trait]
impl Discovery for SentinelDiscovery {
    async fn primary_for(
        &self,
        params: &DiscoveryParams,
        group: &str,
    ) -> AppResult<Box<dyn StoreHandle>> {
        let (host, port) = self.first_answer(params, group, &PrimaryQuery).await?;
        debug!(group = %group, primary = %format!("{host}:{port}"), "sentinel resolved primary");
        self.connector.connect(&params.node.at(host, port))
    }

    async fn replica_for(
        &self,
        params: &DiscoveryParams,
        group: &str,
    ) -> AppResult<Box<dyn StoreHandle>> {
        let replicas = self.first_answer(params, group, &ReplicasQuery).await?;

        if replicas.is_empty() {
            debug!(group = %group, "no healthy replica, falling back to primary");
            return self.primary_for(params, group).await;
        }

        let pick = rand::rng().random_range(0..replicas.len());
        let (host, port) = &replicas[pick];
        debug!(group = %group, replica = %format!("{host}:{port}"), "sentinel resolved replica");
        self.connector.connect(&params.node.at(host.clone(), *port))
    }
}

/// Sentinels take their own password and have no databases.
fn sentinel_node(params: &DiscoveryParams, host: &str, port: u16) -> NodeParams {
    NodeParams {
        host: host.to_string(),
        port,
        db: 0,
        username: None,
        password: params.sentinel_password.clone(),
        timeouts: params.node.timeouts,
    }
}

fn parse_master_addr(reply: Option<(String, String)>) -> Option<(String, u16)> {
    let (host, port) = reply?;
    Some((host, port.parse().ok()?))
}

fn field_map(entry: Vec<String>) -> HashMap<String, String> {
    entry
        .chunks_exact(2)
        .map(|kv| (kv[0].clone(), kv[1].clone()))
        .collect()
}

fn is_unhealthy(flags: &str) -> bool {
    flags.split(',').any(|f| UNHEALTHY_FLAGS.contains(&f))
}

/// The `flags` value of a `SENTINEL master` reply, if it marks the node down.
fn down_flags(state: &[String]) -> Option<String> {
    let fields = field_map(state.to_vec());
    let flags = fields.get("flags")?;
    is_unhealthy(flags).then(|| flags.clone())
}

fn healthy_replicas(raw: Vec<Vec<String>>) -> Vec<(String, u16)> {
    raw.into_iter()
        .filter_map(|entry| {
            let fields = field_map(entry);

            let flags = fields.get("flags").map(String::as_str).unwrap_or("");
            if is_unhealthy(flags) {
                return None;
            }

            let host = fields.get("ip")?.clone();
            let port = fields.get("port")?.parse().ok()?;
            Some((host, port))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis::config::Timeouts;
    use crate::tests::fakes::{FakeConnector, FakeStore};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    fn replica(ip: &str, port: &str, flags: &str) -> Vec<String> {
        let name = format!("{ip}:{port}");
        pairs(&["name", name.as_str(), "ip", ip, "port", port, "flags", flags])
    }

    fn pairs(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn params(sentinels: Vec<(String, u16)>) -> DiscoveryParams {
        DiscoveryParams {
            sentinels,
            sentinel_password: Some("sentinel-pw".into()),
            node: NodeParams {
                host: "ignored".into(),
                port: 6379,
                db: 3,
                username: None,
                password: Some("node-pw".into()),
                timeouts: Timeouts {
                    connect: Duration::from_millis(200),
                    command: Duration::from_millis(200),
                },
            },
        }
    }

    fn sentinels(ports: &[u16]) -> DiscoveryParams {
        params(ports.iter().map(|p| ("10.0.0.1".to_string(), *p)).collect())
    }

    /// How one scripted sentinel behaves.
    #[derive(Clone)]
    enum Behaviour {
        Unreachable,
        Knows {
            primary: (String, String),
            primary_flags: String,
            replicas: Vec<Vec<String>>,
        },
        Unknown,
    }

    fn knows(primary_flags: &str, replicas: Vec<Vec<String>>) -> Behaviour {
        Behaviour::Knows {
            primary: ("10.0.0.5".into(), "6379".into()),
            primary_flags: primary_flags.into(),
            replicas,
        }
    }

    /// Sentinels keyed by port; records which ones were asked, in order.
    struct ScriptedSentinels {
        by_port: HashMap<u16, Behaviour>,
        asked: Mutex<Vec<u16>>,
    }

    impl ScriptedSentinels {
        fn new(script: &[(u16, Behaviour)]) -> Arc<Self> {
            Arc::new(Self {
                by_port: script.iter().cloned().collect(),
                asked: Mutex::new(Vec::new()),
            })
        }

        fn asked(&self) -> Vec<u16> {
            self.asked.lock().unwrap().clone()
        }

        fn behaviour(&self, sentinel: &NodeParams) -> AppResult<Behaviour> {
            assert_eq!(sentinel.password.as_deref(), Some("sentinel-pw"));
            self.asked.lock().unwrap().push(sentinel.port);
            match self.by_port.get(&sentinel.port) {
                Some(Behaviour::Unreachable) | None => {
                    Err(AppError::connection(sentinel.endpoint(), "connection refused"))
                }
                Some(b) => Ok(b.clone()),
            }
        }
    }

    #[async_trait]
    impl SentinelClient for ScriptedSentinels {
        async fn master_addr(
            &self,
            sentinel: &NodeParams,
            _group: &str,
        ) -> AppResult<Option<(String, String)>> {
            Ok(match self.behaviour(sentinel)? {
                Behaviour::Knows { primary, .. } => Some(primary),
                _ => None,
            })
        }

        async fn master(&self, sentinel: &NodeParams, _group: &str) -> AppResult<Vec<String>> {
            Ok(match self.behaviour(sentinel)? {
                Behaviour::Knows { primary_flags, .. } => {
                    pairs(&["name", "mymaster", "flags", primary_flags.as_str()])
                }
                _ => Vec::new(),
            })
        }

        async fn replicas(
            &self,
            sentinel: &NodeParams,
            _group: &str,
        ) -> AppResult<Vec<Vec<String>>> {
            Ok(match self.behaviour(sentinel)? {
                Behaviour::Knows { replicas, .. } => replicas,
                _ => Vec::new(),
            })
        }
    }

    fn discovery(client: Arc<ScriptedSentinels>) -> SentinelDiscovery {
        SentinelDiscovery::new(client, Arc::new(FakeConnector::new(FakeStore::default())))
    }

    #[test]
    fn master_addr_reply() {
        assert_eq!(
            parse_master_addr(Some(("10.0.0.5".into(), "6379".into()))),
            Some(("10.0.0.5".to_string(), 6379))
        );
        assert_eq!(parse_master_addr(None), None);
        assert_eq!(parse_master_addr(Some(("10.0.0.5".into(), "x".into()))), None);
    }

    #[test]
    fn skips_down_replicas() {
        let raw = vec![
            replica("10.0.0.6", "6379", "slave,s_down"),
            replica("10.0.0.7", "6379", "slave"),
            replica("10.0.0.8", "6379", "slave,disconnected"),
            replica("10.0.0.9", "6380", "slave"),
        ];
        assert_eq!(
            healthy_replicas(raw),
            vec![("10.0.0.7".to_string(), 6379), ("10.0.0.9".to_string(), 6380)]
        );
    }

    #[test]
    fn skips_malformed_replicas() {
        let raw = vec![
            vec!["ip".to_string(), "10.0.0.1".to_string()],
            replica("10.0.0.2", "not-a-port", "slave"),
        ];
        assert!(healthy_replicas(raw).is_empty());
    }

    #[test]
    fn primary_state_flags() {
        assert_eq!(down_flags(&pairs(&["flags", "master"])), None);
        assert_eq!(
            down_flags(&pairs(&["flags", "master,o_down"])),
            Some("master,o_down".to_string())
        );
        assert_eq!(down_flags(&[]), None);
    }

    #[test]
    fn sentinel_connection_uses_sentinel_credentials() {
        let p = params(vec![]);
        let node = sentinel_node(&p, "10.0.0.1", 26379);
        assert_eq!(node.endpoint(), "10.0.0.1:26379");
        assert_eq!(node.password.as_deref(), Some("sentinel-pw"));
        assert_eq!(node.db, 0);
    }

    #[tokio::test]
    async fn nil_answer_is_group_not_found() {
        let client = ScriptedSentinels::new(&[(26379, Behaviour::Unknown)]);
        let err = discovery(client)
            .primary_for(&sentinels(&[26379]), "mymaster")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AppError::GroupNotFound(ref g) if g == "mymaster"));
    }

    #[tokio::test]
    async fn unreachable_then_nil_is_group_not_found() {
        let client = ScriptedSentinels::new(&[
            (26379, Behaviour::Unreachable),
            (26380, Behaviour::Unknown),
        ]);
        let err = discovery(client.clone())
            .primary_for(&sentinels(&[26379, 26380]), "mymaster")
            .await
            .err()
            .unwrap();

        assert!(matches!(err, AppError::GroupNotFound(_)), "unexpected error: {err}");
        assert_eq!(client.asked(), vec![26379, 26380]);
    }

    #[tokio::test]
    async fn sentinels_are_asked_in_order_until_one_knows() {
        let client = ScriptedSentinels::new(&[
            (26379, Behaviour::Unreachable),
            (26380, knows("master", vec![])),
            (26381, knows("master", vec![])),
        ]);
        let handle = discovery(client.clone())
            .primary_for(&sentinels(&[26379, 26380, 26381]), "mymaster")
            .await
            .unwrap();

        assert_eq!(handle.endpoint(), "10.0.0.5:6379");
        // 26380 answers both the address and the state query.
        assert_eq!(client.asked(), vec![26379, 26380, 26380]);
    }

    #[tokio::test]
    async fn downed_primary_is_a_resolution_error() {
        let client = ScriptedSentinels::new(&[(26379, knows("master,s_down,o_down", vec![]))]);
        let err = discovery(client)
            .primary_for(&sentinels(&[26379]), "mymaster")
            .await
            .err()
            .unwrap();

        assert!(
            matches!(err, AppError::PrimaryDown { ref endpoint, .. } if endpoint == "10.0.0.5:6379"),
            "unexpected error: {err}"
        );
    }

    #[tokio::test]
    async fn no_healthy_replica_falls_back_to_primary() {
        let client = ScriptedSentinels::new(&[(
            26379,
            knows(
                "master",
                vec![
                    replica("10.0.0.6", "6379", "slave,s_down"),
                    replica("10.0.0.7", "6379", "slave,disconnected"),
                ],
            ),
        )]);
        let handle = discovery(client)
            .replica_for(&sentinels(&[26379]), "mymaster")
            .await
            .unwrap();

        assert_eq!(handle.endpoint(), "10.0.0.5:6379");
    }

    #[tokio::test]
    async fn replica_is_picked_among_healthy_ones() {
        let client = ScriptedSentinels::new(&[(
            26379,
            knows(
                "master",
                vec![
                    replica("10.0.0.6", "6379", "slave"),
                    replica("10.0.0.7", "6379", "slave,o_down"),
                    replica("10.0.0.8", "6379", "slave"),
                ],
            ),
        )]);
        let resolver = discovery(client);
        let p = sentinels(&[26379]);

        let mut seen = HashSet::new();
        for _ in 0..64 {
            let handle = resolver.replica_for(&p, "mymaster").await.unwrap();
            seen.insert(handle.endpoint().to_string());
        }

        let expected: HashSet<String> = ["10.0.0.6:6379", "10.0.0.8:6379"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn no_reachable_sentinel_is_discovery_unavailable() {
        let discovery = SentinelDiscovery::redis();
        let p = params(vec![("127.0.0.1".into(), 1), ("127.0.0.1".into(), 2)]);

        let err = discovery.primary_for(&p, "mymaster").await.err().unwrap();
        assert!(
            matches!(err, AppError::DiscoveryUnavailable(ref msg) if msg.contains("127.0.0.1:1")),
            "unexpected error: {err}"
        );
    }
}
