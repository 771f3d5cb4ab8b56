// src/redis/client.rs

use crate::error::{AppError, AppResult};
use crate::redis::config::{NodeParams, Timeouts};
use crate::redis::resolver::{StoreConnector, StoreHandle};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{
    ConnectionAddr, ConnectionInfo, FromRedisValue, IntoConnectionInfo, RedisConnectionInfo,
    RedisResult,
};
use std::collections::BTreeMap;
use tokio::time::timeout;

/// Opens [`RedisHandle`]s. Stateless; nothing touches the network until a
/// command is issued.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

impl RedisConnector {
    pub fn open(&self, node: &NodeParams) -> AppResult<RedisHandle> {
        let endpoint = node.endpoint();
        let client = node_info(node)
            .and_then(redis::Client::open)
            .map_err(|e| AppError::InvalidConfig(format!("invalid redis endpoint '{endpoint}': {e}")))?;

        Ok(RedisHandle {
            client,
            endpoint,
            timeouts: node.timeouts,
            conn: None,
        })
    }
}

impl StoreConnector for RedisConnector {
    fn connect(&self, node: &NodeParams) -> AppResult<Box<dyn StoreHandle>> {
        Ok(Box::new(self.open(node)?))
    }
}

/// Thin, "dumb" Redis handle:
/// - connects on first command, reuses that connection afterwards
/// - enforces connect / command timeouts at the wrapper boundary
///
/// No check policy belongs in here.
pub struct RedisHandle {
    client: redis::Client,
    endpoint: String,
    timeouts: Timeouts,
    conn: Option<MultiplexedConnection>,
}

impl RedisHandle {
    async fn connection(&mut self) -> AppResult<MultiplexedConnection> {
        if let Some(conn) = &self.conn {
            return Ok(conn.clone());
        }

        let conn = timeout(
            self.timeouts.connect,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            AppError::connection(
                &self.endpoint,
                format!("connect timeout after {:?}", self.timeouts.connect),
            )
        })?
        .map_err(|e| AppError::connection(&self.endpoint, e))?;

        self.conn = Some(conn.clone());
        Ok(conn)
    }

    /// Run one command with the command timeout.
    ///
    /// Transport failures map to `Connection`; error replies from the server
    /// stay `Redis`.
    pub async fn query<T>(&mut self, cmd: &redis::Cmd) -> AppResult<T>
    where
        T: FromRedisValue + Send,
    {
        let mut conn = self.connection().await?;
        let res: RedisResult<T> = match timeout(self.timeouts.command, cmd.query_async(&mut conn)).await {
            Ok(res) => res,
            Err(_) => {
                return Err(AppError::connection(
                    &self.endpoint,
                    format!("command timeout after {:?}", self.timeouts.command),
                ));
            }
        };

        res.map_err(|e| {
            if e.is_io_error() || e.is_connection_dropped() {
                AppError::connection(&self.endpoint, e)
            } else {
                AppError::Redis(e)
            }
        })
    }
}

#[async_trait]
impl StoreHandle for RedisHandle {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn info(&mut self) -> AppResult<ServerInfo> {
        let raw: String = self.query(&redis::cmd("INFO")).await?;
        Ok(ServerInfo::parse(&raw))
    }

    async fn llen(&mut self, key: &str) -> AppResult<u64> {
        let mut cmd = redis::cmd("LLEN");
        cmd.arg(key);
        self.query(&cmd).await
    }
}

/// `INFO` reply as a flat field map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    fields: BTreeMap<String, String>,
}

impl ServerInfo {
    /// INFO is `key:value` lines grouped under `# Section` headers.
    pub fn parse(raw: &str) -> Self {
        let fields = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split_once(':'))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for ServerInfo
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Address plus AUTH / SELECT settings for one node.
fn node_info(node: &NodeParams) -> RedisResult<ConnectionInfo> {
    let mut settings = RedisConnectionInfo::default().set_db(node.db);
    if let Some(username) = &node.username {
        settings = settings.set_username(username);
    }
    if let Some(password) = &node.password {
        settings = settings.set_password(password);
    }

    Ok(ConnectionAddr::Tcp(node.host.clone(), node.port)
        .into_connection_info()?
        .set_redis_settings(settings))
}
