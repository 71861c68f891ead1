use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;

use super::resp::encode_command;
use super::resp::io_error;
use super::resp::protocol_error;
use super::resp::read_value;
use super::Connector;
use super::RespValue;
use crate::constants::CACHE_RW_TIMEOUT;
use crate::constants::DEFAULT_CACHE_IDLE_TIMEOUT_SECS;
use crate::constants::DEFAULT_CACHE_POOL_SIZE;
use crate::constants::MAX_CACHE_POOL_SIZE;
use crate::PoolError;
use crate::Result;

const FAMILY: &str = "redis";

/// `{"addr": "h1:6379,h2:6379", "db": 0, "password": "", "poolSize": 10, "idleTimeoutSeconds": 300}`
///
/// The lower-cased aliases accept the same entries from a settings file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub db: i64,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_pool_size", alias = "poolsize")]
    pub pool_size: i64,
    #[serde(default = "default_idle_timeout_seconds", alias = "idletimeoutseconds")]
    pub idle_timeout_seconds: i64,
}

fn default_pool_size() -> i64 {
    DEFAULT_CACHE_POOL_SIZE
}
fn default_idle_timeout_seconds() -> i64 {
    DEFAULT_CACHE_IDLE_TIMEOUT_SECS
}

struct Conn {
    stream: BufReader<TcpStream>,
    last_used: Instant,
}

/// Cache client for one endpoint: a fixed set of lazily dialed connection
/// slots, picked in turn per command.
pub struct CacheClient {
    endpoint: String,
    db: i64,
    password: String,
    idle_timeout: Duration,
    slots: Vec<Mutex<Option<Conn>>>,
    next_slot: AtomicUsize,
    closed: AtomicBool,
}

impl std::fmt::Debug for CacheClient {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("endpoint", &self.endpoint)
            .field("db", &self.db)
            .field("slots", &self.slots.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl CacheClient {
    pub fn new(
        endpoint: impl Into<String>,
        config: &CacheConfig,
    ) -> Self {
        let size = config.pool_size.clamp(1, MAX_CACHE_POOL_SIZE) as usize;
        Self {
            endpoint: endpoint.into(),
            db: config.db,
            password: config.password.clone(),
            idle_timeout: Duration::from_secs(config.idle_timeout_seconds.max(1) as u64),
            slots: (0..size).map(|_| Mutex::new(None)).collect(),
            next_slot: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends one command and returns the raw reply. Error replies become errors.
    pub async fn command(
        &self,
        args: &[&[u8]],
    ) -> Result<RespValue> {
        if self.is_closed() {
            return Err(protocol_error(format!("client for {} is closed", self.endpoint)));
        }
        let idx = self.next_slot.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        let mut slot = self.slots[idx].lock().await;

        let stale = slot
            .as_ref()
            .is_some_and(|c| c.last_used.elapsed() >= self.idle_timeout);
        if stale {
            trace!(endpoint = self.endpoint, slot = idx, "dropping idle connection");
            *slot = None;
        }
        if slot.is_none() {
            *slot = Some(self.dial().await?);
        }
        let Some(conn) = slot.as_mut() else {
            return Err(protocol_error("connection slot unexpectedly empty"));
        };

        match timeout(CACHE_RW_TIMEOUT, Self::round_trip(conn, args)).await {
            Ok(Ok(reply)) => {
                conn.last_used = Instant::now();
                match reply {
                    RespValue::Error(msg) => Err(protocol_error(msg)),
                    reply => Ok(reply),
                }
            }
            Ok(Err(e)) => {
                *slot = None;
                Err(e)
            }
            Err(_) => {
                *slot = None;
                Err(protocol_error(format!("{} timed out after {:?}", self.endpoint, CACHE_RW_TIMEOUT)))
            }
        }
    }

    pub async fn ping(&self) -> Result<()> {
        match self.command(&[&b"PING"[..]]).await? {
            RespValue::Simple(s) if s == "PONG" => Ok(()),
            other => Err(protocol_error(format!("unexpected PING reply {other:?}"))),
        }
    }

    pub async fn get(
        &self,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        match self.command(&[&b"GET"[..], key]).await? {
            RespValue::Bulk(value) => Ok(value),
            other => Err(protocol_error(format!("unexpected GET reply {other:?}"))),
        }
    }

    pub async fn set(
        &self,
        key: &[u8],
        value: &[u8],
    ) -> Result<()> {
        match self.command(&[&b"SET"[..], key, value]).await? {
            RespValue::Simple(_) => Ok(()),
            other => Err(protocol_error(format!("unexpected SET reply {other:?}"))),
        }
    }

    /// Number of keys removed
    pub async fn del(
        &self,
        key: &[u8],
    ) -> Result<i64> {
        match self.command(&[&b"DEL"[..], key]).await? {
            RespValue::Integer(n) => Ok(n),
            other => Err(protocol_error(format!("unexpected DEL reply {other:?}"))),
        }
    }

    /// Drops every open connection; later commands fail.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        for slot in &self.slots {
            slot.lock().await.take();
        }
        debug!(endpoint = self.endpoint, "cache client closed");
    }

    async fn dial(&self) -> Result<Conn> {
        let stream = timeout(CACHE_RW_TIMEOUT, TcpStream::connect(&self.endpoint))
            .await
            .map_err(|_| self.connect_error("connect timed out"))?
            .map_err(|e| self.connect_error(e.to_string()))?;
        let mut conn = Conn {
            stream: BufReader::new(stream),
            last_used: Instant::now(),
        };

        if !self.password.is_empty() {
            let reply = Self::round_trip(&mut conn, &[&b"AUTH"[..], self.password.as_bytes()]).await?;
            if let RespValue::Error(msg) = reply {
                return Err(self.connect_error(format!("AUTH rejected: {msg}")));
            }
        }
        if self.db != 0 {
            let db = self.db.to_string();
            let reply = Self::round_trip(&mut conn, &[&b"SELECT"[..], db.as_bytes()]).await?;
            if let RespValue::Error(msg) = reply {
                return Err(self.connect_error(format!("SELECT {db} rejected: {msg}")));
            }
        }
        debug!(endpoint = self.endpoint, db = self.db, "cache connection established");
        Ok(conn)
    }

    async fn round_trip(
        conn: &mut Conn,
        args: &[&[u8]],
    ) -> Result<RespValue> {
        let frame = encode_command(args);
        conn.stream.get_mut().write_all(&frame).await.map_err(io_error)?;
        read_value(&mut conn.stream).await
    }

    fn connect_error(
        &self,
        reason: impl Into<String>,
    ) -> crate::Error {
        PoolError::Connect {
            family: FAMILY,
            endpoint: self.endpoint.clone(),
            reason: reason.into(),
        }
        .into()
    }
}

/// Builds one [`CacheClient`] per comma separated address.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheConnector;

#[async_trait]
impl Connector for CacheConnector {
    type Config = CacheConfig;
    type Member = CacheClient;

    fn family(&self) -> &'static str {
        FAMILY
    }

    fn validate(
        &self,
        name: &str,
        config: &CacheConfig,
    ) -> Result<()> {
        let reason = if config.addr.trim().is_empty() {
            "addr is required".to_string()
        } else if config.db < 0 {
            "db must be >= 0".to_string()
        } else if config.pool_size <= 0 {
            "poolSize must be > 0".to_string()
        } else if config.pool_size > MAX_CACHE_POOL_SIZE {
            format!("poolSize must be <= {MAX_CACHE_POOL_SIZE}")
        } else if config.idle_timeout_seconds <= 0 {
            "idleTimeoutSeconds must be > 0".to_string()
        } else {
            return Ok(());
        };
        Err(PoolError::Validation {
            family: FAMILY,
            name: name.to_string(),
            reason,
        }
        .into())
    }

    fn endpoints(
        &self,
        config: &CacheConfig,
    ) -> Vec<String> {
        config
            .addr
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    }

    async fn connect(
        &self,
        endpoint: &str,
        config: &CacheConfig,
    ) -> Result<CacheClient> {
        Ok(CacheClient::new(endpoint, config))
    }

    async fn probe(
        &self,
        member: &CacheClient,
    ) -> Result<()> {
        member.ping().await
    }

    async fn close(
        &self,
        member: &CacheClient,
    ) -> Result<()> {
        member.close().await;
        Ok(())
    }
}
