use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::MultiplexedConnection;
use tokio::sync::RwLock;
use tracing::{debug, error, info, trace, warn};

use super::{ENTRY_KEY_PREFIX, entry_key, id_from_entry_key, visits_key};
use crate::config::RedisConfig;
use crate::errors::{Result, ShortenerError};
use crate::storage::{Entry, Storage, StorageConfig, Visitor};

/// Smallest TTL put on an entry key when key expiry is enabled
const MIN_ENTRY_TTL_SECS: i64 = 60;
const SCAN_BATCH: u64 = 200;

/// KEYS[1] = entry key, KEYS[2] = visitor list, ARGV[1] = visitor json,
/// ARGV[2] = "1" to copy the entry TTL onto the list.
/// Returns the new list length, or -1 when the entry is gone.
const APPEND_VISIT_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
  return -1
end
local len = redis.call('LPUSH', KEYS[2], ARGV[1])
if ARGV[2] == '1' then
  local ttl = redis.call('PTTL', KEYS[1])
  if ttl > 0 then
    redis.call('PEXPIRE', KEYS[2], ttl)
  end
end
return len
"#;

pub struct RedisStorage {
    client: redis::Client,
    /// 持久化连接，使用 RwLock 保护
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    closed: AtomicBool,
    timeout: Duration,
    expire_entries: bool,
}

impl RedisStorage {
    /// Connect and ping; if we can't talk to redis, fail fast.
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            ShortenerError::config(format!("Invalid redis url '{}': {}", config.url, e))
        })?;

        let storage = Self {
            client,
            connection: Arc::new(RwLock::new(None)),
            closed: AtomicBool::new(false),
            timeout: Duration::from_millis(config.timeout_ms.max(1)),
            expire_entries: config.expire_entries,
        };

        let mut conn = storage.get_connection().await?;
        let pong: String = storage
            .timed("PING", redis::cmd("PING").query_async(&mut conn))
            .await
            .map_err(|e| e.context(format!("could not connect to redis at {}", config.url)))?;
        debug!("Redis connection test successful: {}", pong);

        info!(
            "Redis storage initialized (timeout: {:?}, key expiry: {})",
            storage.timeout, storage.expire_entries
        );
        Ok(storage)
    }

    /// 获取或建立持久连接
    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ShortenerError::backend("redis connection is closed"));
        }

        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // 双重检查，避免竞态条件
        if let Some(ref conn) = *conn_guard {
            return Ok(conn.clone());
        }

        let new_conn = tokio::time::timeout(
            self.timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| {
            ShortenerError::backend(format!(
                "timed out after {:?} connecting to redis",
                self.timeout
            ))
        })??;
        *conn_guard = Some(new_conn.clone());
        debug!("Redis connection established and cached");

        Ok(new_conn)
    }

    /// 重置连接（在连接错误时调用）
    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
        debug!("Redis connection reset due to error");
    }

    /// Run one round trip under the configured timeout.
    async fn timed<T, F>(&self, op: &str, fut: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Redis {} failed: {}", op, e);
                if is_connection_fault(&e) {
                    self.reset_connection().await;
                }
                Err(ShortenerError::backend(format!("redis {}: {}", op, e)))
            }
            Err(_) => {
                error!("Redis {} timed out after {:?}", op, self.timeout);
                self.reset_connection().await;
                Err(ShortenerError::backend(format!(
                    "redis {}: timed out after {:?}",
                    op, self.timeout
                )))
            }
        }
    }

    /// Derived visit count; zero when the list length can't be read
    async fn visit_count(&self, conn: &mut MultiplexedConnection, id: &str) -> u64 {
        let key = visits_key(id);
        let reply = self
            .timed("LLEN", redis::cmd("LLEN").arg(&key).query_async(conn))
            .await;
        visit_count_or_zero(id, reply)
    }

    /// Timestamp of the newest visitor, epoch zero if there is none or it is unreadable
    async fn last_visit(&self, conn: &mut MultiplexedConnection, id: &str) -> DateTime<Utc> {
        let key = visits_key(id);
        let raw: Option<String> = match self
            .timed(
                "LINDEX",
                redis::cmd("LINDEX").arg(&key).arg(0).query_async(conn),
            )
            .await
        {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Could not fetch visitor list for entry '{}': {}", id, e);
                None
            }
        };
        decode_last_visit(id, raw.as_deref())
    }
}

/// Transport faults only; a server reply such as WRONGTYPE keeps the connection.
fn is_connection_fault(e: &redis::RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped() || e.is_timeout()
}

fn decode_entry(id: &str, raw: &str) -> Result<Entry> {
    serde_json::from_str(raw).map_err(|e| {
        error!(
            "Error unmarshalling JSON for entry '{}': {} (json str: '{}')",
            id, e, raw
        );
        ShortenerError::from(e)
    })
}

fn visit_count_or_zero(id: &str, reply: Result<u64>) -> u64 {
    match reply {
        Ok(count) => count,
        Err(e) => {
            warn!("Could not get length of visitor list for id '{}': {}", id, e);
            0
        }
    }
}

fn decode_last_visit(id: &str, raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|raw| match serde_json::from_str::<Visitor>(raw) {
        Ok(visitor) => visitor.timestamp,
        Err(e) => {
            warn!(
                "Could not unmarshal JSON for last visitor to entry '{}': {} (got string: '{}')",
                id, e, raw
            );
            None
        }
    })
    .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

/// Listing keeps whatever could be read; unreadable entries are logged and left out.
fn collect_listing(
    results: impl IntoIterator<Item = (String, Result<Entry>)>,
) -> HashMap<String, Entry> {
    results
        .into_iter()
        .filter_map(|(id, result)| match result {
            Ok(entry) => Some((id, entry)),
            Err(e) => {
                warn!("Could not get entry '{}': {}", id, e);
                None
            }
        })
        .collect()
}

/// TTL for an entry key: time left until expiration, floored at one minute.
fn entry_ttl_secs(entry: &Entry, now: DateTime<Utc>) -> Option<u64> {
    let expiration = entry.public.expiration?;
    let remaining = (expiration - now).num_seconds();
    Some(remaining.max(MIN_ENTRY_TTL_SECS) as u64)
}

#[async_trait]
impl Storage for RedisStorage {
    async fn create_entry(&self, entry: &Entry, id: &str) -> Result<()> {
        let raw = serde_json::to_string(entry).map_err(|e| {
            error!("Could not marshal JSON for entry {}: {}", id, e);
            ShortenerError::from(e)
        })?;

        let key = entry_key(id);
        let mut cmd = redis::cmd("SET");
        cmd.arg(&key).arg(&raw).arg("NX");
        if self.expire_entries
            && let Some(ttl) = entry_ttl_secs(entry, Utc::now())
        {
            debug!("Creating key '{}', expiration {}s", key, ttl);
            cmd.arg("EX").arg(ttl);
        } else {
            debug!("Creating key '{}'", key);
        }

        let mut conn = self.get_connection().await?;
        let reply: Option<String> = self.timed("SET NX", cmd.query_async(&mut conn)).await?;

        match reply {
            Some(_) => {
                trace!("Set value for key '{}': '{}'", key, raw);
                Ok(())
            }
            None => {
                debug!("Could not create key '{}': already exists", key);
                Err(ShortenerError::entry_already_exists(format!(
                    "entry '{}' already exists",
                    id
                )))
            }
        }
    }

    async fn get_entry_by_id(&self, id: &str) -> Result<Entry> {
        let key = entry_key(id);
        debug!("Fetching key: '{}'", key);

        let mut conn = self.get_connection().await?;
        let raw: Option<String> = self
            .timed("GET", redis::cmd("GET").arg(&key).query_async(&mut conn))
            .await?;

        let Some(raw) = raw else {
            return Err(ShortenerError::no_entry_found(format!(
                "no entry found with ID '{}'",
                id
            )));
        };

        let mut entry = decode_entry(id, &raw)?;

        // 访问次数与最后访问时间都从访客列表推导，访问时不必重写 entry
        entry.public.visit_count = self.visit_count(&mut conn, id).await;
        entry.public.last_visit = Some(self.last_visit(&mut conn, id).await);

        Ok(entry)
    }

    async fn get_entries(&self) -> Result<HashMap<String, Entry>> {
        let pattern = format!("{}*", ENTRY_KEY_PREFIX);
        let mut conn = self.get_connection().await?;

        let mut ids = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, keys): (u64, Vec<String>) = self
                .timed(
                    "SCAN",
                    redis::cmd("SCAN")
                        .arg(cursor)
                        .arg("MATCH")
                        .arg(&pattern)
                        .arg("COUNT")
                        .arg(SCAN_BATCH)
                        .query_async(&mut conn),
                )
                .await
                .map_err(|e| {
                    e.context(format!(
                        "could not fetch set of entries for prefix '{}'",
                        pattern
                    ))
                })?;

            ids.extend(keys.iter().filter_map(|k| id_from_entry_key(k)).map(String::from));
            if next == 0 {
                break;
            }
            cursor = next;
        }

        // SCAN may return a key more than once
        ids.sort_unstable();
        ids.dedup();

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let result = self.get_entry_by_id(&id).await;
            results.push((id, result));
        }
        let entries = collect_listing(results);

        debug!("Loaded {} entries", entries.len());
        Ok(entries)
    }

    async fn delete_entry(&self, id: &str) -> Result<()> {
        let entry_key = entry_key(id);
        let visits_key = visits_key(id);
        debug!("Deleting keys '{}' and '{}'", entry_key, visits_key);

        let mut conn = self.get_connection().await?;
        // MULTI/EXEC: entry and visitor list go together or not at all
        let (removed_entry, removed_visits): (u64, u64) = self
            .timed(
                "DEL",
                redis::pipe()
                    .atomic()
                    .cmd("DEL")
                    .arg(&entry_key)
                    .cmd("DEL")
                    .arg(&visits_key)
                    .query_async(&mut conn),
            )
            .await
            .map_err(|e| e.context(format!("could not delete entry id {}", id)))?;

        if removed_entry == 0 {
            warn!("Tried to delete key '{}' but it's already gone", entry_key);
        }
        trace!(
            "Deleted entry '{}' ({} entry key, {} visitor list)",
            id, removed_entry, removed_visits
        );
        Ok(())
    }

    async fn register_visitor(&self, id: &str, visit_id: &str, visitor: &Visitor) -> Result<()> {
        let data = serde_json::to_string(visitor).map_err(|e| {
            error!(
                "Could not marshal JSON for entry {}, visit {}: {}",
                id, visit_id, e
            );
            ShortenerError::from(e)
        })?;

        let key = visits_key(id);
        let mut conn = self.get_connection().await?;
        // 条目存在时才追加，已删除条目不会留下孤儿访客列表
        let len: i64 = self
            .timed(
                "EVAL append visit",
                redis::cmd("EVAL")
                    .arg(APPEND_VISIT_SCRIPT)
                    .arg(2)
                    .arg(entry_key(id))
                    .arg(&key)
                    .arg(&data)
                    .arg(if self.expire_entries { "1" } else { "0" })
                    .query_async(&mut conn),
            )
            .await
            .map_err(|e| e.context(format!("could not register visitor for ID {}", id)))?;

        if len < 0 {
            debug!("Visit {} not appended: entry '{}' is gone", visit_id, id);
            return Err(ShortenerError::no_entry_found(format!(
                "no entry found with ID '{}'",
                id
            )));
        }

        trace!("Visit {} appended to '{}' (length {})", visit_id, key, len);
        Ok(())
    }

    async fn get_visitors(&self, id: &str) -> Result<Vec<Visitor>> {
        let key = visits_key(id);
        let mut conn = self.get_connection().await?;

        // TODO: switch to LRANGE pages once visitor lists grow past a few thousand items
        let raw: Vec<String> = self
            .timed(
                "LRANGE",
                redis::cmd("LRANGE")
                    .arg(&key)
                    .arg(0)
                    .arg(-1)
                    .query_async(&mut conn),
            )
            .await
            .map_err(|e| e.context(format!("could not get visitors for id '{}'", id)))?;

        raw.iter()
            .map(|v| {
                serde_json::from_str::<Visitor>(v).map_err(|e| {
                    error!("Could not unmarshal json for visit '{}': {}", id, e);
                    ShortenerError::from(e)
                })
            })
            .collect()
    }

    /// No-op: the visit count is `LLEN` of the visitor list, derived in
    /// `get_entry_by_id`, and the last visit is `LINDEX 0` of the same list.
    async fn increase_visit_counter(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Redis connection already closed");
            return Ok(());
        }
        self.connection.write().await.take();
        info!("Redis connection closed");
        Ok(())
    }

    fn get_backend_config(&self) -> StorageConfig {
        StorageConfig {
            storage_type: "redis".into(),
            derives_visit_count: true,
        }
    }
}
