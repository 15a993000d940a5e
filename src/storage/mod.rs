//! Storage backends
//!
//! The `Storage` trait is the whole capability boundary between the entry
//! store and a key-value technology. Adapters hold no business logic: they
//! persist entries and visitor logs and derive the visit fields on read.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, warn};

use crate::config::AppConfig;
use crate::errors::{Result, ShortenerError};

pub mod backends;
pub mod models;

pub use backends::memory::MemoryStorage;
pub use backends::redis::RedisStorage;
pub use models::{Entry, EntryPublicData, StorageConfig, Visitor};

#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert `entry` under `id` only if the id is free.
    ///
    /// Must fail with `EntryAlreadyExists` instead of overwriting when a
    /// concurrent creator got there first.
    async fn create_entry(&self, entry: &Entry, id: &str) -> Result<()>;

    /// Stored entry merged with the derived `visit_count` / `last_visit`.
    ///
    /// A missing id is `NoEntryFound`. An unreadable visitor log only
    /// degrades the derived fields.
    async fn get_entry_by_id(&self, id: &str) -> Result<Entry>;

    /// Every stored entry keyed by id; unreadable entries are skipped.
    async fn get_entries(&self) -> Result<HashMap<String, Entry>>;

    /// Remove the entry and its visitor log. Already absent is success.
    async fn delete_entry(&self, id: &str) -> Result<()>;

    /// Append to the visitor log of `id`, newest first.
    ///
    /// `NoEntryFound` when the entry no longer exists; nothing is written then.
    async fn register_visitor(&self, id: &str, visit_id: &str, visitor: &Visitor) -> Result<()>;

    /// Full visitor log, newest first.
    async fn get_visitors(&self, id: &str) -> Result<Vec<Visitor>>;

    /// 访问计数：由访客日志长度推导的后端可以不做任何事
    async fn increase_visit_counter(&self, id: &str) -> Result<()>;

    /// Release the underlying connection; calling it twice is fine.
    async fn close(&self) -> Result<()>;

    fn get_backend_config(&self) -> StorageConfig;
}

pub struct StorageFactory;

impl StorageFactory {
    pub async fn create(config: &AppConfig) -> Result<Arc<dyn Storage>> {
        match config.backend.as_str() {
            "redis" => {
                let storage = RedisStorage::new(&config.redis).await.map_err(|e| {
                    error!("Could not initialize the redis backend: {}", e);
                    e.context("could not initialize the data backend")
                })?;
                Ok(Arc::new(storage) as Arc<dyn Storage>)
            }
            "memory" => {
                warn!("Using the in-memory backend, data will not survive a restart");
                Ok(Arc::new(MemoryStorage::new()) as Arc<dyn Storage>)
            }
            other => Err(ShortenerError::config(format!(
                "{} is not a recognized backend. Supported: redis, memory",
                other
            ))),
        }
    }
}
