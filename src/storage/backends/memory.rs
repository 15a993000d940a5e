use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tracing::{debug, info, trace, warn};

use crate::errors::{Result, ShortenerError};
use crate::storage::{Entry, Storage, StorageConfig, Visitor};

/// Process-local backend used for development and tests.
///
/// Keeps the same contract as the redis adapter: create-if-absent,
/// visitor lists newest first, visit fields derived on read.
#[derive(Default)]
pub struct MemoryStorage {
    entries: DashMap<String, Entry>,
    visits: DashMap<String, VecDeque<Visitor>>,
    closed: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ShortenerError::backend("memory storage is closed"));
        }
        Ok(())
    }

    fn with_derived_fields(&self, id: &str, mut entry: Entry) -> Entry {
        let (count, last) = match self.visits.get(id) {
            Some(list) => (
                list.len() as u64,
                list.front().and_then(|v| v.timestamp),
            ),
            None => (0, None),
        };
        entry.public.visit_count = count;
        entry.public.last_visit = Some(last.unwrap_or(DateTime::<Utc>::UNIX_EPOCH));
        entry
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_entry(&self, entry: &Entry, id: &str) -> Result<()> {
        self.ensure_open()?;
        // entry API 持有分片锁，检查与插入是原子的
        match self.entries.entry(id.to_string()) {
            MapEntry::Occupied(_) => {
                debug!("Could not create key '{}': already exists", id);
                Err(ShortenerError::entry_already_exists(format!(
                    "entry '{}' already exists",
                    id
                )))
            }
            MapEntry::Vacant(slot) => {
                slot.insert(entry.clone());
                trace!("Created entry '{}'", id);
                Ok(())
            }
        }
    }

    async fn get_entry_by_id(&self, id: &str) -> Result<Entry> {
        self.ensure_open()?;
        let entry = self
            .entries
            .get(id)
            .map(|e| e.value().clone())
            .ok_or_else(|| {
                ShortenerError::no_entry_found(format!("no entry found with ID '{}'", id))
            })?;
        Ok(self.with_derived_fields(id, entry))
    }

    async fn get_entries(&self) -> Result<HashMap<String, Entry>> {
        self.ensure_open()?;
        let snapshot: Vec<(String, Entry)> = self
            .entries
            .iter()
            .map(|kv| (kv.key().clone(), kv.value().clone()))
            .collect();

        Ok(snapshot
            .into_iter()
            .map(|(id, entry)| {
                let entry = self.with_derived_fields(&id, entry);
                (id, entry)
            })
            .collect())
    }

    async fn delete_entry(&self, id: &str) -> Result<()> {
        self.ensure_open()?;
        if self.entries.remove(id).is_none() {
            warn!("Tried to delete entry '{}' but it's already gone", id);
        }
        self.visits.remove(id);
        Ok(())
    }

    async fn register_visitor(&self, id: &str, visit_id: &str, visitor: &Visitor) -> Result<()> {
        self.ensure_open()?;
        // 持有访客槽位时确认条目仍在；delete 先删条目再删列表，不会留下孤儿列表
        let slot = self.visits.entry(id.to_string());
        if !self.entries.contains_key(id) {
            debug!("Visit {} not appended: entry '{}' is gone", visit_id, id);
            return Err(ShortenerError::no_entry_found(format!(
                "no entry found with ID '{}'",
                id
            )));
        }
        let mut list = slot.or_default();
        list.push_front(visitor.clone());
        trace!("Visit {} appended to '{}' (length {})", visit_id, id, list.len());
        Ok(())
    }

    async fn get_visitors(&self, id: &str) -> Result<Vec<Visitor>> {
        self.ensure_open()?;
        Ok(self
            .visits
            .get(id)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// No-op, the count is the visitor list length.
    async fn increase_visit_counter(&self, _id: &str) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(
                "Memory storage closed ({} entries discarded)",
                self.entries.len()
            );
        }
        Ok(())
    }

    fn get_backend_config(&self) -> StorageConfig {
        StorageConfig {
            storage_type: "memory".into(),
            derives_visit_count: true,
        }
    }
}
