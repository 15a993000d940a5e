//! Entry store
//!
//! Owns the entry lifecycle on top of a `Storage` backend: id generation
//! with bounded collision retry, password hashing, expiration checks,
//! deletion tags and visit registration. Creation is race-free only
//! because the backend's create is insert-if-absent; nothing here locks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::errors::{Result, ShortenerError};
use crate::storage::{Entry, Storage, StorageConfig, Visitor};
use crate::utils::password;
use crate::utils::url_validator::normalize_and_validate;
use crate::utils::{MAX_REQUESTED_ID_LEN, is_valid_requested_id};

pub mod id;
pub mod signer;
pub mod visits;

pub use signer::Signer;
pub use visits::VisitRecorder;

/// Attempts made with generated ids before giving up
pub const MAX_ID_ATTEMPTS: usize = 10;

pub struct EntryStore {
    storage: Arc<dyn Storage>,
    signer: Signer,
    visits: VisitRecorder,
    id_length: usize,
}

impl EntryStore {
    /// Must be called inside a tokio runtime: the visit workers are spawned here.
    pub fn new(storage: Arc<dyn Storage>, signer: Signer, config: &StoreConfig) -> Self {
        let visits = VisitRecorder::new(
            Arc::clone(&storage),
            config.visit_workers,
            config.visit_queue_capacity,
        );
        Self {
            storage,
            signer,
            visits,
            id_length: config.id_length,
        }
    }

    pub fn id_length(&self) -> usize {
        self.id_length
    }

    pub fn backend_config(&self) -> StorageConfig {
        self.storage.get_backend_config()
    }

    /// Persist `entry` and return its id with the deletion tag.
    ///
    /// An empty `requested_id` gets a generated id, retried on collision up
    /// to [`MAX_ID_ATTEMPTS`] times. A requested id is tried once.
    pub async fn create_entry(
        &self,
        mut entry: Entry,
        requested_id: &str,
        password: &str,
    ) -> Result<(String, Vec<u8>)> {
        entry.public.url = normalize_and_validate(&entry.public.url)?;

        if !requested_id.is_empty() && !is_valid_requested_id(requested_id) {
            return Err(ShortenerError::invalid_id(format!(
                "id must be 1-{} characters of A-Z, a-z, 0-9, '_' or '-'",
                MAX_REQUESTED_ID_LEN
            )));
        }

        // 只存哈希，不存明文
        entry.password = password::process_new_password(password)?;
        entry.public.created_on = Some(Utc::now());
        entry.public.visit_count = 0;
        entry.public.last_visit = None;

        let id = if requested_id.is_empty() {
            self.create_with_generated_id(&entry).await?
        } else {
            self.storage.create_entry(&entry, requested_id).await?;
            requested_id.to_string()
        };

        info!("Created entry {} -> {}", id, entry.public.url);
        let tag = self.signer.sign(&id);
        Ok((id, tag))
    }

    async fn create_with_generated_id(&self, entry: &Entry) -> Result<String> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let id = id::generate_id(self.id_length);
            match self.storage.create_entry(entry, &id).await {
                Ok(()) => return Ok(id),
                Err(ShortenerError::EntryAlreadyExists(_)) => {
                    debug!(
                        "Generated id {} already taken (attempt {}/{})",
                        id, attempt, MAX_ID_ATTEMPTS
                    );
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            "Gave up after {} id collisions at length {}",
            MAX_ID_ATTEMPTS, self.id_length
        );
        Err(ShortenerError::id_generation_exhausted(format!(
            "could not find a free id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    /// Pure fetch, no expiration check
    pub async fn get_entry_by_id(&self, id: &str) -> Result<Entry> {
        if id.is_empty() {
            return Err(ShortenerError::no_entry_found("no entry found with an empty ID"));
        }
        self.storage.get_entry_by_id(id).await
    }

    /// Fetch for a redirect: rejects expired entries and counts this read.
    ///
    /// Expired entries stay in the backend. The returned `visit_count`
    /// includes the current read.
    pub async fn get_entry_and_increase(&self, id: &str) -> Result<Entry> {
        let mut entry = self.get_entry_by_id(id).await?;

        if entry.is_expired() {
            return Err(ShortenerError::entry_expired(format!(
                "entry {} has expired",
                id
            )));
        }

        self.storage
            .increase_visit_counter(id)
            .await
            .map_err(|e| e.context(format!("could not increase visit counter of {}", id)))?;
        entry.public.visit_count += 1;

        Ok(entry)
    }

    /// Delete after checking `tag`; a mismatch never touches the backend.
    pub async fn delete_entry(&self, id: &str, tag: &[u8]) -> Result<()> {
        if !self.signer.verify(id, tag) {
            warn!("Rejected deletion of {}: tag mismatch", id);
            return Err(ShortenerError::authorization_failed(
                "deletion tag verification failed",
            ));
        }

        self.storage
            .delete_entry(id)
            .await
            .map_err(|e| e.context(format!("could not delete entry {}", id)))?;
        info!("Deleted entry {}", id);
        Ok(())
    }

    /// Fire-and-forget: the visit is queued and any failure is only logged.
    pub fn register_visit(&self, id: &str, visitor: Visitor) {
        self.visits.dispatch(id, visitor);
    }

    /// Append a visit and wait for the backend.
    pub async fn record_visit(&self, id: &str, visitor: Visitor) -> Result<()> {
        visits::record(
            self.storage.as_ref(),
            id,
            &visits::new_visit_id(),
            &visitor,
        )
        .await
    }

    pub async fn get_visitors(&self, id: &str) -> Result<Vec<Visitor>> {
        self.storage
            .get_visitors(id)
            .await
            .map_err(|e| e.context(format!("could not get visitors of {}", id)))
    }

    pub async fn get_entries(&self) -> Result<HashMap<String, Entry>> {
        self.storage
            .get_entries()
            .await
            .map_err(|e| e.context("could not list entries"))
    }

    /// Entries without a password accept anything.
    pub fn verify_password(&self, entry: &Entry, given: &str) -> Result<bool> {
        match entry.password.as_deref() {
            Some(hash) if !hash.is_empty() => password::verify_password(given, hash),
            _ => Ok(true),
        }
    }

    pub fn deletion_tag(&self, id: &str) -> Vec<u8> {
        self.signer.sign(id)
    }

    /// Drain queued visits, then close the backend. Safe to call twice.
    pub async fn close(&self) -> Result<()> {
        self.visits.close().await;
        self.storage.close().await
    }
}
