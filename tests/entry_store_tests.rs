//! Entry store tests
//!
//! Lifecycle of an entry through `EntryStore` on the in-memory backend,
//! plus a scripted backend for the collision retry policy.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use url_shortener::config::StoreConfig;
use url_shortener::errors::{Result, ShortenerError};
use url_shortener::storage::{Entry, MemoryStorage, Storage, StorageConfig, Visitor};
use url_shortener::store::{EntryStore, MAX_ID_ATTEMPTS, Signer};

// =============================================================================
// Test Setup
// =============================================================================

fn store_config(id_length: usize) -> StoreConfig {
    StoreConfig {
        id_length,
        ..Default::default()
    }
}

fn signer() -> Signer {
    Signer::new(b"entry-store-tests").expect("valid key")
}

fn memory_store(id_length: usize) -> (Arc<MemoryStorage>, EntryStore) {
    let storage = Arc::new(MemoryStorage::new());
    let store = EntryStore::new(storage.clone(), signer(), &store_config(id_length));
    (storage, store)
}

/// Backend whose create reports a collision for the first `collisions` calls.
/// `close` is only counted, so the data stays readable afterwards.
struct CollidingStorage {
    inner: MemoryStorage,
    collisions: usize,
    create_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl CollidingStorage {
    fn new(collisions: usize) -> Self {
        Self {
            inner: MemoryStorage::new(),
            collisions,
            create_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Storage for CollidingStorage {
    async fn create_entry(&self, entry: &Entry, id: &str) -> Result<()> {
        let n = self.create_calls.fetch_add(1, Ordering::SeqCst);
        if n < self.collisions {
            return Err(ShortenerError::entry_already_exists(id.to_string()));
        }
        self.inner.create_entry(entry, id).await
    }

    async fn get_entry_by_id(&self, id: &str) -> Result<Entry> {
        self.inner.get_entry_by_id(id).await
    }

    async fn get_entries(&self) -> Result<HashMap<String, Entry>> {
        self.inner.get_entries().await
    }

    async fn delete_entry(&self, id: &str) -> Result<()> {
        self.inner.delete_entry(id).await
    }

    async fn register_visitor(&self, id: &str, visit_id: &str, visitor: &Visitor) -> Result<()> {
        self.inner.register_visitor(id, visit_id, visitor).await
    }

    async fn get_visitors(&self, id: &str) -> Result<Vec<Visitor>> {
        self.inner.get_visitors(id).await
    }

    async fn increase_visit_counter(&self, id: &str) -> Result<()> {
        self.inner.increase_visit_counter(id).await
    }

    async fn close(&self) -> Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_backend_config(&self) -> StorageConfig {
        self.inner.get_backend_config()
    }
}

// =============================================================================
// Creation
// =============================================================================

#[tokio::test]
async fn test_generated_id_shape_and_roundtrip() {
    let (_, store) = memory_store(4);

    for _ in 0..20 {
        let (id, tag) = store
            .create_entry(Entry::new("https://example.com/page"), "", "")
            .await
            .unwrap();
        assert_eq!(id.len(), 4);
        assert!(id.chars().all(|c| c.is_ascii_alphabetic()), "{}", id);
        assert_eq!(tag, store.deletion_tag(&id));

        let entry = store.get_entry_by_id(&id).await.unwrap();
        assert_eq!(entry.public.url, "https://example.com/page");
        assert!(entry.public.created_on.is_some());
    }
}

#[tokio::test]
async fn test_invalid_url_rejected() {
    let (storage, store) = memory_store(4);
    for url in ["", "not a url", "javascript:alert(1)", "/relative"] {
        let err = store
            .create_entry(Entry::new(url), "", "")
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::InvalidUrl(_)), "{}", url);
    }
    assert!(storage.get_entries().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_spaces_encoded_before_storing() {
    let (_, store) = memory_store(4);
    let (id, _) = store
        .create_entry(Entry::new("https://example.com/a file.pdf"), "", "")
        .await
        .unwrap();
    let entry = store.get_entry_by_id(&id).await.unwrap();
    assert_eq!(entry.public.url, "https://example.com/a%20file.pdf");
}

#[tokio::test]
async fn test_requested_id_collision_keeps_original() {
    let (_, store) = memory_store(4);
    store
        .create_entry(Entry::new("https://first.example"), "promo", "")
        .await
        .unwrap();

    let err = store
        .create_entry(Entry::new("https://second.example"), "promo", "")
        .await
        .unwrap_err();
    assert!(matches!(err, ShortenerError::EntryAlreadyExists(_)));

    let entry = store.get_entry_by_id("promo").await.unwrap();
    assert_eq!(entry.public.url, "https://first.example");
}

#[tokio::test]
async fn test_generated_id_retries_on_collision() {
    let storage = Arc::new(CollidingStorage::new(3));
    let store = EntryStore::new(storage.clone(), signer(), &store_config(6));

    let (id, _) = store
        .create_entry(Entry::new("https://example.com"), "", "")
        .await
        .unwrap();
    assert_eq!(storage.calls(), 4);
    assert_eq!(store.get_entry_by_id(&id).await.unwrap().public.url, "https://example.com");
}

#[tokio::test]
async fn test_generated_id_gives_up_after_bounded_attempts() {
    let storage = Arc::new(CollidingStorage::new(usize::MAX));
    let store = EntryStore::new(storage.clone(), signer(), &store_config(6));

    let err = store
        .create_entry(Entry::new("https://example.com"), "", "")
        .await
        .unwrap_err();
    assert!(matches!(err, ShortenerError::IdGenerationExhausted(_)));
    assert_eq!(storage.calls(), MAX_ID_ATTEMPTS);
}

#[tokio::test]
async fn test_requested_id_is_tried_once() {
    let storage = Arc::new(CollidingStorage::new(1));
    let store = EntryStore::new(storage.clone(), signer(), &store_config(6));

    let err = store
        .create_entry(Entry::new("https://example.com"), "mine", "")
        .await
        .unwrap_err();
    assert!(matches!(err, ShortenerError::EntryAlreadyExists(_)));
    assert_eq!(storage.calls(), 1);
}

#[tokio::test]
async fn test_concurrent_creators_single_winner() {
    let (_, store) = memory_store(4);
    let store = Arc::new(store);

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .create_entry(Entry::new(format!("https://example.com/{}", i)), "race", "")
                    .await
            })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert!(matches!(e, ShortenerError::EntryAlreadyExists(_))),
        }
    }
    assert_eq!(winners, 1);
}

// =============================================================================
// Read / expiration
// =============================================================================

#[tokio::test]
async fn test_empty_id_is_not_found() {
    let (_, store) = memory_store(4);
    assert!(matches!(
        store.get_entry_by_id("").await,
        Err(ShortenerError::NoEntryFound(_))
    ));
    assert!(matches!(
        store.get_entry_and_increase("").await,
        Err(ShortenerError::NoEntryFound(_))
    ));
}

#[tokio::test]
async fn test_expired_entry_readable_but_not_redirectable() {
    let (_, store) = memory_store(4);
    let entry = Entry::new("https://example.com").with_expiration(Utc::now() - Duration::hours(1));
    let (id, _) = store.create_entry(entry, "", "").await.unwrap();

    assert!(store.get_entry_by_id(&id).await.is_ok());
    assert!(matches!(
        store.get_entry_and_increase(&id).await,
        Err(ShortenerError::EntryExpired(_))
    ));
    // 过期不会删除
    assert!(store.get_entry_by_id(&id).await.is_ok());
}

#[tokio::test]
async fn test_future_expiration_redirects() {
    let (_, store) = memory_store(4);
    let entry = Entry::new("https://example.com").with_expiration(Utc::now() + Duration::days(1));
    let (id, _) = store.create_entry(entry, "", "").await.unwrap();
    assert!(store.get_entry_and_increase(&id).await.is_ok());
}

// =============================================================================
// Deletion
// =============================================================================

#[tokio::test]
async fn test_delete_with_forged_tag_is_refused() {
    let (_, store) = memory_store(4);
    let (id, tag) = store
        .create_entry(Entry::new("https://example.com"), "", "")
        .await
        .unwrap();

    let mut forged = tag.clone();
    forged[10] ^= 0xff;
    for bad in [forged, Vec::new(), b"garbage".to_vec(), store.deletion_tag("other")] {
        assert!(matches!(
            store.delete_entry(&id, &bad).await,
            Err(ShortenerError::AuthorizationFailed(_))
        ));
    }
    assert!(store.get_entry_by_id(&id).await.is_ok());

    let other_key = EntryStore::new(
        Arc::new(MemoryStorage::new()),
        Signer::new(b"some other key").unwrap(),
        &store_config(4),
    );
    assert!(matches!(
        store.delete_entry(&id, &other_key.deletion_tag(&id)).await,
        Err(ShortenerError::AuthorizationFailed(_))
    ));
}

#[tokio::test]
async fn test_delete_with_issued_tag() {
    let (storage, store) = memory_store(4);
    let (id, tag) = store
        .create_entry(Entry::new("https://example.com"), "", "")
        .await
        .unwrap();
    store
        .record_visit(&id, Visitor::new("1.2.3.4"))
        .await
        .unwrap();

    store.delete_entry(&id, &tag).await.unwrap();

    assert!(matches!(
        store.get_entry_by_id(&id).await,
        Err(ShortenerError::NoEntryFound(_))
    ));
    assert!(storage.get_visitors(&id).await.unwrap().is_empty());

    // id can be reused once deleted
    store
        .create_entry(Entry::new("https://example.org"), &id, "")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_visit_landing_after_delete_does_not_leak_into_recreated_id() {
    let (storage, store) = memory_store(4);
    let (id, tag) = store
        .create_entry(Entry::new("https://example.com"), "promo", "")
        .await
        .unwrap();
    assert_eq!(id, "promo");

    // redirect read succeeded, then the entry is deleted before the queued visit is written
    store.get_entry_and_increase(&id).await.unwrap();
    store.delete_entry(&id, &tag).await.unwrap();
    let late = store.record_visit(&id, Visitor::new("6.6.6.6")).await;
    assert!(matches!(late, Err(ShortenerError::NoEntryFound(_))));
    assert!(storage.get_visitors(&id).await.unwrap().is_empty());

    store
        .create_entry(Entry::new("https://example.org"), "promo", "")
        .await
        .unwrap();
    let recreated = store.get_entry_by_id("promo").await.unwrap();
    assert_eq!(recreated.public.visit_count, 0);
    assert_eq!(recreated.public.last_visit, Some(chrono::DateTime::<Utc>::UNIX_EPOCH));
    assert!(store.get_visitors("promo").await.unwrap().is_empty());
}

// =============================================================================
// Visits
// =============================================================================

#[tokio::test]
async fn test_visits_newest_first_and_counted() {
    let (_, store) = memory_store(4);
    let (id, _) = store
        .create_entry(Entry::new("https://example.com"), "", "")
        .await
        .unwrap();

    let base = Utc::now() - Duration::minutes(10);
    for i in 0..5 {
        let mut visitor = Visitor::new(format!("10.0.0.{}", i));
        visitor.timestamp = Some(base + Duration::minutes(i));
        store.record_visit(&id, visitor).await.unwrap();
    }

    let visitors = store.get_visitors(&id).await.unwrap();
    let ips: Vec<&str> = visitors.iter().map(|v| v.ip.as_str()).collect();
    assert_eq!(ips, ["10.0.0.4", "10.0.0.3", "10.0.0.2", "10.0.0.1", "10.0.0.0"]);

    let entry = store.get_entry_by_id(&id).await.unwrap();
    assert_eq!(entry.public.visit_count, 5);
    assert_eq!(entry.public.last_visit, Some(base + Duration::minutes(4)));
}

#[tokio::test]
async fn test_close_drains_queued_visits() {
    let storage = Arc::new(CollidingStorage::new(0));
    let store = EntryStore::new(storage.clone(), signer(), &store_config(4));
    let (id, _) = store
        .create_entry(Entry::new("https://example.com"), "", "")
        .await
        .unwrap();

    for _ in 0..3 {
        store.register_visit(&id, Visitor::new("1.2.3.4"));
    }
    store.close().await.unwrap();
    store.close().await.unwrap();

    assert_eq!(storage.inner.get_visitors(&id).await.unwrap().len(), 3);
    assert_eq!(storage.close_calls.load(Ordering::SeqCst), 2);

    // closed recorder drops new visits
    store.register_visit(&id, Visitor::new("5.6.7.8"));
    assert_eq!(storage.inner.get_visitors(&id).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_register_visit_drains_into_log() {
    let storage = Arc::new(MemoryStorage::new());
    let store = EntryStore::new(
        storage.clone(),
        signer(),
        &StoreConfig {
            id_length: 4,
            visit_workers: 3,
            visit_queue_capacity: 64,
        },
    );
    let (id, _) = store
        .create_entry(Entry::new("https://example.com"), "", "")
        .await
        .unwrap();

    for i in 0..10 {
        store.register_visit(&id, Visitor::new(format!("192.168.0.{}", i)));
    }

    // 等待 worker 写入
    for _ in 0..100 {
        if store.get_visitors(&id).await.unwrap().len() == 10 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(store.get_visitors(&id).await.unwrap().len(), 10);
    assert_eq!(store.get_entry_by_id(&id).await.unwrap().public.visit_count, 10);
}

#[tokio::test]
async fn test_example_scenario_counts_current_read() {
    let (_, store) = memory_store(4);
    let (id, _) = store
        .create_entry(Entry::new("https://example.com"), "", "")
        .await
        .unwrap();
    assert_eq!(id.len(), 4);
    assert!(id.chars().all(|c| c.is_ascii_alphabetic()));

    // 尚未登记访问：存储中的计数为 0，本次读取的视图计入当前访问
    assert_eq!(store.get_entry_by_id(&id).await.unwrap().public.visit_count, 0);
    let entry = store.get_entry_and_increase(&id).await.unwrap();
    assert_eq!(entry.public.visit_count, 1);
    assert!(!entry.is_expired());

    store.record_visit(&id, Visitor::new("1.2.3.4")).await.unwrap();
    let visitors = store.get_visitors(&id).await.unwrap();
    assert_eq!(visitors.len(), 1);
    assert_eq!(visitors[0].ip, "1.2.3.4");
}

// =============================================================================
// Passwords / listing
// =============================================================================

#[tokio::test]
async fn test_password_protection() {
    let (_, store) = memory_store(4);
    let (open_id, _) = store
        .create_entry(Entry::new("https://open.example"), "", "")
        .await
        .unwrap();
    let (locked_id, _) = store
        .create_entry(Entry::new("https://locked.example"), "", "s3cret")
        .await
        .unwrap();

    let open = store.get_entry_by_id(&open_id).await.unwrap();
    assert!(!open.requires_password());
    assert!(store.verify_password(&open, "").unwrap());

    let locked = store.get_entry_by_id(&locked_id).await.unwrap();
    assert!(locked.requires_password());
    assert_ne!(locked.password.as_deref(), Some("s3cret"));
    assert!(store.verify_password(&locked, "s3cret").unwrap());
    assert!(!store.verify_password(&locked, "guess").unwrap());
}

#[tokio::test]
async fn test_get_entries_lists_everything() {
    let (_, store) = memory_store(5);
    let mut ids = Vec::new();
    for i in 0..4 {
        let (id, _) = store
            .create_entry(Entry::new(format!("https://example.com/{}", i)), "", "")
            .await
            .unwrap();
        ids.push(id);
    }

    let entries = store.get_entries().await.unwrap();
    assert_eq!(entries.len(), 4);
    for id in ids {
        assert!(entries.contains_key(&id));
    }
}
