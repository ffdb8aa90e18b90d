//! Behaviour of the URL store without the HTTP layer
//!
//! Time is driven by a `ManualClock` so expiry can be tested without sleeping.

use chrono::{Duration, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use ttl_shortener::clock::ManualClock;
use ttl_shortener::error::{StorageError, StoreError};
use ttl_shortener::location::StaticLocation;
use ttl_shortener::storage::{MemoryStorage, RecordMap, Storage};
use ttl_shortener::store::{spawn_expiry_sweeper, ExpiredListing, StoreOptions, UrlStore};

/// Storage double whose writes can be switched off
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    fail_writes: AtomicBool,
    save_calls: AtomicUsize,
}

impl FlakyStorage {
    fn fail(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Storage for FlakyStorage {
    fn load(&self) -> Result<RecordMap, StorageError> {
        self.inner.load()
    }

    fn save(&self, records: &RecordMap) -> Result<(), StorageError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("disk full".to_string()));
        }
        self.inner.save(records)
    }
}

/// Storage whose load always fails
struct BrokenLoad;

impl Storage for BrokenLoad {
    fn load(&self) -> Result<RecordMap, StorageError> {
        Err(StorageError::Unavailable("corrupt".to_string()))
    }

    fn save(&self, _records: &RecordMap) -> Result<(), StorageError> {
        Ok(())
    }
}

fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn setup_store_with(
    storage: Arc<dyn Storage>,
    options: StoreOptions,
) -> (UrlStore, ManualClock) {
    let clock = ManualClock::new(start_time());
    let store = UrlStore::open(storage, options)
        .with_clock(Arc::new(clock.clone()))
        .with_location_provider(Arc::new(StaticLocation::new("Testland")));
    (store, clock)
}

fn setup_store() -> (UrlStore, ManualClock, Arc<MemoryStorage>) {
    let storage = Arc::new(MemoryStorage::new());
    let (store, clock) = setup_store_with(storage.clone(), StoreOptions::default());
    (store, clock, storage)
}

#[tokio::test]
async fn test_create_generates_unique_codes() {
    let (store, _clock, _storage) = setup_store();

    let mut codes = HashSet::new();
    for i in 0..200 {
        let created = store
            .create(&format!("https://example.com/{}", i), None, None)
            .await
            .unwrap();
        let code = created.record.short_code.clone();
        assert_eq!(code.len(), 8);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(codes.insert(code));
    }
}

#[tokio::test]
async fn test_create_sets_expiry_and_short_url() {
    let (store, _clock, storage) = setup_store();

    let created = store
        .create("https://example.com/a", Some(45), Some("abc123"))
        .await
        .unwrap();

    assert_eq!(created.short_url, "http://localhost:8080/abc123");
    assert_eq!(created.record.created_at, start_time());
    assert_eq!(created.record.expiry, start_time() + Duration::minutes(45));
    assert!(created.record.clicks.is_empty());

    // Persisted before returning
    assert_eq!(storage.snapshot().get("abc123"), Some(&created.record));
}

#[tokio::test]
async fn test_create_default_validity_is_thirty_minutes() {
    let (store, _clock, _storage) = setup_store();

    let created = store
        .create("https://example.com/a", None, None)
        .await
        .unwrap();

    assert_eq!(created.record.expiry - created.record.created_at, Duration::minutes(30));
}

#[tokio::test]
async fn test_create_duplicate_custom_code() {
    let (store, _clock, _storage) = setup_store();

    store
        .create("https://example.com/first", None, Some("abc123"))
        .await
        .unwrap();
    let second = store
        .create("https://example.com/second", None, Some("abc123"))
        .await;

    assert!(matches!(second, Err(StoreError::ShortCodeInUse(code)) if code == "abc123"));
    assert_eq!(
        store.resolve("abc123").await.unwrap().long_url,
        "https://example.com/first"
    );
}

#[tokio::test]
async fn test_create_rejects_invalid_input_without_side_effects() {
    let (store, _clock, storage) = setup_store();

    assert!(matches!(
        store.create("https://example.com", None, Some("bad code!")).await,
        Err(StoreError::InvalidShortCode(_))
    ));
    assert!(matches!(
        store.create("not a url", None, None).await,
        Err(StoreError::InvalidUrl(_))
    ));
    assert!(matches!(
        store.create("/relative/path", None, None).await,
        Err(StoreError::InvalidUrl(_))
    ));
    assert!(matches!(
        store.create("https://example.com", Some(0), None).await,
        Err(StoreError::InvalidValidity(_))
    ));
    assert!(matches!(
        store.create("https://example.com", Some(-10), None).await,
        Err(StoreError::InvalidValidity(_))
    ));
    assert!(matches!(
        store.create("https://example.com", Some(i64::MAX), None).await,
        Err(StoreError::InvalidValidity(_))
    ));

    assert!(store.list_all().await.is_empty());
    assert!(storage.snapshot().is_empty());
}

#[tokio::test]
async fn test_resolve_purges_expired_record() {
    let (store, clock, storage) = setup_store();

    store
        .create("https://example.com/a", Some(1), Some("short"))
        .await
        .unwrap();

    // Exactly at expiry the record is still live
    clock.advance(Duration::minutes(1));
    assert!(store.resolve("short").await.is_some());

    clock.advance(Duration::seconds(1));
    // Stale entry is still listed until something purges it
    assert_eq!(store.list_all().await.len(), 1);

    assert!(store.resolve("short").await.is_none());
    assert!(store.list_all().await.is_empty());
    assert!(storage.snapshot().is_empty());
}

#[tokio::test]
async fn test_hidden_listing_filters_expired_without_purging() {
    let storage = Arc::new(MemoryStorage::new());
    let (store, clock) = setup_store_with(
        storage.clone(),
        StoreOptions {
            expired_listing: ExpiredListing::Hide,
            ..StoreOptions::default()
        },
    );

    store
        .create("https://example.com/short", Some(1), Some("short"))
        .await
        .unwrap();
    store
        .create("https://example.com/long", Some(60), Some("long"))
        .await
        .unwrap();

    clock.advance(Duration::minutes(2));

    let listed = store.list_all().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].short_code, "long");
    assert_eq!(storage.snapshot().len(), 2);
}

#[tokio::test]
async fn test_expired_code_can_be_reused() {
    let (store, clock, _storage) = setup_store();

    store
        .create("https://example.com/old", Some(1), Some("reuse"))
        .await
        .unwrap();
    clock.advance(Duration::minutes(5));

    let created = store
        .create("https://example.com/new", Some(10), Some("reuse"))
        .await
        .unwrap();

    assert_eq!(created.record.long_url, "https://example.com/new");
    assert_eq!(
        store.resolve("reuse").await.unwrap().long_url,
        "https://example.com/new"
    );
}

#[tokio::test]
async fn test_record_click_appends_in_order() {
    let (store, clock, storage) = setup_store();

    let created = store
        .create("https://example.com/clicks", Some(60), Some("clicks"))
        .await
        .unwrap();

    for source in ["direct", "email", "social"] {
        clock.advance(Duration::seconds(10));
        let long_url = store.record_click("clicks", source).await.unwrap();
        assert_eq!(long_url.as_deref(), Some("https://example.com/clicks"));
    }

    let record = store.resolve("clicks").await.unwrap();
    let sources: Vec<_> = record.clicks.iter().map(|c| c.source.as_str()).collect();
    assert_eq!(sources, ["direct", "email", "social"]);
    assert!(record
        .clicks
        .iter()
        .all(|c| c.timestamp >= created.record.created_at && c.location == "Testland"));
    assert!(record
        .clicks
        .windows(2)
        .all(|pair| pair[0].timestamp <= pair[1].timestamp));

    assert_eq!(storage.snapshot()["clicks"].clicks.len(), 3);
}

#[tokio::test]
async fn test_record_click_on_missing_or_expired() {
    let (store, clock, _storage) = setup_store();

    assert_eq!(store.record_click("nothing", "direct").await.unwrap(), None);

    store
        .create("https://example.com/a", Some(1), Some("soon"))
        .await
        .unwrap();
    clock.advance(Duration::minutes(2));

    assert_eq!(store.record_click("soon", "direct").await.unwrap(), None);
    assert!(store.list_all().await.is_empty());
}

#[tokio::test]
async fn test_delete() {
    let (store, _clock, storage) = setup_store();

    store
        .create("https://example.com/a", None, Some("keep"))
        .await
        .unwrap();

    assert!(!store.delete("unknown").await.unwrap());
    assert_eq!(store.list_all().await.len(), 1);

    assert!(store.delete("keep").await.unwrap());
    assert!(store.resolve("keep").await.is_none());
    assert!(storage.snapshot().is_empty());

    // Idempotent
    assert!(!store.delete("keep").await.unwrap());
}

#[tokio::test]
async fn test_delete_removes_expired_record() {
    let (store, clock, _storage) = setup_store();

    store
        .create("https://example.com/a", Some(1), Some("stale"))
        .await
        .unwrap();
    clock.advance(Duration::minutes(2));

    assert!(store.delete("stale").await.unwrap());
}

#[tokio::test]
async fn test_purge_expired() {
    let (store, clock, storage) = setup_store();

    store
        .create("https://example.com/1", Some(1), Some("one"))
        .await
        .unwrap();
    store
        .create("https://example.com/2", Some(2), Some("two"))
        .await
        .unwrap();
    store
        .create("https://example.com/3", Some(60), Some("three"))
        .await
        .unwrap();

    assert_eq!(store.purge_expired().await.unwrap(), 0);

    clock.advance(Duration::minutes(3));
    assert_eq!(store.purge_expired().await.unwrap(), 2);

    let remaining = storage.snapshot();
    assert_eq!(remaining.len(), 1);
    assert!(remaining.contains_key("three"));
}

#[tokio::test]
async fn test_reload_reproduces_records() {
    let storage = Arc::new(MemoryStorage::new());
    let (store, _clock) = setup_store_with(storage.clone(), StoreOptions::default());

    store
        .create("https://example.com/a", Some(60), Some("alpha"))
        .await
        .unwrap();
    store.create("https://example.com/b", None, None).await.unwrap();
    store.record_click("alpha", "direct").await.unwrap();

    let mut before = store.list_all().await;
    drop(store);

    let (reloaded, _clock) = setup_store_with(storage, StoreOptions::default());
    let mut after = reloaded.list_all().await;

    before.sort_by(|a, b| a.short_code.cmp(&b.short_code));
    after.sort_by(|a, b| a.short_code.cmp(&b.short_code));
    assert_eq!(before, after);
    assert_eq!(reloaded.resolve("alpha").await.unwrap().clicks.len(), 1);
}

#[tokio::test]
async fn test_failed_load_starts_empty() {
    let (store, _clock) = setup_store_with(Arc::new(BrokenLoad), StoreOptions::default());

    assert!(store.list_all().await.is_empty());
    assert!(store
        .create("https://example.com", None, Some("fresh"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_failed_write_rolls_back_mutation() {
    let storage = Arc::new(FlakyStorage::default());
    let (store, _clock) = setup_store_with(storage.clone(), StoreOptions::default());

    store
        .create("https://example.com/a", Some(60), Some("stable"))
        .await
        .unwrap();

    storage.fail(true);

    assert!(matches!(
        store.create("https://example.com/b", None, Some("lost")).await,
        Err(StoreError::Persistence(_))
    ));
    assert!(store.resolve("lost").await.is_none());

    assert!(matches!(
        store.record_click("stable", "direct").await,
        Err(StoreError::Persistence(_))
    ));
    assert!(store.resolve("stable").await.unwrap().clicks.is_empty());

    assert!(matches!(
        store.delete("stable").await,
        Err(StoreError::Persistence(_))
    ));
    assert!(store.resolve("stable").await.is_some());

    storage.fail(false);
    assert_eq!(storage.inner.snapshot().len(), 1);
}

#[tokio::test]
async fn test_write_is_retried() {
    let storage = Arc::new(FlakyStorage::default());
    let (store, _clock) = setup_store_with(
        storage.clone(),
        StoreOptions {
            persist_attempts: 4,
            ..StoreOptions::default()
        },
    );

    storage.fail(true);
    let _ = store.create("https://example.com", None, Some("x")).await;
    assert_eq!(storage.save_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_generation_gives_up_when_attempts_run_out() {
    let storage = Arc::new(MemoryStorage::new());
    let (store, _clock) = setup_store_with(
        storage,
        StoreOptions {
            max_generation_attempts: 0,
            ..StoreOptions::default()
        },
    );

    assert!(matches!(
        store.create("https://example.com", None, None).await,
        Err(StoreError::CodeSpaceExhausted(0))
    ));
    // Custom codes do not depend on generation
    assert!(store
        .create("https://example.com", None, Some("manual"))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_concurrent_custom_code_claims() {
    let (store, _clock, _storage) = setup_store();
    let store = Arc::new(store);

    let mut handles = vec![];
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .create(&format!("https://example.com/{}", i), None, Some("contested"))
                .await
                .is_ok()
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(store.list_all().await.len(), 1);
}

#[tokio::test]
async fn test_expiry_sweeper_purges_in_background() {
    let (store, clock, storage) = setup_store();
    let store = Arc::new(store);

    store
        .create("https://example.com/gone", Some(1), Some("gone"))
        .await
        .unwrap();
    store
        .create("https://example.com/stays", Some(60), Some("stays"))
        .await
        .unwrap();
    clock.advance(Duration::minutes(2));

    let sweeper = spawn_expiry_sweeper(store.clone(), std::time::Duration::from_millis(20));
    tokio::time::sleep(std::time::Duration::from_millis(150)).await;
    sweeper.abort();

    let listed = store.list_all().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].short_code, "stays");
    assert!(!storage.snapshot().contains_key("gone"));
}
