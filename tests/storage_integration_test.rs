//! Integration tests for the storage backends
//!
//! Each scenario runs against SQLite and the JSON file backend, and against
//! PostgreSQL when `DATABASE_URL` points at a server.
//!
//! Tests can be filtered by database backend using the DATABASE_BACKEND environment variable:
//! - `DATABASE_BACKEND=sqlite cargo test` - Run only SQLite tests
//! - `DATABASE_BACKEND=file cargo test` - Run only file backend tests
//! - `DATABASE_BACKEND=postgres cargo test` - Run only PostgreSQL tests
//! - By default, every backend that is available is tested

use linkcrush::storage::{FileStorage, PostgresStorage, SqliteStorage, Storage, StorageError};
use std::sync::Arc;
use tempfile::TempDir;

/// Get the database backend to test from environment variable
fn should_test_backend(backend: &str) -> bool {
    match std::env::var("DATABASE_BACKEND") {
        Ok(val) => val.to_lowercase() == backend.to_lowercase(),
        Err(_) => true, // Test all backends if not specified
    }
}

/// Helper to create SQLite test storage
async fn create_sqlite_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 1).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

/// Helper to create file test storage; keep the dir alive for the test
async fn create_file_storage() -> (Arc<dyn Storage>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::new(dir.path().join("urls.json")).await.unwrap();
    storage.init().await.unwrap();
    (Arc::new(storage), dir)
}

/// Helper to create PostgreSQL test storage with an empty table
async fn create_postgres_storage() -> Option<Arc<dyn Storage>> {
    let db_url = std::env::var("DATABASE_URL").ok()?;
    if !db_url.starts_with("postgres") {
        return None;
    }
    let storage = PostgresStorage::new(&db_url, 5).await.ok()?;
    storage.init().await.ok()?;
    let storage: Arc<dyn Storage> = Arc::new(storage);
    for record in storage.list().await.ok()? {
        storage.delete(&record.short_code).await.ok()?;
    }
    Some(storage)
}

async fn check_concurrent_same_code(storage: Arc<dyn Storage>) {
    let mut handles = vec![];

    // Try to claim the same code for different URLs concurrently
    for i in 0..10 {
        let storage_clone = Arc::clone(&storage);
        let handle = tokio::spawn(async move {
            storage_clone
                .create_with_code(
                    "same01",
                    &format!("https://example.com/{}", i),
                    Some(&format!("user{}", i)),
                )
                .await
        });
        handles.push(handle);
    }

    // Exactly one should succeed, others should get Conflict error
    let mut success_count = 0;
    let mut conflict_count = 0;

    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => success_count += 1,
            Err(StorageError::Conflict) => conflict_count += 1,
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    assert_eq!(success_count, 1, "Exactly one creation should succeed");
    assert_eq!(conflict_count, 9, "All others should conflict");
    assert_eq!(storage.list().await.unwrap().len(), 1);
}

async fn check_concurrent_same_url(storage: Arc<dyn Storage>) {
    let mut handles = vec![];

    for i in 0..10 {
        let storage_clone = Arc::clone(&storage);
        let handle = tokio::spawn(async move {
            storage_clone
                .create_with_code(&format!("code{:02}", i), "https://example.com/dup", None)
                .await
        });
        handles.push(handle);
    }

    let mut success_count = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => success_count += 1,
            Err(StorageError::Conflict) => {}
            Err(e) => panic!("Unexpected error: {:?}", e),
        }
    }

    assert_eq!(success_count, 1, "A URL may only be stored once");
}

async fn check_concurrent_visits(storage: Arc<dyn Storage>) {
    storage
        .create_with_code("hot001", "https://example.com/hot", None)
        .await
        .unwrap();

    let mut handles = vec![];
    for _ in 0..50 {
        let storage_clone = Arc::clone(&storage);
        handles.push(tokio::spawn(async move {
            storage_clone.record_visit("hot001").await
        }));
    }

    for handle in handles {
        let destination = handle.await.unwrap().unwrap();
        assert_eq!(destination.as_deref(), Some("https://example.com/hot"));
    }

    let record = storage.get("hot001").await.unwrap().unwrap();
    assert_eq!(record.click_count, 50, "No click may be lost");
}

async fn check_unknown_visit(storage: Arc<dyn Storage>) {
    storage
        .create_with_code("known1", "https://example.com/known", None)
        .await
        .unwrap();

    assert_eq!(storage.record_visit("nope00").await.unwrap(), None);

    let records = storage.list().await.unwrap();
    assert_eq!(records.len(), 1, "No record may be created");
    assert_eq!(records[0].click_count, 0, "No counter may be touched");
}

async fn check_create_get_delete(storage: Arc<dyn Storage>) {
    let created = storage
        .create_with_code("abc123", "https://example.com/page", Some("42"))
        .await
        .unwrap();
    assert_eq!(created.short_code, "abc123");
    assert_eq!(created.original_url, "https://example.com/page");
    assert_eq!(created.click_count, 0);
    assert_eq!(created.owner.as_deref(), Some("42"));
    assert!(created.created_at > 0);

    let fetched = storage.get("abc123").await.unwrap().unwrap();
    assert_eq!(fetched, created);

    let by_url = storage
        .find_by_url("https://example.com/page")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_url.short_code, "abc123");
    assert!(storage
        .find_by_url("https://example.com/other")
        .await
        .unwrap()
        .is_none());

    assert!(storage.delete("abc123").await.unwrap());
    assert!(!storage.delete("abc123").await.unwrap());
    assert!(storage.get("abc123").await.unwrap().is_none());
    assert_eq!(storage.record_visit("abc123").await.unwrap(), None);
}

#[tokio::test]
async fn test_concurrent_same_code_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_concurrent_same_code(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_concurrent_same_code_file() {
    if !should_test_backend("file") {
        return;
    }
    let (storage, _dir) = create_file_storage().await;
    check_concurrent_same_code(storage).await;
}

#[tokio::test]
async fn test_concurrent_same_url_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_concurrent_same_url(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_concurrent_same_url_file() {
    if !should_test_backend("file") {
        return;
    }
    let (storage, _dir) = create_file_storage().await;
    check_concurrent_same_url(storage).await;
}

#[tokio::test]
async fn test_concurrent_visits_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_concurrent_visits(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_concurrent_visits_file() {
    if !should_test_backend("file") {
        return;
    }
    let (storage, _dir) = create_file_storage().await;
    check_concurrent_visits(storage).await;
}

#[tokio::test]
async fn test_unknown_visit_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_unknown_visit(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_unknown_visit_file() {
    if !should_test_backend("file") {
        return;
    }
    let (storage, _dir) = create_file_storage().await;
    check_unknown_visit(storage).await;
}

#[tokio::test]
async fn test_create_get_delete_sqlite() {
    if !should_test_backend("sqlite") {
        return;
    }
    check_create_get_delete(create_sqlite_storage().await).await;
}

#[tokio::test]
async fn test_create_get_delete_file() {
    if !should_test_backend("file") {
        return;
    }
    let (storage, _dir) = create_file_storage().await;
    check_create_get_delete(storage).await;
}

#[tokio::test]
async fn test_file_storage_survives_reload() {
    if !should_test_backend("file") {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.json");

    {
        let storage = FileStorage::new(&path).await.unwrap();
        storage.init().await.unwrap();
        storage
            .create_with_code("keep01", "https://example.com/keep", Some("9"))
            .await
            .unwrap();
        storage
            .create_with_code("gone01", "https://example.com/gone", None)
            .await
            .unwrap();
        storage.record_visit("keep01").await.unwrap();
        storage.record_visit("keep01").await.unwrap();
        storage.delete("gone01").await.unwrap();
    }

    let reopened = FileStorage::new(&path).await.unwrap();
    reopened.init().await.unwrap();

    let record = reopened.get("keep01").await.unwrap().unwrap();
    assert_eq!(record.click_count, 2);
    assert_eq!(record.owner.as_deref(), Some("9"));
    assert!(reopened.get("gone01").await.unwrap().is_none());
    assert_eq!(reopened.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_file_storage_reads_minimal_format() {
    if !should_test_backend("file") {
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("urls.json");
    std::fs::write(
        &path,
        r#"[{"shortCode": "legacy", "originalUrl": "https://example.com", "clickCount": 5}]"#,
    )
    .unwrap();

    let storage = FileStorage::new(&path).await.unwrap();
    storage.init().await.unwrap();

    assert_eq!(
        storage.record_visit("legacy").await.unwrap().as_deref(),
        Some("https://example.com")
    );
    let record = storage.get("legacy").await.unwrap().unwrap();
    assert_eq!(record.click_count, 6);
    assert_eq!(record.id, 1);
}

#[tokio::test]
async fn test_create_get_delete_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    check_create_get_delete(storage).await;
}

#[tokio::test]
async fn test_concurrent_visits_postgres() {
    if !should_test_backend("postgres") {
        return;
    }
    let Some(storage) = create_postgres_storage().await else {
        return;
    };
    check_concurrent_visits(storage).await;
}
