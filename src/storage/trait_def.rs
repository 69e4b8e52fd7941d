use crate::models::LinkRecord;
use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    /// A unique constraint (short code or original URL) rejected the insert
    #[error("short code or URL already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables, seed the data file, etc.)
    async fn init(&self) -> Result<()>;

    /// Insert a new record under a caller-provided code.
    ///
    /// Never overwrites: if the code or the URL is already stored the insert
    /// fails with [`StorageError::Conflict`] and nothing is written.
    async fn create_with_code(
        &self,
        short_code: &str,
        original_url: &str,
        owner: Option<&str>,
    ) -> StorageResult<LinkRecord>;

    /// Get a record by short code
    async fn get(&self, short_code: &str) -> Result<Option<LinkRecord>>;

    /// Get the record that already shortens `original_url`, if any
    async fn find_by_url(&self, original_url: &str) -> Result<Option<LinkRecord>>;

    /// Atomically add one click and return the destination URL.
    /// Returns `None` without touching anything when the code is unknown.
    async fn record_visit(&self, short_code: &str) -> Result<Option<String>>;

    /// Delete a record, returning whether it existed
    async fn delete(&self, short_code: &str) -> Result<bool>;

    /// All records, newest first
    async fn list(&self) -> Result<Vec<LinkRecord>>;

    /// Reset click counters to zero for the given codes, or for every record
    /// when `short_codes` is empty. Returns the number of records touched.
    async fn reset_clicks(&self, short_codes: &[String]) -> Result<u64>;
}
