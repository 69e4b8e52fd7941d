use crate::models::LinkRecord;
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::sync::Arc;

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS urls (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                short_code TEXT NOT NULL UNIQUE,
                original_url TEXT NOT NULL UNIQUE,
                click_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                owner TEXT
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_urls_created_at ON urls(created_at)")
            .execute(self.pool.as_ref())
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_urls_click_count ON urls(click_count)")
            .execute(self.pool.as_ref())
            .await?;

        Ok(())
    }

    async fn create_with_code(
        &self,
        short_code: &str,
        original_url: &str,
        owner: Option<&str>,
    ) -> StorageResult<LinkRecord> {
        let created_at = chrono::Utc::now().timestamp();

        // No conflict target: either unique column makes this a no-op
        let inserted = sqlx::query_as::<_, LinkRecord>(
            r#"
            INSERT INTO urls (short_code, original_url, created_at, owner)
            VALUES (?, ?, ?, ?)
            ON CONFLICT DO NOTHING
            RETURNING id, short_code, original_url, click_count, created_at, owner
            "#,
        )
        .bind(short_code)
        .bind(original_url)
        .bind(created_at)
        .bind(owner)
        .fetch_optional(self.pool.as_ref())
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        inserted.ok_or(StorageError::Conflict)
    }

    async fn get(&self, short_code: &str) -> Result<Option<LinkRecord>> {
        let url = sqlx::query_as::<_, LinkRecord>(
            r#"
            SELECT id, short_code, original_url, click_count, created_at, owner
            FROM urls
            WHERE short_code = ?
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(url)
    }

    async fn find_by_url(&self, original_url: &str) -> Result<Option<LinkRecord>> {
        let url = sqlx::query_as::<_, LinkRecord>(
            r#"
            SELECT id, short_code, original_url, click_count, created_at, owner
            FROM urls
            WHERE original_url = ?
            "#,
        )
        .bind(original_url)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(url)
    }

    async fn record_visit(&self, short_code: &str) -> Result<Option<String>> {
        let destination = sqlx::query_scalar::<_, String>(
            r#"
            UPDATE urls
            SET click_count = click_count + 1
            WHERE short_code = ?
            RETURNING original_url
            "#,
        )
        .bind(short_code)
        .fetch_optional(self.pool.as_ref())
        .await?;

        Ok(destination)
    }

    async fn delete(&self, short_code: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM urls WHERE short_code = ?")
            .bind(short_code)
            .execute(self.pool.as_ref())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<LinkRecord>> {
        let urls = sqlx::query_as::<_, LinkRecord>(
            r#"
            SELECT id, short_code, original_url, click_count, created_at, owner
            FROM urls
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(urls)
    }

    async fn reset_clicks(&self, short_codes: &[String]) -> Result<u64> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("UPDATE urls SET click_count = 0");
        if !short_codes.is_empty() {
            builder.push(" WHERE short_code IN (");
            let mut separated = builder.separated(", ");
            for code in short_codes {
                separated.push_bind(code.as_str());
            }
            separated.push_unseparated(")");
        }

        let result = builder.build().execute(self.pool.as_ref()).await?;

        Ok(result.rows_affected())
    }
}
