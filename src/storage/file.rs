use crate::models::LinkRecord;
use crate::storage::{Storage, StorageError, StorageResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::info;

/// On-disk shape of a link. `id`, `createdAt` and `owner` are optional so
/// files that only carry `{shortCode, originalUrl, clickCount}` still load.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredLink {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<i64>,
    short_code: String,
    original_url: String,
    click_count: i64,
    #[serde(default)]
    created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    owner: Option<String>,
}

impl From<&LinkRecord> for StoredLink {
    fn from(record: &LinkRecord) -> Self {
        Self {
            id: Some(record.id),
            short_code: record.short_code.clone(),
            original_url: record.original_url.clone(),
            click_count: record.click_count,
            created_at: record.created_at,
            owner: record.owner.clone(),
        }
    }
}

/// JSON file storage ("mock mode").
///
/// Records live in memory in creation order and the whole file is rewritten
/// on every mutation. All mutations serialize on one mutex, and the in-memory
/// set is only replaced after the file write succeeded, so a failed write
/// leaves both unchanged. Other processes writing the same file are not
/// coordinated with.
pub struct FileStorage {
    path: PathBuf,
    records: Mutex<Vec<LinkRecord>>,
}

impl FileStorage {
    pub async fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = match tokio::fs::read_to_string(&path).await {
            Ok(content) => parse_records(&content)
                .with_context(|| format!("failed to parse link file {}", path.display()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read link file {}", path.display()))
            }
        };

        info!("Loaded {} links from {}", records.len(), path.display());

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, records: &[LinkRecord]) -> Result<()> {
        let stored: Vec<StoredLink> = records.iter().map(StoredLink::from).collect();
        let json = serde_json::to_string_pretty(&stored)?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "links.json".into());
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        tokio::fs::write(&tmp_path, json)
            .await
            .with_context(|| format!("failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("failed to replace {}", self.path.display()))?;

        Ok(())
    }
}

fn parse_records(content: &str) -> Result<Vec<LinkRecord>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let stored: Vec<StoredLink> = serde_json::from_str(content)?;
    let mut next_id = stored.iter().filter_map(|link| link.id).max().unwrap_or(0) + 1;

    let records = stored
        .into_iter()
        .map(|link| {
            let id = link.id.unwrap_or_else(|| {
                let id = next_id;
                next_id += 1;
                id
            });
            LinkRecord {
                id,
                short_code: link.short_code,
                original_url: link.original_url,
                click_count: link.click_count,
                created_at: link.created_at,
                owner: link.owner,
            }
        })
        .collect();

    Ok(records)
}

#[async_trait]
impl Storage for FileStorage {
    async fn init(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.path).await? {
            return Ok(());
        }

        let records = self.records.lock().await;
        self.persist(&records).await?;
        info!("Created link file: {}", self.path.display());

        Ok(())
    }

    async fn create_with_code(
        &self,
        short_code: &str,
        original_url: &str,
        owner: Option<&str>,
    ) -> StorageResult<LinkRecord> {
        let mut records = self.records.lock().await;

        let taken = records
            .iter()
            .any(|r| r.short_code == short_code || r.original_url == original_url);
        if taken {
            return Err(StorageError::Conflict);
        }

        let record = LinkRecord {
            id: records.iter().map(|r| r.id).max().unwrap_or(0) + 1,
            short_code: short_code.to_string(),
            original_url: original_url.to_string(),
            click_count: 0,
            created_at: chrono::Utc::now().timestamp(),
            owner: owner.map(String::from),
        };

        let mut next = records.clone();
        next.push(record.clone());
        self.persist(&next).await?;
        *records = next;

        Ok(record)
    }

    async fn get(&self, short_code: &str) -> Result<Option<LinkRecord>> {
        let records = self.records.lock().await;
        Ok(records.iter().find(|r| r.short_code == short_code).cloned())
    }

    async fn find_by_url(&self, original_url: &str) -> Result<Option<LinkRecord>> {
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .find(|r| r.original_url == original_url)
            .cloned())
    }

    async fn record_visit(&self, short_code: &str) -> Result<Option<String>> {
        let mut records = self.records.lock().await;

        let Some(index) = records.iter().position(|r| r.short_code == short_code) else {
            return Ok(None);
        };

        let mut next = records.clone();
        next[index].click_count += 1;
        self.persist(&next).await?;
        *records = next;

        Ok(Some(records[index].original_url.clone()))
    }

    async fn delete(&self, short_code: &str) -> Result<bool> {
        let mut records = self.records.lock().await;

        let Some(index) = records.iter().position(|r| r.short_code == short_code) else {
            return Ok(false);
        };

        let mut next = records.clone();
        next.remove(index);
        self.persist(&next).await?;
        *records = next;

        Ok(true)
    }

    async fn list(&self) -> Result<Vec<LinkRecord>> {
        let records = self.records.lock().await;
        let mut urls = records.clone();
        urls.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(urls)
    }

    async fn reset_clicks(&self, short_codes: &[String]) -> Result<u64> {
        let mut records = self.records.lock().await;

        let mut next = records.clone();
        let mut touched = 0;
        for record in next.iter_mut() {
            if short_codes.is_empty() || short_codes.contains(&record.short_code) {
                record.click_count = 0;
                touched += 1;
            }
        }

        if touched > 0 {
            self.persist(&next).await?;
            *records = next;
        }

        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_files_without_ids_or_timestamps() {
        let content = r#"[
            {"shortCode": "abc123", "originalUrl": "https://example.com", "clickCount": 4},
            {"id": 7, "shortCode": "xyz789", "originalUrl": "https://rust-lang.org", "clickCount": 0, "createdAt": 1700000000}
        ]"#;

        let records = parse_records(content).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].short_code, "abc123");
        assert_eq!(records[0].click_count, 4);
        assert_eq!(records[0].id, 8, "missing ids continue after the highest id");
        assert_eq!(records[0].created_at, 0);
        assert_eq!(records[1].id, 7);
        assert_eq!(records[1].owner, None);
    }

    #[test]
    fn empty_file_is_an_empty_set() {
        assert!(parse_records("").unwrap().is_empty());
        assert!(parse_records("[]").unwrap().is_empty());
    }

    #[test]
    fn rejects_records_missing_required_keys() {
        assert!(parse_records(r#"[{"shortCode": "abc123"}]"#).is_err());
    }

    #[tokio::test]
    async fn writes_camel_case_array_in_creation_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.json");
        let storage = FileStorage::new(&path).await.unwrap();
        storage.init().await.unwrap();

        storage
            .create_with_code("first1", "https://example.com/1", None)
            .await
            .unwrap();
        storage
            .create_with_code("second", "https://example.com/2", Some("42"))
            .await
            .unwrap();
        storage.record_visit("first1").await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let entries = raw.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["shortCode"], "first1");
        assert_eq!(entries[0]["originalUrl"], "https://example.com/1");
        assert_eq!(entries[0]["clickCount"], 1);
        assert!(entries[0].get("owner").is_none());
        assert_eq!(entries[1]["shortCode"], "second");
        assert_eq!(entries[1]["owner"], "42");
        assert!(!dir.path().join("links.json.tmp").exists());
    }

    #[tokio::test]
    async fn failed_write_leaves_state_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("links.json");
        let storage = FileStorage::new(&path).await.unwrap();

        let result = storage
            .create_with_code("abc123", "https://example.com", None)
            .await;
        assert!(matches!(result, Err(StorageError::Other(_))));
        assert!(storage.get("abc123").await.unwrap().is_none());
        assert!(storage.list().await.unwrap().is_empty());
    }
}
