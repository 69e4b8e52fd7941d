use rand::RngExt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ShortenerConfig;
use crate::models::LinkRecord;
use crate::storage::{Storage, StorageError};

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a random alphanumeric short code
pub fn generate_short_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("failed to generate a unique short code after {0} attempts")]
    Exhausted(u32),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, Clone)]
pub struct Allocation {
    pub record: LinkRecord,
    /// False when the URL had already been shortened
    pub created: bool,
}

/// Hands out short codes for URLs, reusing the existing code of a URL that
/// was already shortened.
pub struct CodeAllocator {
    storage: Arc<dyn Storage>,
    code_length: usize,
    max_attempts: u32,
}

impl CodeAllocator {
    pub fn new(storage: Arc<dyn Storage>, config: &ShortenerConfig) -> Self {
        Self {
            storage,
            code_length: config.code_length,
            max_attempts: config.max_attempts.max(1),
        }
    }

    pub async fn allocate(
        &self,
        original_url: &str,
        owner: Option<&str>,
    ) -> Result<Allocation, AllocationError> {
        let length = self.code_length;
        self.allocate_with(original_url, owner, move || generate_short_code(length))
            .await
    }

    /// Same as [`allocate`](Self::allocate) with a caller-supplied code source.
    pub async fn allocate_with<F>(
        &self,
        original_url: &str,
        owner: Option<&str>,
        mut next_code: F,
    ) -> Result<Allocation, AllocationError>
    where
        F: FnMut() -> String + Send,
    {
        if let Some(record) = self.storage.find_by_url(original_url).await? {
            return Ok(Allocation {
                record,
                created: false,
            });
        }

        for attempt in 1..=self.max_attempts {
            let code = next_code();

            match self
                .storage
                .create_with_code(&code, original_url, owner)
                .await
            {
                Ok(record) => {
                    info!(short_code = %record.short_code, url = %record.original_url, "created short link");
                    return Ok(Allocation {
                        record,
                        created: true,
                    });
                }
                Err(StorageError::Conflict) => {
                    // Lost a race against a concurrent submission of the same URL
                    if let Some(record) = self.storage.find_by_url(original_url).await? {
                        return Ok(Allocation {
                            record,
                            created: false,
                        });
                    }
                    debug!(attempt, short_code = %code, "short code collision, retrying");
                }
                Err(StorageError::Other(e)) => return Err(e.into()),
            }
        }

        Err(AllocationError::Exhausted(self.max_attempts))
    }
}
