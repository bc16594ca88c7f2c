//! Durable keyword batch queue
//!
//! Provides:
//! - The ordered set of keyword batches, oldest first
//! - Pluggable persistence (in-memory or a JSON file)
//! - The progress mutations used by the automation scheduler

use crate::errors::{AppError, Result};
use crate::models::{normalize_keywords, BatchStatus, KeywordBatch};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// Storage backend for the batch list
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// Load every stored batch in creation order
    async fn load(&self) -> Result<Vec<KeywordBatch>>;

    /// Replace the stored batch list
    async fn save(&self, batches: &[KeywordBatch]) -> Result<()>;
}

/// Process-local repository, nothing survives a restart
#[derive(Default)]
pub struct MemoryBatchRepository {
    snapshot: Mutex<Vec<KeywordBatch>>,
}

impl MemoryBatchRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BatchRepository for MemoryBatchRepository {
    async fn load(&self) -> Result<Vec<KeywordBatch>> {
        Ok(self.snapshot.lock().await.clone())
    }

    async fn save(&self, batches: &[KeywordBatch]) -> Result<()> {
        *self.snapshot.lock().await = batches.to_vec();
        Ok(())
    }
}

/// Repository backed by a single JSON document on disk
pub struct JsonFileBatchRepository {
    path: PathBuf,
}

impl JsonFileBatchRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "batches.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl BatchRepository for JsonFileBatchRepository {
    async fn load(&self) -> Result<Vec<KeywordBatch>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Vec::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| AppError::Persistence {
                message: format!("Failed to parse {}: {}", self.path.display(), e),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(AppError::Persistence {
                message: format!("Failed to read {}: {}", self.path.display(), e),
            }),
        }
    }

    async fn save(&self, batches: &[KeywordBatch]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = serde_json::to_vec_pretty(batches)?;
        let temp = self.temp_path();

        // Rename over the old file so readers never see a torn write
        tokio::fs::write(&temp, body).await?;
        tokio::fs::rename(&temp, &self.path).await?;

        debug!(path = %self.path.display(), count = batches.len(), "Batch queue persisted");
        Ok(())
    }
}

/// Ordered keyword batch queue.
///
/// Every mutation rewrites the full batch list through the repository.
pub struct BatchQueue {
    batches: RwLock<Vec<KeywordBatch>>,
    repository: Arc<dyn BatchRepository>,
}

impl BatchQueue {
    /// Open a queue, loading whatever the repository already holds
    pub async fn open(repository: Arc<dyn BatchRepository>) -> Result<Self> {
        let batches = repository.load().await?;
        info!(count = batches.len(), "Batch queue loaded");

        Ok(Self {
            batches: RwLock::new(batches),
            repository,
        })
    }

    /// Empty queue without durable storage
    pub fn in_memory() -> Self {
        Self {
            batches: RwLock::new(Vec::new()),
            repository: Arc::new(MemoryBatchRepository::new()),
        }
    }

    /// Queue a new batch and return its id.
    ///
    /// Blank keywords are dropped and only the first 100 are kept.
    pub async fn add_batch<I, S>(&self, keywords: I, category_id: &str) -> Result<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = normalize_keywords(keywords);
        if keywords.is_empty() {
            return Err(AppError::invalid_input("at least one non-blank keyword is required"));
        }

        let category_id = category_id.trim();
        if category_id.is_empty() {
            return Err(AppError::invalid_input("categoryId is required"));
        }

        let batch = KeywordBatch::new(keywords, category_id.to_string());
        let id = batch.id.clone();
        let total = batch.total_count;

        let mut batches = self.batches.write().await;
        batches.push(batch);
        self.persist(&batches).await?;

        info!(batch_id = %id, category_id, total, "Keyword batch added");
        Ok(id)
    }

    /// All batches in creation order
    pub async fn list_batches(&self) -> Vec<KeywordBatch> {
        self.batches.read().await.clone()
    }

    pub async fn get_batch(&self, id: &str) -> Result<KeywordBatch> {
        self.batches
            .read()
            .await
            .iter()
            .find(|b| b.id == id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    /// Remove a batch regardless of its status
    pub async fn delete_batch(&self, id: &str) -> Result<()> {
        let mut batches = self.batches.write().await;
        let before = batches.len();
        batches.retain(|b| b.id != id);

        if batches.len() == before {
            return Err(not_found(id));
        }

        self.persist(&batches).await?;
        info!(batch_id = %id, "Keyword batch deleted");
        Ok(())
    }

    /// Earliest-created batch that is pending or processing
    pub async fn select_next_batch(&self) -> Option<KeywordBatch> {
        self.batches
            .read()
            .await
            .iter()
            .find(|b| b.is_active())
            .cloned()
    }

    /// Number of batches still waiting for work
    pub async fn active_count(&self) -> usize {
        self.batches.read().await.iter().filter(|b| b.is_active()).count()
    }

    /// Move a pending batch to processing; other states are left alone
    pub async fn mark_processing(&self, id: &str) -> Result<KeywordBatch> {
        self.update(id, |batch| {
            if batch.status == BatchStatus::Pending {
                batch.status = BatchStatus::Processing;
            }
        })
        .await
    }

    /// Count one attempted keyword.
    ///
    /// `error` replaces the batch diagnostic, `None` clears it.
    pub async fn record_processed(&self, id: &str, error: Option<String>) -> Result<KeywordBatch> {
        self.update(id, |batch| {
            if batch.processed_count < batch.total_count {
                batch.processed_count += 1;
            }
            batch.last_error = error;
        })
        .await
    }

    /// Mark the batch completed once every keyword was attempted.
    ///
    /// Returns whether the batch is now completed.
    pub async fn complete_if_exhausted(&self, id: &str) -> Result<bool> {
        let batch = self
            .update(id, |batch| {
                if batch.is_exhausted() && batch.is_active() {
                    batch.status = BatchStatus::Completed;
                }
            })
            .await?;

        Ok(batch.status == BatchStatus::Completed)
    }

    /// Attach a diagnostic without touching status or progress
    pub async fn record_error(&self, id: &str, message: impl Into<String>) -> Result<()> {
        let message = message.into();
        self.update(id, |batch| batch.last_error = Some(message)).await?;
        Ok(())
    }

    async fn update<F>(&self, id: &str, mutate: F) -> Result<KeywordBatch>
    where
        F: FnOnce(&mut KeywordBatch),
    {
        let mut batches = self.batches.write().await;
        let batch = batches
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| not_found(id))?;

        mutate(batch);
        let updated = batch.clone();

        self.persist(&batches).await?;
        Ok(updated)
    }

    async fn persist(&self, batches: &[KeywordBatch]) -> Result<()> {
        self.repository.save(batches).await.map_err(|e| {
            warn!(error = %e, "Failed to persist batch queue");
            e
        })
    }
}

fn not_found(id: &str) -> AppError {
    AppError::BatchNotFound { id: id.to_string() }
}
