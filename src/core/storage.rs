// Statistics persistence gateway: load and save the single statistics record

use crate::models::statistics::StatisticsRecord;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Other(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Key-value backed store for the statistics record
#[async_trait]
pub trait StatisticsStore: Send + Sync {
    /// Stored record, or None on first-ever use
    async fn load(&self) -> StorageResult<Option<StatisticsRecord>>;

    async fn save(&self, record: &StatisticsRecord) -> StorageResult<()>;
}

/// Keeps the record as serialized JSON in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStatisticsStore {
    value: Arc<RwLock<Option<String>>>,
}

impl MemoryStatisticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an existing record
    pub fn with_record(record: &StatisticsRecord) -> StorageResult<Self> {
        let json = serde_json::to_string(record)?;
        Ok(Self {
            value: Arc::new(RwLock::new(Some(json))),
        })
    }
}

#[async_trait]
impl StatisticsStore for MemoryStatisticsStore {
    async fn load(&self) -> StorageResult<Option<StatisticsRecord>> {
        match self.value.read().await.as_deref() {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &StatisticsRecord) -> StorageResult<()> {
        let json = serde_json::to_string(record)?;
        *self.value.write().await = Some(json);
        Ok(())
    }
}

/// Load the record, falling back to zeroed defaults on first-ever use
pub async fn load_or_default(store: &dyn StatisticsStore) -> StorageResult<StatisticsRecord> {
    Ok(store.load().await?.unwrap_or_default())
}

/// Replace the stored record with zeroed defaults
pub async fn reset_statistics(store: &dyn StatisticsStore) -> StorageResult<StatisticsRecord> {
    let record = StatisticsRecord::default();
    store.save(&record).await?;
    Ok(record)
}
