//! Persistent record stores.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MemoryError, MemoryResult};

/// A persisted memory entry. Write-once; never mutated after storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// Unique record ID
    pub id: String,
    /// Free-text content: bug report + solution + context summary
    pub content: String,
    /// Metadata map (task_id, iterations, patch count, test-pass flag, ...)
    pub metadata: HashMap<String, serde_json::Value>,
    /// Embedding vector used for similarity search
    pub embedding: Vec<f32>,
    #[serde(rename = "storedAt")]
    pub stored_at: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(
        content: impl Into<String>,
        metadata: HashMap<String, serde_json::Value>,
        embedding: Vec<f32>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            metadata,
            embedding,
            stored_at: Utc::now(),
        }
    }
}

/// Insert-and-scan record storage.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Persist a record.
    async fn insert(&self, record: &MemoryRecord) -> MemoryResult<()>;

    /// Load every stored record.
    async fn load_all(&self) -> MemoryResult<Vec<MemoryRecord>>;

    /// Number of stored records.
    async fn count(&self) -> MemoryResult<usize> {
        Ok(self.load_all().await?.len())
    }
}

/// Volatile store for tests and memory-disabled runs.
#[derive(Default)]
pub struct InMemoryStore {
    records: RwLock<Vec<MemoryRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn insert(&self, record: &MemoryRecord) -> MemoryResult<()> {
        self.records
            .write()
            .map_err(|e| MemoryError::Store(e.to_string()))?
            .push(record.clone());
        Ok(())
    }

    async fn load_all(&self) -> MemoryResult<Vec<MemoryRecord>> {
        Ok(self
            .records
            .read()
            .map_err(|e| MemoryError::Store(e.to_string()))?
            .clone())
    }
}

/// Append-only JSONL store under the configured data directory.
///
/// Layout: `<data_dir>/memory.jsonl`, one record per line.
pub struct JsonlStore {
    path: PathBuf,
}

impl JsonlStore {
    /// Open (creating the directory if needed) the store under `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> MemoryResult<Self> {
        let dir = data_dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join("memory.jsonl"),
        })
    }
}

#[async_trait]
impl RecordStore for JsonlStore {
    async fn insert(&self, record: &MemoryRecord) -> MemoryResult<()> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let json = serde_json::to_string(record)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }

    async fn load_all(&self) -> MemoryResult<Vec<MemoryRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(content: &str) -> MemoryRecord {
        MemoryRecord::new(content, HashMap::new(), vec![1.0, 0.0])
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryStore::new();
        store.insert(&record("first")).await.unwrap();
        store.insert(&record("second")).await.unwrap();

        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_jsonl_store_roundtrip_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = JsonlStore::open(dir.path()).unwrap();
            store.insert(&record("persisted entry")).await.unwrap();
        }

        let store = JsonlStore::open(dir.path()).unwrap();
        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].content, "persisted entry");
        assert_eq!(records[0].embedding, vec![1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_jsonl_store_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStore::open(dir.path()).unwrap();
        assert!(store.load_all().await.unwrap().is_empty());
    }
}
