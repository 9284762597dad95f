//! Alert persistence
//!
//! ## Responsibilities
//!
//! - Persist accepted alerts for the external review surface
//! - Assign monotonic alert ids
//!
//! The shipped store appends one JSON object per line to a file the
//! dashboard tails; swapping in a database-backed store only means
//! implementing the trait.

use crate::alert::AlertRecord;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// Destination for accepted alerts
#[async_trait]
pub trait AlertStore: Send + Sync {
    /// Persist one record, returning its assigned id
    async fn persist(&self, record: &AlertRecord) -> Result<u64>;
}

/// Append-only JSON-lines store
pub struct JsonlAlertStore {
    path: PathBuf,
    next_id: AtomicU64,
}

impl JsonlAlertStore {
    /// Open (or create) the store file. Ids continue after any records
    /// already present.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let existing = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents.lines().filter(|l| !l.trim().is_empty()).count() as u64,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            path = %path.display(),
            existing_records = existing,
            "Alert store opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            next_id: AtomicU64::new(existing + 1),
        })
    }
}

#[async_trait]
impl AlertStore for JsonlAlertStore {
    async fn persist(&self, record: &AlertRecord) -> Result<u64> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut record = record.clone();
        record.id = Some(id);

        let line = serde_json::to_string(&record)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                Error::Persistence(format!("cannot open {}: {e}", self.path.display()))
            })?;
        file.write_all(line.as_bytes()).await.map_err(|e| {
            Error::Persistence(format!("cannot append to {}: {e}", self.path.display()))
        })?;
        file.write_all(b"\n").await.map_err(|e| {
            Error::Persistence(format!("cannot append to {}: {e}", self.path.display()))
        })?;

        Ok(id)
    }
}

/// In-memory store for tests and dry runs
#[derive(Default)]
pub struct MemoryAlertStore {
    records: RwLock<Vec<AlertRecord>>,
}

impl MemoryAlertStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AlertRecord> {
        self.records.read().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl AlertStore for MemoryAlertStore {
    async fn persist(&self, record: &AlertRecord) -> Result<u64> {
        let mut records = self.records.write().await;
        let id = records.len() as u64 + 1;
        let mut record = record.clone();
        record.id = Some(id);
        records.push(record);
        Ok(id)
    }
}
