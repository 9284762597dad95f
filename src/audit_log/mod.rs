//! Audit log for accepted alerts
//!
//! ## Responsibilities
//!
//! - Append one formatted line per accepted alert to a log file
//! - Keep a bounded in-memory ring of recent entries for queries

use crate::detector::{DetectionKind, Severity};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

/// One audit entry
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub kind: DetectionKind,
    pub camera_id: usize,
    pub severity: Severity,
    pub message: String,
    pub evidence: Option<PathBuf>,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    fn format_line(&self) -> String {
        let image = self
            .evidence
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string());
        format!(
            "[{}] {} ALERT - Camera: {} | Severity: {} | Message: {} | Image: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.kind.as_str().to_uppercase(),
            self.camera_id,
            self.severity,
            self.message,
            image
        )
    }
}

struct AuditRing {
    entries: VecDeque<AuditEntry>,
    capacity: usize,
}

impl AuditRing {
    fn push(&mut self, entry: AuditEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

/// AuditLog instance
pub struct AuditLog {
    ring: RwLock<AuditRing>,
    file_path: Option<PathBuf>,
}

impl AuditLog {
    pub fn new(capacity: usize, file_path: Option<PathBuf>) -> Self {
        Self {
            ring: RwLock::new(AuditRing {
                entries: VecDeque::with_capacity(capacity),
                capacity: capacity.max(1),
            }),
            file_path,
        }
    }

    /// Record an entry in the ring and, when configured, the log file
    pub async fn append(&self, entry: AuditEntry) -> Result<()> {
        let line = entry.format_line();
        {
            let mut ring = self.ring.write().await;
            ring.push(entry);
        }

        if let Some(path) = &self.file_path {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .await?;
            file.write_all(line.as_bytes()).await?;
            file.write_all(b"\n").await?;
        }
        Ok(())
    }

    pub async fn latest(&self, count: usize) -> Vec<AuditEntry> {
        let ring = self.ring.read().await;
        ring.entries.iter().rev().take(count).cloned().collect()
    }

    pub async fn by_camera(&self, camera_id: usize, count: usize) -> Vec<AuditEntry> {
        let ring = self.ring.read().await;
        ring.entries
            .iter()
            .rev()
            .filter(|e| e.camera_id == camera_id)
            .take(count)
            .cloned()
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.ring.read().await.entries.len()
    }
}
