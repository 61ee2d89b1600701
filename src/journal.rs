//! Run journal
//!
//! Appends JSON lines to `/var/log/unison-bootstrap.jsonl` describing each
//! run and the outcome of every stage. Write failures only produce a warning.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;
use uuid::Uuid;

/// Append-only JSON lines journal, one per run
pub struct Journal {
    path: Option<PathBuf>,
    run_id: Uuid,
}

impl Journal {
    /// Journal writing to `path`, or a no-op journal when `None`
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            run_id: Uuid::new_v4(),
        }
    }

    /// Journal that records nothing
    pub fn disabled() -> Self {
        Self::new(None)
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Record an event with arbitrary JSON data
    pub async fn record(&self, event: &str, data: &serde_json::Value) {
        let Some(path) = &self.path else {
            return;
        };

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "run_id": self.run_id.to_string(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal entry: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = Self::append(path, &line).await {
            warn!("Failed to write journal {}: {}", path.display(), e);
        }
    }

    async fn append(path: &Path, line: &str) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
