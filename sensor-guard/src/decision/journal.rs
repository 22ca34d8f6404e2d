use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::anomaly::AnomalyRecord;
use crate::error::{GuardError, Result};

/// One line of the decision journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub cycle: u64,
    pub decided_at: DateTime<Utc>,
    pub anomalies: Vec<AnomalyRecord>,
    pub decision: String,
}

/// Append-only JSON Lines log of decision cycles.
#[derive(Debug, Clone)]
pub struct DecisionJournal {
    path: PathBuf,
}

impl DecisionJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `entry` as a single line, creating the file if needed.
    pub async fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                GuardError::data_source_with_source(
                    self.path.display().to_string(),
                    "Failed to open decision journal",
                    Box::new(e),
                )
            })?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    /// Reads every entry back; lines that do not parse are an error.
    pub async fn read_all(&self) -> Result<Vec<JournalEntry>> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        contents
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(GuardError::from))
            .collect()
    }
}
