// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local Filesystem Decision Store
//!
//! Filesystem-based implementation of `DecisionStore` for single-node
//! operation and audit review. Each record is one pretty-printed JSON file
//! named `<disruption_id>-<record_id>.json` under the base directory.
//!
//! **Limitations:**
//! - No multi-node sharing (files only accessible on local machine)
//! - `find_by_disruption` scans the directory

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::domain::disruption::DisruptionId;
use crate::domain::repository::{DecisionRecord, DecisionStore, PersistenceError};

pub struct LocalDecisionStore {
    /// Base directory for decision records (e.g., "./decisions")
    base_path: PathBuf,
}

impl LocalDecisionStore {
    /// The directory is created on first write.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Read one record back for audit review.
    pub async fn load(path: impl AsRef<Path>) -> Result<DecisionRecord, PersistenceError> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            PersistenceError::Io(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl DecisionStore for LocalDecisionStore {
    async fn put(&self, record: &DecisionRecord) -> Result<String, PersistenceError> {
        tokio::fs::create_dir_all(&self.base_path).await.map_err(|e| {
            PersistenceError::Io(format!(
                "Failed to create decision directory {}: {}",
                self.base_path.display(),
                e
            ))
        })?;

        let path = self.base_path.join(record.object_key());
        let json = serde_json::to_vec_pretty(record)?;

        // Write to a temp file and rename so readers never see a partial record
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(path = %path.display(), bytes = json.len(), "Wrote decision record");
        Ok(path.display().to_string())
    }

    async fn find_by_disruption(
        &self,
        disruption_id: DisruptionId,
    ) -> Result<Vec<DecisionRecord>, PersistenceError> {
        let mut entries = match tokio::fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let prefix = format!("{}-", disruption_id);
        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".json") {
                records.push(Self::load(entry.path()).await?);
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}
