//! JSON snapshots of a store's contents.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use masterytrace_core::attempt::Attempt;
use masterytrace_core::model::MasteryRecord;

/// Serialized contents of a [`MemoryStore`](crate::MemoryStore).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub mastery: Vec<MasteryRecord>,
    #[serde(default)]
    pub attempts: Vec<Attempt>,
}

impl Snapshot {
    /// Save the snapshot as JSON, creating parent directories as needed.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize snapshot")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        tracing::debug!(
            "saved snapshot with {} records to {}",
            self.mastery.len(),
            path.display()
        );
        Ok(())
    }

    /// Load a snapshot from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot from {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse snapshot JSON: {}", path.display()))
    }

    /// Load a snapshot if the file exists, else start empty.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load_json(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Mastery records of one user, in stored order.
    pub fn mastery_for<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a MasteryRecord> {
        self.mastery.iter().filter(move |r| r.user_id == user_id)
    }
}
