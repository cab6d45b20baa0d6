/// Dedup Tracker Module
///
/// Keeps the list of source ids that were already republished in a flat
/// JSON array on disk. Every check reloads the whole file and every mark
/// rewrites it, so there is no in-memory state to go stale.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Persisted set of published ids
#[derive(Debug, Clone)]
pub struct DedupTracker {
    path: PathBuf,
}

impl DedupTracker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current contents of the id file, in insertion order
    pub fn load(&self) -> Vec<String> {
        load_ids(&self.path)
    }

    /// Check whether an id is already in the persisted set
    pub fn has_been_published(&self, id: &str) -> bool {
        self.load().iter().any(|seen| seen == id)
    }

    /// Append an id and rewrite the file
    ///
    /// Write failures are logged and swallowed; the mark is lost in that case.
    pub fn mark_published(&self, id: &str) {
        let mut ids = self.load();
        if ids.iter().any(|seen| seen == id) {
            log::debug!("Id {} already recorded in {}", id, self.path.display());
            return;
        }
        ids.push(id.to_string());

        if let Err(e) = save_ids(&self.path, &ids) {
            log::error!("Error saving JSON to {}: {:#}", self.path.display(), e);
        }
    }

    pub fn count(&self) -> usize {
        self.load().len()
    }
}

/// Read an id array from disk
///
/// A missing file is an empty set. An unreadable or corrupt file is logged
/// and also treated as empty, which drops the previous history.
pub fn load_ids(path: &Path) -> Vec<String> {
    if !path.exists() {
        return Vec::new();
    }

    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            log::error!("Failed to read {}: {}. Resetting.", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_str::<Vec<String>>(&content) {
        Ok(ids) => ids,
        Err(e) => {
            log::error!("Corrupted JSON file: {} ({}). Resetting.", path.display(), e);
            Vec::new()
        }
    }
}

/// Rewrite the whole id array
pub fn save_ids(path: &Path, ids: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let content = serde_json::to_string(ids).context("Failed to serialize id list")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
