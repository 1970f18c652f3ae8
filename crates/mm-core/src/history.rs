use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use crate::format::OutputFormat;
use crate::prompt::RefinedPrompt;

/// One successfully persisted artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub prompt: RefinedPrompt,
    pub file_path: PathBuf,
    pub format: OutputFormat,
    pub timestamp: DateTime<Local>,
}

impl ArtifactRecord {
    /// Wall-clock time in the `03:04:05 PM` style shown next to history entries
    pub fn display_time(&self) -> String {
        self.timestamp.format("%I:%M:%S %p").to_string()
    }

    pub fn file_name(&self) -> String {
        self.file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Session-scoped, append-only list of artifacts.
///
/// Cloning shares the same list. Only the artifact store appends; readers
/// get snapshots ordered most recent first. Nothing is persisted.
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    records: Arc<RwLock<Vec<ArtifactRecord>>>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, record: ArtifactRecord) {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    /// Snapshot, most recent first
    pub fn recent(&self) -> Vec<ArtifactRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.iter().rev().cloned().collect()
    }

    /// `index` counts from the most recent entry
    pub fn get_recent(&self, index: usize) -> Option<ArtifactRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records.iter().rev().nth(index).cloned()
    }

    pub fn latest(&self) -> Option<ArtifactRecord> {
        self.get_recent(0)
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> ArtifactRecord {
        ArtifactRecord {
            prompt: RefinedPrompt::refined(format!("a {name}")),
            file_path: PathBuf::from(format!("out/{name}.obj")),
            format: OutputFormat::Obj,
            timestamp: Local::now(),
        }
    }

    #[test]
    fn test_recent_is_most_recent_first() {
        let history = SessionHistory::new();
        history.append(record("vase"));
        history.append(record("lamp"));

        let recent = history.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].file_name(), "lamp.obj");
        assert_eq!(history.get_recent(1).unwrap().file_name(), "vase.obj");
        assert!(history.get_recent(2).is_none());
    }

    #[test]
    fn test_clones_share_records() {
        let history = SessionHistory::new();
        let reader = history.clone();
        assert!(reader.is_empty());
        history.append(record("mug"));
        assert_eq!(reader.latest().unwrap().prompt.as_str(), "a mug");
    }
}
