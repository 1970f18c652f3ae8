use std::path::PathBuf;
use mm_core::{ArtifactRecord, OutputFormat, PromptSource};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::job::JobStatus;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobCreateResponse {
    pub id: Uuid,
    pub status: JobStatus,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    /// Position counted from the most recent entry
    pub index: usize,
    pub prompt: String,
    pub prompt_source: PromptSource,
    pub file_name: String,
    pub file_path: PathBuf,
    pub format: OutputFormat,
    pub timestamp: String,
    pub display_time: String,
}

impl HistoryEntry {
    pub fn new(index: usize, record: &ArtifactRecord) -> Self {
        Self {
            index,
            prompt: record.prompt.as_str().to_string(),
            prompt_source: record.prompt.source(),
            file_name: record.file_name(),
            file_path: record.file_path.clone(),
            format: record.format,
            timestamp: record.timestamp.to_rfc3339(),
            display_time: record.display_time(),
        }
    }
}
