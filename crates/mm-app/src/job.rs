use std::path::PathBuf;
use chrono::{DateTime, Utc};
use mm_core::{OutputFormat, PromptSource};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::pipeline::PipelineOutput;
use crate::worker::WorkerResponse;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Queued,
    Generating,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Generating)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// What a finished job produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobOutputs {
    pub prompt: String,
    pub prompt_source: PromptSource,
    pub file_path: PathBuf,
    pub format: OutputFormat,
    pub vertices: usize,
    pub faces: usize,
    pub holes_filled: usize,
}

impl From<&PipelineOutput> for JobOutputs {
    fn from(output: &PipelineOutput) -> Self {
        Self {
            prompt: output.record.prompt.as_str().to_string(),
            prompt_source: output.record.prompt.source(),
            file_path: output.record.file_path.clone(),
            format: output.record.format,
            vertices: output.report.vertices_after,
            faces: output.report.faces_after,
            holes_filled: output.report.holes_filled,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    /// 0..=1, sampling progress
    pub progress: f32,
    pub message: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub outputs: Option<JobOutputs>,
}

impl Job {
    pub fn queued(id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: JobStatus::Queued,
            progress: 0.0,
            message: Some("Waiting for the generation worker".into()),
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
            outputs: None,
        }
    }
}

/// Tracks the single in-flight (or most recent) job.
#[derive(Debug, Default)]
pub struct JobBoard {
    current: Option<Job>,
}

impl JobBoard {
    pub fn current(&self) -> Option<&Job> {
        self.current.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.current.as_ref().is_some_and(|job| job.status.is_active())
    }

    pub fn start(&mut self, id: Uuid) -> &Job {
        self.current.insert(Job::queued(id))
    }

    /// Applies a worker response. Responses for other jobs are ignored.
    pub fn apply(&mut self, response: WorkerResponse) {
        let Some(job) = self.current.as_mut().filter(|job| job.id == response.id()) else {
            return;
        };
        let now = Utc::now();
        job.updated_at = now;

        match response {
            WorkerResponse::Status { message, .. } => {
                job.status = JobStatus::Generating;
                job.message = Some(message);
            }
            WorkerResponse::Progress { fraction, .. } => {
                job.status = JobStatus::Generating;
                job.progress = fraction.clamp(0.0, 1.0);
            }
            WorkerResponse::Success { outputs, .. } => {
                job.status = JobStatus::Complete;
                job.progress = 1.0;
                job.message = Some("Generation complete".into());
                job.completed_at = Some(now);
                job.outputs = Some(outputs);
            }
            WorkerResponse::Error { message, .. } => {
                job.status = JobStatus::Failed;
                job.error = Some(message);
                job.completed_at = Some(now);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_flags() {
        assert!(JobStatus::Queued.is_active());
        assert!(JobStatus::Generating.is_active());
        assert!(JobStatus::Failed.is_complete());
        assert!(!JobStatus::Complete.is_active());
        assert_eq!(serde_json::to_string(&JobStatus::Generating).unwrap(), "\"GENERATING\"");
    }

    #[test]
    fn test_board_lifecycle() {
        let mut board = JobBoard::default();
        assert!(!board.is_busy());

        let id = Uuid::new_v4();
        board.start(id);
        assert!(board.is_busy());

        board.apply(WorkerResponse::Progress { id, fraction: 0.5 });
        assert_eq!(board.current().unwrap().status, JobStatus::Generating);
        assert_eq!(board.current().unwrap().progress, 0.5);

        board.apply(WorkerResponse::Error {
            id,
            message: "boom".into(),
        });
        let job = board.current().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some("boom"));
        assert!(!board.is_busy());
    }

    #[test]
    fn test_stale_responses_are_ignored() {
        let mut board = JobBoard::default();
        let id = Uuid::new_v4();
        board.start(id);
        board.apply(WorkerResponse::Status {
            id: Uuid::new_v4(),
            message: "other".into(),
        });
        assert_eq!(board.current().unwrap().status, JobStatus::Queued);
    }
}
