use std::sync::{Mutex, PoisonError};
use mm_core::{ArtifactRecord, GenerationRequest};
use uuid::Uuid;
use crate::error::AppError;
use crate::job::{Job, JobBoard};
use crate::store::ArtifactStore;
use crate::worker::GenerationWorker;

pub struct GenState {
    worker: Mutex<GenerationWorker>,
    jobs: Mutex<JobBoard>,
    store: ArtifactStore,
}

impl GenState {
    pub fn new(worker: GenerationWorker, store: ArtifactStore) -> Self {
        Self {
            worker: Mutex::new(worker),
            jobs: Mutex::new(JobBoard::default()),
            store,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Drains pending worker responses into the job board.
    pub fn sync(&self) {
        let responses: Vec<_> = {
            let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
            std::iter::from_fn(|| worker.try_recv_response()).collect()
        };
        if responses.is_empty() {
            return;
        }
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        for response in responses {
            jobs.apply(response);
        }
    }

    /// Queues a request, refusing while another one is in flight.
    pub fn submit(&self, request: GenerationRequest) -> Result<Job, AppError> {
        self.sync();
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if jobs.is_busy() {
            return Err(AppError::Busy);
        }

        let id = Uuid::new_v4();
        self.worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .send_request(id, request)
            .map_err(AppError::BackendError)?;
        Ok(jobs.start(id).clone())
    }

    pub fn current_job(&self) -> Option<Job> {
        self.sync();
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current()
            .cloned()
    }

    pub fn history(&self) -> Vec<ArtifactRecord> {
        self.store.history().recent()
    }
}
