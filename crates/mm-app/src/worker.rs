use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};
use anyhow::{Context, anyhow};
use mm_core::GenerationRequest;
use tracing::info;
use uuid::Uuid;
use crate::error::PipelineError;
use crate::job::JobOutputs;
use crate::pipeline::{Pipeline, PipelineEvent};

pub enum WorkerCommand {
    Generate { id: Uuid, request: GenerationRequest },
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkerResponse {
    Status { id: Uuid, message: String },
    Progress { id: Uuid, fraction: f32 },
    Success { id: Uuid, outputs: JobOutputs },
    Error { id: Uuid, message: String },
}

impl WorkerResponse {
    pub fn id(&self) -> Uuid {
        match self {
            Self::Status { id, .. }
            | Self::Progress { id, .. }
            | Self::Success { id, .. }
            | Self::Error { id, .. } => *id,
        }
    }
}

/// Owns the pipeline on a dedicated thread and runs one request at a time.
pub struct GenerationWorker {
    pub(crate) command_tx: Sender<WorkerCommand>,
    pub(crate) response_rx: Receiver<WorkerResponse>,
    thread_handle: Option<JoinHandle<()>>,
}

impl GenerationWorker {
    /// Builds the pipeline on the worker thread and waits until it is ready.
    pub fn spawn<F>(factory: F) -> anyhow::Result<Self>
    where
        F: FnOnce() -> Result<Pipeline, PipelineError> + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = channel::<WorkerCommand>();
        let (resp_tx, resp_rx) = channel::<WorkerResponse>();
        let (ready_tx, ready_rx) = channel::<Result<(), PipelineError>>();

        let thread_handle = thread::Builder::new()
            .name("generation-worker".into())
            .spawn(move || {
                // Create pipeline in the worker thread
                let pipeline = match factory() {
                    Ok(pipeline) => {
                        let _ = ready_tx.send(Ok(()));
                        pipeline
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                loop {
                    match cmd_rx.recv() {
                        Ok(WorkerCommand::Generate { id, request }) => {
                            run_job(&pipeline, id, &request, &resp_tx);
                        }
                        Ok(WorkerCommand::Shutdown) => break,
                        // Channel closed, exit
                        Err(_) => break,
                    }
                }
                info!("Generation worker stopped");
            })
            .context("failed to spawn generation worker")?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                command_tx: cmd_tx,
                response_rx: resp_rx,
                thread_handle: Some(thread_handle),
            }),
            Ok(Err(e)) => {
                let _ = thread_handle.join();
                Err(anyhow::Error::from(e).context("failed to build generation pipeline"))
            }
            Err(_) => {
                let _ = thread_handle.join();
                Err(anyhow!("generation worker exited during startup"))
            }
        }
    }

    pub fn send_request(&self, id: Uuid, request: GenerationRequest) -> Result<(), String> {
        self.command_tx
            .send(WorkerCommand::Generate { id, request })
            .map_err(|e| format!("Failed to send request to worker: {}", e))
    }

    pub fn try_recv_response(&self) -> Option<WorkerResponse> {
        self.response_rx.try_recv().ok()
    }

    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for GenerationWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_job(pipeline: &Pipeline, id: Uuid, request: &GenerationRequest, resp_tx: &Sender<WorkerResponse>) {
    let _ = resp_tx.send(WorkerResponse::Status {
        id,
        message: format!("Generating '{}'", request.product_name),
    });

    let mut forward = |event: PipelineEvent| {
        let response = match event {
            PipelineEvent::Stage(message) => WorkerResponse::Status { id, message },
            PipelineEvent::Sampling { step, total } => WorkerResponse::Progress {
                id,
                fraction: step as f32 / total.max(1) as f32,
            },
        };
        let _ = resp_tx.send(response);
    };

    let response = match pipeline.run(request, &mut forward) {
        Ok(output) => WorkerResponse::Success {
            id,
            outputs: JobOutputs::from(&output),
        },
        Err(e) => WorkerResponse::Error {
            id,
            message: e.to_string(),
        },
    };
    let _ = resp_tx.send(response);
}
