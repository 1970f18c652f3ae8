pub mod backend;
pub mod config;
pub mod error;
pub mod filename;
pub mod job;
pub mod logging;
pub mod pipeline;
pub mod refiner;
pub mod store;
pub mod text_service;
pub mod worker;

pub use config::Config;
pub use error::{AppError, ConfigError, FilenameError, PipelineError, StoreError, TextServiceError};
pub use filename::FilenameSynthesizer;
pub use pipeline::{Pipeline, PipelineEvent, PipelineOutput};
pub use refiner::PromptRefiner;
pub use store::ArtifactStore;
pub use text_service::{GeminiClient, TextService};
pub use worker::GenerationWorker;
