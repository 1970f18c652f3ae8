pub mod error;
pub mod format;
pub mod history;
pub mod params;
pub mod prompt;
pub mod request;
mod model_types;

pub use error::{CoreError, Result};
pub use format::OutputFormat;
pub use history::{ArtifactRecord, SessionHistory};
pub use model_types::ShapeModel;
pub use params::{GenerationParameters, SamplingOverrides};
pub use prompt::{PromptSource, RefinedPrompt};
pub use request::{
    ConditioningMode, Dimensions, FormFactor, GenerationRequest, Material, StyleKeyword,
};
