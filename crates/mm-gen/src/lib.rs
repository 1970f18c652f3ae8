pub mod background;
pub mod decoder;
pub mod driver;
pub mod reclaim;
pub mod remote;
pub mod sampler;
pub mod text_to_image;

use mm_core::CoreError;
use mm_mesh::MeshError;
use thiserror::Error;

pub use background::{BackgroundRemover, BorderKeyRemover};
pub use decoder::{LatentDecoder, ProceduralDecoder};
pub use driver::{GenerationDriver, SamplingPlan};
pub use reclaim::{Accelerator, AcceleratorStatus, HostAccelerator, ReclaimGuard, ReclaimSummary, ResourceReclaimer};
pub use remote::RemoteService;
pub use sampler::{Conditioning, Latent, LatentSampler, SeededSampler, karras_sigmas};
pub use text_to_image::{ImageDiffuser, PlaceholderDiffuser, TextToImageConfig};

#[derive(Error, Debug)]
pub enum GenError {
    #[error("sampling failed: {0}")]
    Sampling(String),

    #[error("decoding failed: {0}")]
    Decoding(String),

    #[error("image generation failed: {0}")]
    ImageGeneration(String),

    #[error("background removal failed: {0}")]
    Background(String),

    #[error(transparent)]
    Parameters(#[from] CoreError),

    #[error("generation service error: {0}")]
    Service(String),

    #[error("failed to reach generation service: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Mesh(#[from] MeshError),
}

pub type Result<T> = std::result::Result<T, GenError>;
