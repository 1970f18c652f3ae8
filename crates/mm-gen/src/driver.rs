use mm_core::{
    ConditioningMode, GenerationParameters, GenerationRequest, RefinedPrompt, SamplingOverrides,
    ShapeModel,
};
use mm_mesh::RawDecodedMesh;
use tracing::info;
use crate::background::{BackgroundRemover, BorderKeyRemover};
use crate::decoder::{LatentDecoder, ProceduralDecoder};
use crate::sampler::{Conditioning, LatentSampler, SeededSampler};
use crate::text_to_image::{ImageDiffuser, PlaceholderDiffuser, TextToImageConfig};
use crate::{GenError, Result};

/// Everything a single generation call needs besides the prompt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingPlan {
    pub params: GenerationParameters,
    pub mode: ConditioningMode,
    pub frame_size: u32,
    pub seed: Option<u32>,
}

/// Runs the text or image branch from a refined prompt to raw mesh buffers.
///
/// The driver owns its component defaults. Per-call values are resolved into
/// a fresh [`SamplingPlan`] and never written back.
pub struct GenerationDriver {
    text_sampler: Box<dyn LatentSampler>,
    image_sampler: Box<dyn LatentSampler>,
    decoder: Box<dyn LatentDecoder>,
    diffuser: Box<dyn ImageDiffuser>,
    background: Box<dyn BackgroundRemover>,
    defaults: GenerationParameters,
    image_guidance_scale: f32,
}

impl GenerationDriver {
    pub fn new(
        text_sampler: Box<dyn LatentSampler>,
        image_sampler: Box<dyn LatentSampler>,
        decoder: Box<dyn LatentDecoder>,
        diffuser: Box<dyn ImageDiffuser>,
        background: Box<dyn BackgroundRemover>,
    ) -> Self {
        Self {
            text_sampler,
            image_sampler,
            decoder,
            diffuser,
            background,
            defaults: GenerationParameters::default(),
            image_guidance_scale: TextToImageConfig::default().guidance_scale,
        }
    }

    /// In-process models only.
    pub fn local(latent_dim: usize) -> Self {
        Self::new(
            Box::new(SeededSampler::new(ShapeModel::Text300M, latent_dim)),
            Box::new(SeededSampler::new(ShapeModel::Image300M, latent_dim)),
            Box::new(ProceduralDecoder::default()),
            Box::new(PlaceholderDiffuser::default()),
            Box::new(BorderKeyRemover::default()),
        )
    }

    pub fn with_defaults(mut self, defaults: GenerationParameters) -> Result<Self> {
        defaults.validate()?;
        self.defaults = defaults;
        Ok(self)
    }

    pub fn defaults(&self) -> &GenerationParameters {
        &self.defaults
    }

    pub fn image_guidance_scale(&self) -> f32 {
        self.image_guidance_scale
    }

    pub fn resolve(&self, overrides: &SamplingOverrides) -> Result<GenerationParameters> {
        Ok(overrides.apply(&self.defaults)?)
    }

    /// Resolves a validated request into a plan against this driver's defaults.
    pub fn plan(&self, request: &GenerationRequest) -> Result<SamplingPlan> {
        request.validate()?;
        Ok(SamplingPlan {
            params: self.resolve(&request.overrides())?,
            mode: request.mode,
            frame_size: request.frame_size,
            seed: request.seed,
        })
    }

    pub fn generate(
        &self,
        prompt: &RefinedPrompt,
        plan: &SamplingPlan,
        progress: &mut dyn FnMut(u32, u32),
    ) -> Result<RawDecodedMesh> {
        plan.params.validate()?;
        if plan.frame_size == 0 {
            return Err(GenError::Decoding("frame size must be positive".into()));
        }

        let latent = match plan.mode {
            ConditioningMode::Text => {
                info!("Sampling with {}", self.text_sampler.model().name());
                self.text_sampler.sample(
                    Conditioning::Text(prompt.as_str()),
                    &plan.params,
                    plan.seed,
                    progress,
                )?
            }
            ConditioningMode::Image => {
                info!(
                    "Rendering reference image (guidance {})",
                    self.image_guidance_scale
                );
                let image = self
                    .diffuser
                    .text_to_image(prompt.as_str(), self.image_guidance_scale)?;
                let isolated = self.background.remove_background(&image)?;

                info!("Sampling with {}", self.image_sampler.model().name());
                self.image_sampler.sample(
                    Conditioning::Image(&isolated),
                    &plan.params,
                    plan.seed,
                    progress,
                )?
            }
        };

        let raw = self.decoder.decode(&latent, plan.frame_size)?;
        info!(
            "Decoded {} vertices, {} faces at frame size {}",
            raw.vertex_count(),
            raw.face_count(),
            plan.frame_size
        );
        Ok(raw)
    }
}

impl std::fmt::Debug for GenerationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationDriver")
            .field("text_model", &self.text_sampler.model())
            .field("image_model", &self.image_sampler.model())
            .field("defaults", &self.defaults)
            .field("image_guidance_scale", &self.image_guidance_scale)
            .finish_non_exhaustive()
    }
}
