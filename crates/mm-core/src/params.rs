use serde::{Deserialize, Serialize};
use crate::error::{CoreError, Result};

/// Fully resolved sampler settings for a single generation call.
///
/// The driver owns one instance as its component-level defaults; each request
/// resolves its own copy through [`SamplingOverrides::apply`] so caller values
/// never leak into the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub guidance_scale: f32,
    pub karras_steps: u32,
    pub sigma_min: f32,
    pub sigma_max: f32,
    pub s_churn: f32,
    pub clip_denoised: bool,
    pub use_fp16: bool,
    pub progress: bool,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            guidance_scale: 15.0,
            karras_steps: 64,
            sigma_min: 1e-3,
            sigma_max: 160.0,
            s_churn: 0.0,
            clip_denoised: true,
            use_fp16: true,
            progress: true,
        }
    }
}

impl GenerationParameters {
    pub fn validate(&self) -> Result<()> {
        if !(self.guidance_scale.is_finite() && self.guidance_scale > 0.0) {
            return Err(CoreError::InvalidParameters(format!(
                "guidance_scale must be > 0, got {}",
                self.guidance_scale
            )));
        }
        if self.karras_steps == 0 {
            return Err(CoreError::InvalidParameters("karras_steps must be positive".into()));
        }
        if !(self.sigma_min.is_finite() && self.sigma_min > 0.0) {
            return Err(CoreError::InvalidParameters(format!(
                "sigma_min must be > 0, got {}",
                self.sigma_min
            )));
        }
        if !(self.sigma_max.is_finite() && self.sigma_max > self.sigma_min) {
            return Err(CoreError::InvalidParameters(format!(
                "sigma_max ({}) must be greater than sigma_min ({})",
                self.sigma_max, self.sigma_min
            )));
        }
        if !(self.s_churn.is_finite() && self.s_churn >= 0.0) {
            return Err(CoreError::InvalidParameters(format!(
                "s_churn must be >= 0, got {}",
                self.s_churn
            )));
        }
        Ok(())
    }
}

/// Per-call overrides. `None` keeps the component default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingOverrides {
    pub guidance_scale: Option<f32>,
    pub karras_steps: Option<u32>,
    pub sigma_min: Option<f32>,
    pub sigma_max: Option<f32>,
    pub s_churn: Option<f32>,
    pub clip_denoised: Option<bool>,
    pub use_fp16: Option<bool>,
    pub progress: Option<bool>,
}

impl SamplingOverrides {
    /// Resolve against `defaults` and validate the result.
    pub fn apply(&self, defaults: &GenerationParameters) -> Result<GenerationParameters> {
        let resolved = GenerationParameters {
            guidance_scale: self.guidance_scale.unwrap_or(defaults.guidance_scale),
            karras_steps: self.karras_steps.unwrap_or(defaults.karras_steps),
            sigma_min: self.sigma_min.unwrap_or(defaults.sigma_min),
            sigma_max: self.sigma_max.unwrap_or(defaults.sigma_max),
            s_churn: self.s_churn.unwrap_or(defaults.s_churn),
            clip_denoised: self.clip_denoised.unwrap_or(defaults.clip_denoised),
            use_fp16: self.use_fp16.unwrap_or(defaults.use_fp16),
            progress: self.progress.unwrap_or(defaults.progress),
        };
        resolved.validate()?;
        Ok(resolved)
    }
}
