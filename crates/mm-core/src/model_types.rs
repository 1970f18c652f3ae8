use crate::request::ConditioningMode;

/// Latent generation models known to the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeModel {
    Text300M,
    Image300M,
}

impl ShapeModel {
    /// Model name for display
    pub fn name(&self) -> &str {
        match self {
            Self::Text300M => "Shap-E text300M",
            Self::Image300M => "Shap-E image300M",
        }
    }

    /// Model ID for service communication
    pub fn id(&self) -> &str {
        match self {
            Self::Text300M => "text300M",
            Self::Image300M => "image300M",
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Text300M => "Text-conditioned latent sampler (30-60 sec)",
            Self::Image300M => "Image-conditioned latent sampler, needs a generated reference image",
        }
    }

    /// Estimated generation time in seconds
    pub fn estimated_time_secs(&self) -> u32 {
        match self {
            Self::Text300M => 45,
            Self::Image300M => 90,
        }
    }

    pub fn conditioning(&self) -> ConditioningMode {
        match self {
            Self::Text300M => ConditioningMode::Text,
            Self::Image300M => ConditioningMode::Image,
        }
    }

    pub fn for_mode(mode: ConditioningMode) -> Self {
        match mode {
            ConditioningMode::Text => Self::Text300M,
            ConditioningMode::Image => Self::Image300M,
        }
    }

    pub fn all() -> [ShapeModel; 2] {
        [Self::Text300M, Self::Image300M]
    }
}
