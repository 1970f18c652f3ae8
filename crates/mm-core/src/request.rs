use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::error::{CoreError, Result};
use crate::format::OutputFormat;
use crate::params::{GenerationParameters, SamplingOverrides};

/// Largest render frame the decoder is allowed to allocate.
pub const MAX_FRAME_SIZE: u32 = 1024;

/// Which generation branch a request runs through. Fixed for the lifetime of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditioningMode {
    #[default]
    Text,
    Image,
}

impl fmt::Display for ConditioningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Image => f.write_str("image"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Material {
    #[default]
    Plastic,
    Metal,
    Wood,
    Glass,
    Composite,
    Mixed,
}

impl Material {
    pub fn name(&self) -> &str {
        match self {
            Self::Plastic => "Plastic",
            Self::Metal => "Metal",
            Self::Wood => "Wood",
            Self::Glass => "Glass",
            Self::Composite => "Composite",
            Self::Mixed => "Mixed",
        }
    }
}

impl fmt::Display for Material {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFactor {
    #[default]
    Cylindrical,
    Rectangular,
    Ergonomic,
    Custom,
}

impl FormFactor {
    pub fn name(&self) -> &str {
        match self {
            Self::Cylindrical => "Cylindrical",
            Self::Rectangular => "Rectangular",
            Self::Ergonomic => "Ergonomic",
            Self::Custom => "Custom Shape",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleKeyword {
    Sleek,
    Minimalist,
    Futuristic,
    Industrial,
    Vintage,
    Compact,
    Ergonomic,
}

impl StyleKeyword {
    pub fn name(&self) -> &str {
        match self {
            Self::Sleek => "Sleek",
            Self::Minimalist => "Minimalist",
            Self::Futuristic => "Futuristic",
            Self::Industrial => "Industrial",
            Self::Vintage => "Vintage",
            Self::Compact => "Compact",
            Self::Ergonomic => "Ergonomic",
        }
    }
}

/// Bounding dimensions of the product, L x W x H.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DimensionsRepr")]
pub struct Dimensions {
    pub length: f32,
    pub width: f32,
    pub height: f32,
    pub unit: String,
}

impl Dimensions {
    pub fn new(length: f32, width: f32, height: f32, unit: impl Into<String>) -> Result<Self> {
        let dims = Self {
            length,
            width,
            height,
            unit: unit.into(),
        };
        dims.validate()?;
        Ok(dims)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |v: f32| v.is_finite() && v > 0.0;
        if !(positive(self.length) && positive(self.width) && positive(self.height)) {
            return Err(CoreError::InvalidDimensions(self.to_string()));
        }
        if self.unit.trim().is_empty() {
            return Err(CoreError::InvalidDimensions(self.to_string()));
        }
        Ok(())
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self {
            length: 30.0,
            width: 12.0,
            height: 15.0,
            unit: "cm".into(),
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x {} x {} {}", self.length, self.width, self.height, self.unit)
    }
}

/// Parses `30x12x15 cm`, `30 x 12 x 15 cm` or `30×12×15`. The unit defaults to `cm`.
impl FromStr for Dimensions {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidDimensions(s.to_string());
        let trimmed = s
            .trim()
            .trim_end_matches(|c: char| c.is_ascii_punctuation())
            .trim_end();

        let numeric_end = trimmed
            .char_indices()
            .filter(|(_, c)| c.is_ascii_digit() || *c == '.')
            .map(|(i, c)| i + c.len_utf8())
            .last()
            .ok_or_else(invalid)?;

        let (numbers, unit) = trimmed.split_at(numeric_end);
        let unit = match unit.trim() {
            "" => "cm",
            other => other,
        };

        let parts: Vec<f32> = numbers
            .split(|c: char| c == 'x' || c == 'X' || c == '×')
            .map(|part| part.trim().parse::<f32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|_| invalid())?;

        match parts.as_slice() {
            [length, width, height] => {
                Dimensions::new(*length, *width, *height, unit).map_err(|_| invalid())
            }
            _ => Err(invalid()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DimensionsRepr {
    Text(String),
    Parts {
        length: f32,
        width: f32,
        height: f32,
        #[serde(default = "default_unit")]
        unit: String,
    },
}

fn default_unit() -> String {
    "cm".into()
}

impl TryFrom<DimensionsRepr> for Dimensions {
    type Error = CoreError;

    fn try_from(value: DimensionsRepr) -> Result<Self> {
        match value {
            DimensionsRepr::Text(text) => text.parse(),
            DimensionsRepr::Parts { length, width, height, unit } => {
                Dimensions::new(length, width, height, unit)
            }
        }
    }
}

/// Everything the pipeline needs to produce one mesh artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub product_name: String,
    pub dimensions: Dimensions,
    pub features: Vec<String>,
    pub material: Material,
    pub form_factor: FormFactor,
    pub style: Vec<StyleKeyword>,
    pub intended_use: Option<String>,
    pub colors: String,
    pub mode: ConditioningMode,
    pub guidance_scale: f32,
    pub step_count: u32,
    pub frame_size: u32,
    pub output_format: OutputFormat,
    pub seed: Option<u32>,
    /// Advanced sampler controls; unset fields use the driver defaults
    pub sampling: SamplingOverrides,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        let params = GenerationParameters::default();
        Self {
            product_name: "A flower vase".into(),
            dimensions: Dimensions::default(),
            features: vec!["realistic".into(), "detailed".into()],
            material: Material::default(),
            form_factor: FormFactor::default(),
            style: vec![StyleKeyword::Sleek, StyleKeyword::Compact],
            intended_use: None,
            colors: "purple and white".into(),
            mode: ConditioningMode::default(),
            guidance_scale: params.guidance_scale,
            step_count: params.karras_steps,
            frame_size: 160,
            output_format: OutputFormat::default(),
            seed: None,
            sampling: SamplingOverrides::default(),
        }
    }
}

impl GenerationRequest {
    pub fn new(product_name: impl Into<String>, dimensions: Dimensions) -> Self {
        Self {
            product_name: product_name.into(),
            dimensions,
            ..Default::default()
        }
    }

    pub fn with_features_text(mut self, text: &str) -> Self {
        self.features = parse_features(text);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.product_name.trim().is_empty() {
            return Err(CoreError::InvalidRequest("product_name must not be empty".into()));
        }
        self.dimensions.validate()?;
        if self.frame_size == 0 || self.frame_size > MAX_FRAME_SIZE {
            return Err(CoreError::InvalidRequest(format!(
                "frame_size must be in 1..={MAX_FRAME_SIZE}, got {}",
                self.frame_size
            )));
        }
        self.overrides().apply(&GenerationParameters::default())?;
        Ok(())
    }

    /// Sampler overrides with the request's top-level guidance and step count applied.
    pub fn overrides(&self) -> SamplingOverrides {
        SamplingOverrides {
            guidance_scale: Some(self.guidance_scale),
            karras_steps: Some(self.step_count),
            ..self.sampling
        }
    }

    pub fn features_text(&self) -> String {
        self.features.join(", ")
    }

    pub fn style_text(&self) -> String {
        self.style
            .iter()
            .map(StyleKeyword::name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn intended_use_text(&self) -> &str {
        self.intended_use.as_deref().map(str::trim).unwrap_or("")
    }
}

/// Split comma or newline separated feature text, dropping blanks and
/// case-insensitive repeats while keeping the first spelling.
pub fn parse_features(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    text.split([',', '\n'])
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .filter(|f| seen.insert(f.to_lowercase()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimensions_parse_compact_and_spaced() {
        let compact: Dimensions = "30x12x15 cm".parse().unwrap();
        let spaced: Dimensions = "30 x 12 x 15 cm".parse().unwrap();
        assert_eq!(compact, spaced);
        assert_eq!(compact.to_string(), "30 x 12 x 15 cm");
    }

    #[test]
    fn test_dimensions_default_unit_and_decimals() {
        let dims: Dimensions = "12.5×4×3".parse().unwrap();
        assert_eq!(dims.length, 12.5);
        assert_eq!(dims.unit, "cm");

        let inches: Dimensions = "4x4x10in".parse().unwrap();
        assert_eq!(inches.unit, "in");
    }

    #[test]
    fn test_dimensions_ignore_trailing_punctuation() {
        let expected: Dimensions = "30x12x15 cm".parse().unwrap();
        assert_eq!("30x12x15 cm.".parse::<Dimensions>().unwrap(), expected);
        assert_eq!("30 x 12 x 15 cm!".parse::<Dimensions>().unwrap(), expected);

        let bare: Dimensions = "30x12x15.".parse().unwrap();
        assert_eq!(bare, expected);
    }

    #[test]
    fn test_dimensions_reject_bad_input() {
        assert!("".parse::<Dimensions>().is_err());
        assert!("30x12 cm".parse::<Dimensions>().is_err());
        assert!("0x12x15 cm".parse::<Dimensions>().is_err());
        assert!("ax12x15 cm".parse::<Dimensions>().is_err());
    }

    #[test]
    fn test_dimensions_deserialize_from_text_or_parts() {
        let text: Dimensions = serde_json::from_str("\"30x12x15 cm\"").unwrap();
        let parts: Dimensions =
            serde_json::from_str(r#"{"length": 30, "width": 12, "height": 15}"#).unwrap();
        assert_eq!(text, parts);
    }

    #[test]
    fn test_parse_features_dedupes_in_order() {
        let features = parse_features("realistic, Detailed\n detailed ,, glossy");
        assert_eq!(features, vec!["realistic", "Detailed", "glossy"]);
        assert!(parse_features("").is_empty());
    }

    #[test]
    fn test_request_validation() {
        assert!(GenerationRequest::default().validate().is_ok());

        let mut req = GenerationRequest::default();
        req.product_name = "   ".into();
        assert!(matches!(req.validate(), Err(CoreError::InvalidRequest(_))));

        let mut req = GenerationRequest::default();
        req.step_count = 0;
        assert!(matches!(req.validate(), Err(CoreError::InvalidParameters(_))));

        let mut req = GenerationRequest::default();
        req.frame_size = 0;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_overrides_take_top_level_guidance_and_steps() {
        let mut req = GenerationRequest::default();
        req.guidance_scale = 7.0;
        req.step_count = 32;
        req.sampling.guidance_scale = Some(99.0);
        req.sampling.s_churn = Some(0.5);

        let overrides = req.overrides();
        assert_eq!(overrides.guidance_scale, Some(7.0));
        assert_eq!(overrides.karras_steps, Some(32));
        assert_eq!(overrides.s_churn, Some(0.5));
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{"product_name": "A desk lamp", "dimensions": "20x20x45 cm", "mode": "image", "output_format": "glb"}"#,
        )
        .unwrap();
        assert_eq!(req.product_name, "A desk lamp");
        assert_eq!(req.mode, ConditioningMode::Image);
        assert_eq!(req.output_format, OutputFormat::Glb);
        assert_eq!(req.step_count, 64);
        assert_eq!(req.style_text(), "Sleek, Compact");
    }

    #[test]
    fn test_request_rejects_unsupported_format() {
        let result: std::result::Result<GenerationRequest, _> =
            serde_json::from_str(r#"{"output_format": "fbx"}"#);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unsupported format"), "{err}");
    }
}
