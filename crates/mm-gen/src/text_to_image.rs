use image::{Rgba, RgbaImage};
use tracing::debug;
use crate::{GenError, Result};

/// Text-to-image model used by the image branch to produce a reference
/// view of the product.
pub trait ImageDiffuser: Send {
    fn text_to_image(&self, prompt: &str, guidance_scale: f32) -> Result<RgbaImage>;
}

/// Settings for the image branch's reference view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextToImageConfig {
    pub resolution: u32,
    /// Fixed guidance for the diffusion step, independent of the sampler's guidance.
    pub guidance_scale: f32,
}

impl Default for TextToImageConfig {
    fn default() -> Self {
        Self {
            resolution: 512,
            guidance_scale: 7.5,
        }
    }
}

/// Renders a shaded product silhouette on a dark gradient backdrop.
///
/// Used when no diffusion service is configured. Colors come from the
/// prompt, and higher guidance gives a harder, more saturated silhouette.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderDiffuser {
    config: TextToImageConfig,
}

impl PlaceholderDiffuser {
    pub fn new(config: TextToImageConfig) -> Self {
        Self { config }
    }
}

impl ImageDiffuser for PlaceholderDiffuser {
    fn text_to_image(&self, prompt: &str, guidance_scale: f32) -> Result<RgbaImage> {
        if prompt.trim().is_empty() {
            return Err(GenError::ImageGeneration("prompt is empty".into()));
        }
        if !(guidance_scale.is_finite() && guidance_scale > 0.0) {
            return Err(GenError::ImageGeneration(format!(
                "guidance scale must be > 0, got {guidance_scale}"
            )));
        }

        debug!("Rendering reference view for prompt: '{}'", prompt);
        let base_color = extract_color_from_prompt(prompt);
        Ok(render_view(self.config.resolution, base_color, guidance_scale))
    }
}

/// Picks a base color from the first color word in the prompt.
fn extract_color_from_prompt(prompt: &str) -> [u8; 3] {
    const PALETTE: [(&str, [u8; 3]); 8] = [
        ("red", [255, 100, 100]),
        ("blue", [100, 100, 255]),
        ("green", [100, 255, 100]),
        ("yellow", [255, 255, 100]),
        ("purple", [200, 100, 255]),
        ("orange", [255, 170, 80]),
        ("black", [70, 70, 80]),
        ("white", [240, 240, 240]),
    ];

    let lower = prompt.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .find_map(|word| {
            PALETTE
                .iter()
                .find(|(name, _)| *name == word)
                .map(|(_, color)| *color)
        })
        .unwrap_or([150, 150, 180])
}

fn render_view(size: u32, base_color: [u8; 3], guidance_scale: f32) -> RgbaImage {
    let mut img = RgbaImage::new(size, size);
    let center = size as f32 / 2.0;
    let radius = size as f32 * 0.3;
    // Guidance sharpens the shading falloff.
    let falloff = (guidance_scale / 7.5).clamp(0.25, 4.0);
    let light = glam::Vec2::new(-0.35, -0.45) * radius;

    for y in 0..size {
        for x in 0..size {
            let offset = glam::Vec2::new(x as f32 - center, y as f32 - center);
            let dist = offset.length();

            let pixel = if dist < radius {
                let depth = (1.0 - (dist / radius).powi(2)).sqrt();
                let highlight = 1.0 - ((offset - light).length() / (2.0 * radius)).min(1.0);
                let brightness =
                    (depth.powf(1.0 / falloff) * 0.7 + 0.3) * (0.8 + 0.2 * highlight);
                Rgba([
                    (base_color[0] as f32 * brightness).min(255.0) as u8,
                    (base_color[1] as f32 * brightness).min(255.0) as u8,
                    (base_color[2] as f32 * brightness).min(255.0) as u8,
                    255,
                ])
            } else {
                let bg = 0.2 + (y as f32 / size as f32) * 0.1;
                Rgba([(50.0 * bg) as u8, (50.0 * bg) as u8, (60.0 * bg) as u8, 255])
            };
            img.put_pixel(x, y, pixel);
        }
    }

    img
}
