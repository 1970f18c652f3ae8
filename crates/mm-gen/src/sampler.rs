use image::RgbaImage;
use mm_core::{ConditioningMode, GenerationParameters, ShapeModel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tracing::debug;
use crate::{GenError, Result};

/// Karras schedule curvature.
const RHO: f32 = 7.0;
/// Standard deviation of the latent data distribution.
const SIGMA_DATA: f32 = 0.5;

/// What a sampler is conditioned on.
#[derive(Debug, Clone, Copy)]
pub enum Conditioning<'a> {
    Text(&'a str),
    Image(&'a RgbaImage),
}

impl Conditioning<'_> {
    pub fn mode(&self) -> ConditioningMode {
        match self {
            Self::Text(_) => ConditioningMode::Text,
            Self::Image(_) => ConditioningMode::Image,
        }
    }
}

/// Intermediate encoding produced by a sampler and consumed by a decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct Latent {
    pub values: Vec<f32>,
}

impl Latent {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A conditional latent sampler.
///
/// `progress` receives `(completed_steps, total_steps)` when
/// `params.progress` is set. A `seed` pins every random draw.
pub trait LatentSampler: Send {
    fn model(&self) -> ShapeModel;

    fn sample(
        &self,
        conditioning: Conditioning<'_>,
        params: &GenerationParameters,
        seed: Option<u32>,
        progress: &mut dyn FnMut(u32, u32),
    ) -> Result<Latent>;
}

/// Karras et al. noise levels for `steps` steps, descending from
/// `sigma_max` to `sigma_min`, followed by a final 0.
pub fn karras_sigmas(steps: u32, sigma_min: f32, sigma_max: f32) -> Vec<f32> {
    let min_inv = sigma_min.powf(1.0 / RHO);
    let max_inv = sigma_max.powf(1.0 / RHO);
    let mut sigmas: Vec<f32> = (0..steps)
        .map(|i| {
            let t = if steps > 1 { i as f32 / (steps - 1) as f32 } else { 0.0 };
            (max_inv + t * (min_inv - max_inv)).powf(RHO)
        })
        .collect();
    sigmas.push(0.0);
    sigmas
}

/// Rounds to the nearest value representable with a half-precision mantissa.
#[inline]
fn quantize_half(value: f32) -> f32 {
    f32::from_bits(value.to_bits().wrapping_add(0x0000_1000) & 0xFFFF_E000)
}

fn gaussian(rng: &mut StdRng) -> f32 {
    let u1: f32 = rng.gen_range(f32::EPSILON..1.0);
    let u2: f32 = rng.gen_range(0.0..1.0);
    (-2.0 * u1.ln()).sqrt() * (std::f32::consts::TAU * u2).cos()
}

/// Deterministic target the conditional denoiser pulls towards.
fn conditioning_embedding(conditioning: Conditioning<'_>, dim: usize) -> Vec<f32> {
    let mut hasher = Sha256::new();
    match conditioning {
        Conditioning::Text(prompt) => {
            hasher.update(b"text:");
            hasher.update(prompt.trim().as_bytes());
        }
        Conditioning::Image(image) => {
            hasher.update(b"image:");
            hasher.update(image.width().to_le_bytes());
            hasher.update(image.height().to_le_bytes());
            hasher.update(image.as_raw());
        }
    }
    let digest = hasher.finalize();
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&digest);

    let mut rng = StdRng::from_seed(seed);
    (0..dim).map(|_| rng.gen_range(-0.9..0.9)).collect()
}

/// Local stand-in for the neural sampler.
///
/// Runs a real Karras/Euler denoising loop with classifier-free guidance
/// against a closed-form denoiser whose conditional mean is a hash of the
/// conditioning input. Same seed and inputs give bit-identical latents.
#[derive(Debug, Clone)]
pub struct SeededSampler {
    model: ShapeModel,
    latent_dim: usize,
}

impl SeededSampler {
    pub fn new(model: ShapeModel, latent_dim: usize) -> Self {
        Self {
            model,
            latent_dim: latent_dim.max(1),
        }
    }

    pub fn latent_dim(&self) -> usize {
        self.latent_dim
    }
}

impl LatentSampler for SeededSampler {
    fn model(&self) -> ShapeModel {
        self.model
    }

    fn sample(
        &self,
        conditioning: Conditioning<'_>,
        params: &GenerationParameters,
        seed: Option<u32>,
        progress: &mut dyn FnMut(u32, u32),
    ) -> Result<Latent> {
        params.validate()?;
        if conditioning.mode() != self.model.conditioning() {
            return Err(GenError::Sampling(format!(
                "{} cannot be conditioned on {}",
                self.model.name(),
                conditioning.mode()
            )));
        }

        let target = conditioning_embedding(conditioning, self.latent_dim);
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(u64::from(seed)),
            None => StdRng::from_entropy(),
        };

        let steps = params.karras_steps;
        let sigmas = karras_sigmas(steps, params.sigma_min, params.sigma_max);
        let precision = |v: f32| if params.use_fp16 { quantize_half(v) } else { v };

        let mut x: Vec<f32> = (0..self.latent_dim)
            .map(|_| precision(gaussian(&mut rng) * sigmas[0]))
            .collect();

        let gamma_max = std::f32::consts::SQRT_2 - 1.0;
        let sigma_data2 = SIGMA_DATA * SIGMA_DATA;

        for step in 0..steps as usize {
            let mut sigma = sigmas[step];
            let sigma_next = sigmas[step + 1];

            if params.s_churn > 0.0 {
                let gamma = (params.s_churn / steps as f32).min(gamma_max);
                let sigma_hat = sigma * (1.0 + gamma);
                let extra = (sigma_hat * sigma_hat - sigma * sigma).max(0.0).sqrt();
                for value in x.iter_mut() {
                    *value = precision(*value + gaussian(&mut rng) * extra);
                }
                sigma = sigma_hat;
            }

            let shrink = sigma_data2 / (sigma * sigma + sigma_data2);
            for (value, &mean) in x.iter_mut().zip(&target) {
                let unconditional = shrink * *value;
                let conditional = mean + shrink * (*value - mean);
                let mut denoised =
                    unconditional + params.guidance_scale * (conditional - unconditional);
                if params.clip_denoised {
                    denoised = denoised.clamp(-1.0, 1.0);
                }
                let derivative = (*value - denoised) / sigma;
                *value = precision(*value + derivative * (sigma_next - sigma));
            }

            if params.progress {
                progress(step as u32 + 1, steps);
            }
        }

        if x.iter().any(|v| !v.is_finite()) {
            return Err(GenError::Sampling("latent diverged to a non-finite value".into()));
        }

        debug!(
            "{} sampled {} latent values over {} steps",
            self.model.name(),
            x.len(),
            steps
        );
        Ok(Latent::new(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> GenerationParameters {
        GenerationParameters {
            karras_steps: 16,
            ..Default::default()
        }
    }

    #[test]
    fn karras_schedule_is_descending_with_trailing_zero() {
        let sigmas = karras_sigmas(64, 1e-3, 160.0);
        assert_eq!(sigmas.len(), 65);
        assert!((sigmas[0] - 160.0).abs() < 1e-2);
        assert!((sigmas[63] - 1e-3).abs() < 1e-5);
        assert_eq!(sigmas[64], 0.0);
        assert!(sigmas.windows(2).all(|w| w[0] > w[1]));
    }

    #[test]
    fn karras_single_step_starts_at_sigma_max() {
        assert_eq!(karras_sigmas(1, 1e-3, 80.0).len(), 2);
        assert!((karras_sigmas(1, 1e-3, 80.0)[0] - 80.0).abs() < 1e-3);
    }

    #[test]
    fn half_quantization_drops_low_mantissa_bits() {
        let q = quantize_half(1.000_1);
        assert_eq!(q.to_bits() & 0x1FFF, 0);
        assert_eq!(quantize_half(0.5), 0.5);
    }

    #[test]
    fn same_seed_is_bit_identical() {
        let sampler = SeededSampler::new(ShapeModel::Text300M, 64);
        let a = sampler
            .sample(Conditioning::Text("a vase"), &params(), Some(7), &mut |_, _| {})
            .unwrap();
        let b = sampler
            .sample(Conditioning::Text("a vase"), &params(), Some(7), &mut |_, _| {})
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn different_prompts_diverge() {
        let sampler = SeededSampler::new(ShapeModel::Text300M, 64);
        let a = sampler
            .sample(Conditioning::Text("a vase"), &params(), Some(7), &mut |_, _| {})
            .unwrap();
        let b = sampler
            .sample(Conditioning::Text("a lamp"), &params(), Some(7), &mut |_, _| {})
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn clipped_latents_stay_in_range() {
        let sampler = SeededSampler::new(ShapeModel::Text300M, 128);
        let latent = sampler
            .sample(Conditioning::Text("a chair"), &params(), Some(1), &mut |_, _| {})
            .unwrap();
        assert!(latent.values.iter().all(|v| (-1.0..=1.0).contains(v)));
    }

    #[test]
    fn progress_reports_every_step_only_when_enabled() {
        let sampler = SeededSampler::new(ShapeModel::Text300M, 8);
        let mut seen = Vec::new();
        sampler
            .sample(Conditioning::Text("a cup"), &params(), Some(3), &mut |done, total| {
                seen.push((done, total))
            })
            .unwrap();
        assert_eq!(seen.len(), 16);
        assert_eq!(seen.last(), Some(&(16, 16)));

        let quiet = GenerationParameters { progress: false, ..params() };
        let mut calls = 0;
        sampler
            .sample(Conditioning::Text("a cup"), &quiet, Some(3), &mut |_, _| calls += 1)
            .unwrap();
        assert_eq!(calls, 0);
    }

    #[test]
    fn churn_changes_the_trajectory_but_stays_seeded() {
        let sampler = SeededSampler::new(ShapeModel::Text300M, 32);
        let churned = GenerationParameters { s_churn: 4.0, ..params() };
        let a = sampler
            .sample(Conditioning::Text("a bowl"), &churned, Some(11), &mut |_, _| {})
            .unwrap();
        let b = sampler
            .sample(Conditioning::Text("a bowl"), &churned, Some(11), &mut |_, _| {})
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn wrong_conditioning_is_rejected() {
        let sampler = SeededSampler::new(ShapeModel::Image300M, 8);
        let result = sampler.sample(Conditioning::Text("a vase"), &params(), None, &mut |_, _| {});
        assert!(matches!(result, Err(GenError::Sampling(_))));
    }

    #[test]
    fn image_conditioning_is_accepted_by_image_model() {
        let sampler = SeededSampler::new(ShapeModel::Image300M, 8);
        let image = RgbaImage::new(4, 4);
        let latent = sampler
            .sample(Conditioning::Image(&image), &params(), Some(2), &mut |_, _| {})
            .unwrap();
        assert_eq!(latent.len(), 8);
    }
}
