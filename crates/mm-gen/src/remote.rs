use std::io::Cursor;
use std::time::Duration;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};
use mm_core::{GenerationParameters, ShapeModel};
use mm_mesh::{FaceBuffer, RawDecodedMesh};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use crate::decoder::LatentDecoder;
use crate::reclaim::{Accelerator, AcceleratorStatus};
use crate::sampler::{Conditioning, Latent, LatentSampler};
use crate::text_to_image::ImageDiffuser;
use crate::{GenError, Result};

/// Client for an out-of-process model service.
///
/// Every endpoint answers with a JSON envelope carrying `status`
/// (`"success"` or `"error"`), an optional `error` message, and the payload
/// fields on success.
#[derive(Debug, Clone)]
pub struct RemoteService {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl RemoteService {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A sampler bound to one of the service's models.
    pub fn sampler(&self, model: ShapeModel) -> RemoteSampler {
        RemoteSampler {
            service: self.clone(),
            model,
        }
    }

    fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("POST {}", url);

        let response = self.client.post(&url).json(body).send()?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            return Err(GenError::Service(format!("HTTP {}: {}", status, body)));
        }

        parse_envelope(response.json()?)
    }
}

fn parse_envelope<R: DeserializeOwned>(envelope: Value) -> Result<R> {
    match envelope.get("status").and_then(Value::as_str) {
        Some("success") => serde_json::from_value(envelope)
            .map_err(|e| GenError::Service(format!("Failed to parse response: {}", e))),
        Some("error") => {
            let message = envelope
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            Err(GenError::Service(message.to_string()))
        }
        other => Err(GenError::Service(format!("Unexpected status: {:?}", other))),
    }
}

fn encode_png(image: &RgbaImage) -> Result<String> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(STANDARD.encode(bytes))
}

fn decode_png(data: &str) -> Result<RgbaImage> {
    let bytes = STANDARD
        .decode(data)
        .map_err(|e| GenError::Service(format!("image payload is not base64: {}", e)))?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

#[derive(Serialize)]
struct SampleRequest<'a> {
    model: &'a str,
    prompt: Option<&'a str>,
    image_png_base64: Option<String>,
    #[serde(flatten)]
    params: &'a GenerationParameters,
    seed: Option<u32>,
}

#[derive(Deserialize)]
struct SampleResponse {
    latent: Vec<f32>,
}

#[derive(Serialize)]
struct DecodeRequest<'a> {
    latent: &'a [f32],
    frame_size: u32,
}

#[derive(Deserialize)]
struct DecodeResponse {
    vertices: Option<Vec<[f32; 3]>>,
    faces: Option<Vec<Vec<u32>>>,
    colors: Option<Vec<[f32; 3]>>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    prompt: &'a str,
    guidance_scale: f32,
}

#[derive(Deserialize)]
struct ImageResponse {
    image_png_base64: String,
}

#[derive(Serialize)]
struct ReclaimRequest {}

/// [`RemoteService`] bound to a model.
#[derive(Debug, Clone)]
pub struct RemoteSampler {
    service: RemoteService,
    model: ShapeModel,
}

impl LatentSampler for RemoteSampler {
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
        let (prompt, image_png_base64) = match conditioning {
            Conditioning::Text(prompt) => (Some(prompt), None),
            Conditioning::Image(image) => (None, Some(encode_png(image)?)),
        };

        let request = SampleRequest {
            model: self.model.id(),
            prompt,
            image_png_base64,
            params,
            seed,
        };
        let response: SampleResponse = self
            .service
            .post("sample", &request)
            .map_err(|e| GenError::Sampling(e.to_string()))?;

        // The service does not stream steps back.
        if params.progress {
            progress(params.karras_steps, params.karras_steps);
        }
        Ok(Latent::new(response.latent))
    }
}

impl LatentDecoder for RemoteService {
    fn decode(&self, latent: &Latent, frame_size: u32) -> Result<RawDecodedMesh> {
        let response: DecodeResponse = self
            .post("decode", &DecodeRequest {
                latent: &latent.values,
                frame_size,
            })
            .map_err(|e| GenError::Decoding(e.to_string()))?;

        let faces = response.faces.map(FaceBuffer::from_rows).transpose()?;
        Ok(RawDecodedMesh {
            vertices: response.vertices,
            faces,
            colors: response.colors,
        })
    }
}

impl ImageDiffuser for RemoteService {
    fn text_to_image(&self, prompt: &str, guidance_scale: f32) -> Result<RgbaImage> {
        let response: ImageResponse = self
            .post("txt2img", &ImageRequest {
                prompt,
                guidance_scale,
            })
            .map_err(|e| GenError::ImageGeneration(e.to_string()))?;
        decode_png(&response.image_png_base64)
    }
}

impl Accelerator for RemoteService {
    fn release_cached(&self) -> Result<AcceleratorStatus> {
        self.post("reclaim", &ReclaimRequest {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_yields_payload() {
        let latent: SampleResponse =
            parse_envelope(json!({"status": "success", "latent": [0.5, -0.25]})).unwrap();
        assert_eq!(latent.latent, vec![0.5, -0.25]);
    }

    #[test]
    fn test_error_envelope_carries_message() {
        let result: Result<SampleResponse> =
            parse_envelope(json!({"status": "error", "error": "CUDA out of memory"}));
        match result {
            Err(GenError::Service(msg)) => assert_eq!(msg, "CUDA out of memory"),
            other => panic!("unexpected: {:?}", other.map(|r| r.latent)),
        }
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let result: Result<AcceleratorStatus> = parse_envelope(json!({"status": "pending"}));
        assert!(matches!(result, Err(GenError::Service(_))));
    }

    #[test]
    fn test_decode_response_keeps_missing_buffers_missing() {
        let response: DecodeResponse =
            parse_envelope(json!({"status": "success", "vertices": [[0.0, 0.0, 0.0]]})).unwrap();
        assert!(response.faces.is_none());
        assert_eq!(response.vertices.map(|v| v.len()), Some(1));
    }

    #[test]
    fn test_png_payload_roundtrip() {
        let image = RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 4]));
        let decoded = decode_png(&encode_png(&image).unwrap()).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_sample_request_flattens_parameters() {
        let params = GenerationParameters::default();
        let body = serde_json::to_value(SampleRequest {
            model: ShapeModel::Text300M.id(),
            prompt: Some("a vase"),
            image_png_base64: None,
            params: &params,
            seed: Some(4),
        })
        .unwrap();
        assert_eq!(body["model"], "text300M");
        assert_eq!(body["karras_steps"], 64);
        assert_eq!(body["guidance_scale"], 15.0);
    }

    #[test]
    fn test_base_url_is_normalized() {
        let service = RemoteService::new("http://localhost:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(service.base_url(), "http://localhost:5000");
    }
}
