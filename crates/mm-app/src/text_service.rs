use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::debug;
use crate::error::TextServiceError;

/// External text-completion service. Takes one instruction, returns one reply.
pub trait TextService: Send + Sync {
    fn complete(&self, instruction: &str) -> Result<String, TextServiceError>;
}

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini `generateContent` over the REST API.
pub struct GeminiClient {
    client: reqwest::blocking::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, TextServiceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            endpoint: GEMINI_ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Text of the first candidate, parts joined.
    fn text(self) -> Option<String> {
        let candidate = self.candidates.into_iter().next()?;
        let text: String = candidate
            .content
            .parts
            .into_iter()
            .filter_map(|part| part.text)
            .collect();
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

impl TextService for GeminiClient {
    fn complete(&self, instruction: &str) -> Result<String, TextServiceError> {
        let url = format!("{}/{}:generateContent", self.endpoint, self.model);
        debug!("Calling {} ({} chars)", self.model, instruction.len());

        let body = GenerateContentRequest {
            contents: [Content {
                parts: [Part { text: instruction.trim() }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(TextServiceError::Status { status, body });
        }

        let parsed: GenerateContentResponse = response.json()?;
        parsed.text().ok_or(TextServiceError::Empty)
    }
}
