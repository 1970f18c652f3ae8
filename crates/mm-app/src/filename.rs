use std::sync::Arc;
use chrono::{DateTime, Local};
use mm_core::{OutputFormat, RefinedPrompt};
use sha2::{Digest, Sha256};
use tracing::warn;
use crate::error::FilenameError;
use crate::text_service::TextService;

const MAX_ATTEMPTS: u32 = 2;
const MAX_TOKEN_LEN: usize = 40;

/// Builds `<token>_<hash>_<YYYYMMDD_HHMMSS>.<ext>` names.
pub struct FilenameSynthesizer {
    service: Arc<dyn TextService>,
}

impl FilenameSynthesizer {
    pub fn new(service: Arc<dyn TextService>) -> Self {
        Self { service }
    }

    pub fn synthesize(
        &self,
        prompt: &RefinedPrompt,
        format: OutputFormat,
    ) -> Result<String, FilenameError> {
        self.synthesize_at(prompt, format, Local::now())
    }

    /// Asks the service for a short token, retrying once. A reply that
    /// sanitizes to nothing counts as a failed attempt.
    pub fn synthesize_at(
        &self,
        prompt: &RefinedPrompt,
        format: OutputFormat,
        now: DateTime<Local>,
    ) -> Result<String, FilenameError> {
        let instruction = format!(
            "Give only a 2 word short filename for (no other text just 2 word response): {}",
            prompt.as_str()
        );

        let mut last_error = String::new();
        for attempt in 1..=MAX_ATTEMPTS {
            let token = self
                .service
                .complete(&instruction)
                .map_err(|e| e.to_string())
                .and_then(|reply| {
                    let token = sanitize_token(&reply);
                    if token.is_empty() {
                        Err(format!("reply '{}' has no usable characters", reply.trim()))
                    } else {
                        Ok(token)
                    }
                });

            match token {
                Ok(token) => return Ok(compose(&token, prompt.as_str(), format, now)),
                Err(e) => {
                    if attempt < MAX_ATTEMPTS {
                        warn!("Filename attempt {} failed: {}; retrying", attempt, e);
                    }
                    last_error = e;
                }
            }
        }

        Err(FilenameError::Exhausted {
            attempts: MAX_ATTEMPTS,
            last_error,
        })
    }
}

/// Local name for when the text service is known to be down: up to two words
/// of the product name, leading articles skipped. `None` when nothing usable
/// is left.
pub fn offline_name_at(
    product_name: &str,
    prompt: &RefinedPrompt,
    format: OutputFormat,
    now: DateTime<Local>,
) -> Option<String> {
    let sanitized = sanitize_token(product_name);
    let words: Vec<&str> = sanitized
        .split(['_', '-'])
        .filter(|w| !w.is_empty())
        .skip_while(|w| matches!(w.to_ascii_lowercase().as_str(), "a" | "an" | "the"))
        .take(2)
        .collect();
    if words.is_empty() {
        return None;
    }
    Some(compose(&words.join("_"), prompt.as_str(), format, now))
}

/// Keeps ASCII letters, digits, space, dash and underscore. Whitespace runs
/// become a single underscore.
pub fn sanitize_token(raw: &str) -> String {
    let kept: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let joined = kept.split_whitespace().collect::<Vec<_>>().join("_");
    let trimmed = joined.trim_matches(|c| c == '_' || c == '-');
    trimmed.chars().take(MAX_TOKEN_LEN).collect()
}

/// First 6 hex characters of the SHA-256 of the prompt text.
pub fn content_hash(prompt: &str) -> String {
    let digest = Sha256::digest(prompt.as_bytes());
    hex::encode(&digest[..3])
}

fn compose(token: &str, prompt: &str, format: OutputFormat, now: DateTime<Local>) -> String {
    format!(
        "{}_{}_{}.{}",
        token,
        content_hash(prompt),
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}
