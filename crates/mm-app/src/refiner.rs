use std::sync::Arc;
use mm_core::{ConditioningMode, CoreError, GenerationRequest, RefinedPrompt};
use tracing::{info, warn};
use crate::text_service::TextService;

/// Rewrites structured product attributes into one generation prompt.
pub struct PromptRefiner {
    service: Arc<dyn TextService>,
}

impl PromptRefiner {
    pub fn new(service: Arc<dyn TextService>) -> Self {
        Self { service }
    }

    /// Never fails for a valid request: when the service errors or replies
    /// with nothing, the locally assembled baseline is returned instead.
    pub fn refine(&self, request: &GenerationRequest) -> Result<RefinedPrompt, CoreError> {
        if request.product_name.trim().is_empty() {
            return Err(CoreError::InvalidRequest("product_name must not be empty".into()));
        }
        request.dimensions.validate()?;

        let baseline = baseline_message(request);
        match self.service.complete(&instruction(request, &baseline)) {
            Ok(reply) => match clean_reply(&reply) {
                Some(text) => {
                    info!("Refined prompt: {}", text);
                    Ok(RefinedPrompt::refined(text))
                }
                None => {
                    warn!("Prompt refinement returned an empty reply, using baseline prompt");
                    Ok(RefinedPrompt::fallback(baseline))
                }
            },
            Err(e) => {
                warn!("Prompt refinement failed ({}), using baseline prompt", e);
                Ok(RefinedPrompt::fallback(baseline))
            }
        }
    }
}

/// Deterministic one-line description embedding every request field.
pub fn baseline_message(request: &GenerationRequest) -> String {
    format!(
        "Make a 3D model of a {}, color: {}, features: [{}], material: {}, form factor: {}, style: {}, purpose: {}, dimensions: {}",
        request.product_name.trim(),
        request.colors.trim(),
        request.features_text(),
        request.material.name(),
        request.form_factor.name(),
        request.style_text(),
        request.intended_use_text(),
        request.dimensions,
    )
}

fn instruction(request: &GenerationRequest, baseline: &str) -> String {
    match request.mode {
        ConditioningMode::Text => format!(
            "You are a prompt expert.\n\
             Generate ONLY the prompt for a text-to-3D model by improving this prompt.\n\
             \"{baseline}\"\n\
             The object should be realistic, symmetrical and manufacturable.\n\
             Don't give any text except the prompt."
        ),
        ConditioningMode::Image => format!(
            "You are a prompt expert.\n\
             Generate ONLY the prompt for Image generation of a product by using this info.\n\
             - Product: {}\n\
             - Dimension: {}\n\
             - Style/Design: {}\n\
             - Colors: {}\n\
             - Important features: {}\n\
             The image should be photorealistic, clean, and symmetrical, with the object isolated on a plain background.\n\
             Avoid cartoonish, low-resolution, or distorted elements.\n\
             Focus entirely on the object with accurate details.\n\
             Don't give any text except the prompt.",
            request.product_name.trim(),
            request.dimensions,
            request.style_text(),
            request.colors.trim(),
            request.features_text(),
        ),
    }
}

/// Trims whitespace and wrapping quotes; `None` when nothing is left.
fn clean_reply(reply: &str) -> Option<String> {
    let text = reply.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`').trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use crate::error::TextServiceError;

    struct Scripted {
        reply: Result<&'static str, ()>,
        seen: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(reply: Result<&'static str, ()>) -> Arc<Self> {
            Arc::new(Self {
                reply,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl TextService for Scripted {
        fn complete(&self, instruction: &str) -> Result<String, TextServiceError> {
            self.seen.lock().unwrap().push(instruction.to_string());
            self.reply.map(str::to_string).map_err(|_| TextServiceError::Empty)
        }
    }

    #[test]
    fn test_uses_service_reply() {
        let service = Scripted::new(Ok("  \"A sleek purple ceramic vase\"\n"));
        let prompt = PromptRefiner::new(service.clone())
            .refine(&GenerationRequest::default())
            .unwrap();
        assert_eq!(prompt.as_str(), "A sleek purple ceramic vase");
        assert!(!prompt.is_fallback());
        assert!(service.seen.lock().unwrap()[0].contains("realistic, symmetrical and manufacturable"));
    }

    #[test]
    fn test_failure_falls_back_to_baseline() {
        let request = GenerationRequest::default();
        let prompt = PromptRefiner::new(Scripted::new(Err(())))
            .refine(&request)
            .unwrap();
        assert!(prompt.is_fallback());
        assert_eq!(prompt.as_str(), baseline_message(&request));
    }

    #[test]
    fn test_empty_reply_falls_back() {
        let prompt = PromptRefiner::new(Scripted::new(Ok("  ")))
            .refine(&GenerationRequest::default())
            .unwrap();
        assert!(prompt.is_fallback());
    }

    #[test]
    fn test_image_mode_uses_image_phrasing() {
        let service = Scripted::new(Ok("photo of a vase"));
        let request = GenerationRequest {
            mode: ConditioningMode::Image,
            ..Default::default()
        };
        PromptRefiner::new(service.clone()).refine(&request).unwrap();
        let sent = service.seen.lock().unwrap()[0].clone();
        assert!(sent.contains("photorealistic"));
        assert!(sent.contains("- Product: A flower vase"));
    }

    #[test]
    fn test_baseline_embeds_fields() {
        let request = GenerationRequest {
            features: vec![],
            ..Default::default()
        };
        let message = baseline_message(&request);
        assert!(message.starts_with("Make a 3D model of a A flower vase, color: purple and white"));
        assert!(message.contains("features: []"));
        assert!(message.contains("dimensions: 30 x 12 x 15 cm"));
    }

    #[test]
    fn test_blank_product_is_rejected() {
        let request = GenerationRequest {
            product_name: " ".into(),
            ..Default::default()
        };
        assert!(PromptRefiner::new(Scripted::new(Ok("x"))).refine(&request).is_err());
    }
}
