use std::fmt;
use serde::{Deserialize, Serialize};

/// Where a prompt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptSource {
    /// Rewritten by the text-completion service
    Refined,
    /// Locally assembled baseline used after a service failure
    Fallback,
}

/// Generation prompt produced once per request. Immutable after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinedPrompt {
    text: String,
    source: PromptSource,
}

impl RefinedPrompt {
    pub fn refined(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: PromptSource::Refined,
        }
    }

    pub fn fallback(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: PromptSource::Fallback,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn source(&self) -> PromptSource {
        self.source
    }

    pub fn is_fallback(&self) -> bool {
        self.source == PromptSource::Fallback
    }
}

impl AsRef<str> for RefinedPrompt {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for RefinedPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
