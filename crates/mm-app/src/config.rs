use std::path::PathBuf;
use std::time::Duration;
use crate::error::ConfigError;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OUTPUT_DIR: &str = "3d_models_output";

/// Process configuration, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub output_dir: PathBuf,
    /// Remote generation service; local models are used when unset.
    pub service_url: Option<String>,
    pub service_timeout: Duration,
    pub port: u16,
    pub latent_dim: usize,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(_) => {}
            Err(e) if e.not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let gemini_api_key =
            get("GEMINI_API_KEY").ok_or(ConfigError::MissingCredential("GEMINI_API_KEY"))?;

        Ok(Self {
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            output_dir: get("MESHMIND_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            service_url: get("MESHMIND_SERVICE_URL"),
            service_timeout: Duration::from_secs(parse_or(
                "MESHMIND_SERVICE_TIMEOUT_SECS",
                get("MESHMIND_SERVICE_TIMEOUT_SECS"),
                600,
            )?),
            port: parse_or("PORT", get("PORT"), 8080)?,
            latent_dim: parse_or("MESHMIND_LATENT_DIM", get("MESHMIND_LATENT_DIM"), 1024)?,
        })
    }
}

fn parse_or<T>(key: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(value) => match value.parse() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            }),
        },
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("gemini_api_key", &"<redacted>")
            .field("gemini_model", &self.gemini_model)
            .field("output_dir", &self.output_dir)
            .field("service_url", &self.service_url)
            .field("service_timeout", &self.service_timeout)
            .field("port", &self.port)
            .field("latent_dim", &self.latent_dim)
            .finish()
    }
}
