//! # ll-config
//!
//! Proxy settings, layered lowest to highest:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`living-library.toml`)
//! 3. `LL_<SECTION>__<KEY>` environment variables, after `.env` is loaded
//!
//! The bare `API_KEY` variable is honoured for the Gemini key when nothing
//! else sets it.

use std::path::{Path, PathBuf};

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use secrecy::SecretString;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "living-library.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("no Gemini API key configured (set LL_GEMINI__API_KEY or API_KEY)")]
    MissingApiKey,
    #[error("no token verification key configured (set auth.jwt_secret or auth.jwt_public_key_path)")]
    MissingVerifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub body_limit_bytes: usize,
    pub log_format: LogFormat,
}

#[derive(Debug, Deserialize)]
pub struct GeminiSettings {
    pub api_key: Option<SecretString>,
    pub model: String,
    pub endpoint: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct AuthSettings {
    /// HS256 shared secret.
    pub jwt_secret: Option<SecretString>,
    /// RS256 public key, PEM encoded. Takes precedence over the secret.
    pub jwt_public_key_path: Option<PathBuf>,
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub token_ttl_secs: i64,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub gemini: GeminiSettings,
    pub auth: AuthSettings,
}

impl Settings {
    /// Loads `.env`, then `path` if it exists, then the environment.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if let Ok(dotenv) = dotenvy::dotenv() {
            tracing::debug!(path = %dotenv.display(), "loaded .env");
        }

        let builder = defaults()?
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("LL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        let mut settings: Settings = builder.build()?.try_deserialize()?;

        if settings.gemini.api_key.is_none() {
            settings.gemini.api_key = std::env::var("API_KEY").ok().map(SecretString::from);
        }
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults overlaid with a TOML document. Does not read the environment.
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let settings: Settings = defaults()?
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.gemini.api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.auth.jwt_secret.is_none() && self.auth.jwt_public_key_path.is_none() {
            return Err(ConfigError::MissingVerifier);
        }
        Ok(())
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    Config::builder()
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 3001)?
        .set_default("server.body_limit_bytes", 10 * 1024 * 1024)?
        .set_default("server.log_format", "pretty")?
        .set_default("gemini.model", "gemini-2.5-flash")?
        .set_default("gemini.endpoint", "https://generativelanguage.googleapis.com/v1beta/")?
        .set_default("gemini.temperature", 0.2)?
        .set_default("gemini.timeout_secs", 60)?
        .set_default("auth.token_ttl_secs", 3600)
}
