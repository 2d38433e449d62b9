use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ib_sources::FallbackPolicy;

/// Environment variables that hold credentials. Each maps to the
/// lowercased key of the `[credentials]` table.
const CREDENTIAL_VARS: &[&str] = &[
    "OPENAI_API_KEY",
    "TAVILY_API_KEY",
    "SCRAPIN_API_KEY",
    "TWITTER_BEARER_TOKEN",
];

const ENV_PREFIX: &str = "ICEBREAKER_";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Timeout for every outbound HTTP call
    pub http_timeout_secs: u64,
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub lookup: LookupConfig,
    pub search: SearchConfig,
    pub linkedin: LinkedInConfig,
    pub twitter: TwitterConfig,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
            request_timeout_secs: 180,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    /// OpenAI-compatible endpoint (defaults to api.openai.com)
    pub base_url: Option<String>,
    pub max_generation_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: ib_engine::DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            base_url: None,
            max_generation_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    pub max_iterations: usize,
    /// Used when the LinkedIn lookup finds nothing
    pub fallback_linkedin_url: Option<String>,
    /// Used when the Twitter/X lookup finds nothing
    pub fallback_twitter_handle: Option<String>,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            fallback_linkedin_url: None,
            fallback_twitter_handle: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: Option<String>,
    pub max_results: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            max_results: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkedInConfig {
    pub base_url: Option<String>,
    /// Serve the fixture profile without calling Scrapin
    pub mock: bool,
    pub fallback: FallbackPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterConfig {
    pub base_url: Option<String>,
    /// Serve fixture posts without calling the Twitter/X API
    pub mock: bool,
    pub fallback: FallbackPolicy,
    pub max_posts: usize,
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            mock: false,
            fallback: FallbackPolicy::default(),
            max_posts: 5,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub openai_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
    pub scrapin_api_key: Option<String>,
    pub twitter_bearer_token: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_timeout_secs: 30,
            server: ServerConfig::default(),
            llm: LlmConfig::default(),
            lookup: LookupConfig::default(),
            search: SearchConfig::default(),
            linkedin: LinkedInConfig::default(),
            twitter: TwitterConfig::default(),
            credentials: Credentials::default(),
        }
    }
}

impl Config {
    /// Load defaults, then the TOML file, then the environment.
    ///
    /// An explicit `path` must exist; the default path is optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => {
                if !path.exists() {
                    anyhow::bail!("Config file not found: {}", path.display());
                }
                Some(path.to_path_buf())
            }
            None => Self::config_path().filter(|p| p.exists()),
        };

        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = &file {
            tracing::debug!(path = %file.display(), "Loading config file");
            figment = figment.merge(Toml::file(file));
        }
        let figment = with_credential_env(figment).merge(Env::prefixed(ENV_PREFIX).split("__"));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self> {
        figment.extract().context("Invalid configuration")
    }

    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("icebreaker").join("config.toml"))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Names of required credentials that are unset or empty.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let creds = &self.credentials;
        let required = [
            ("OPENAI_API_KEY", &creds.openai_api_key, true),
            ("TAVILY_API_KEY", &creds.tavily_api_key, true),
            ("SCRAPIN_API_KEY", &creds.scrapin_api_key, !self.linkedin.mock),
            ("TWITTER_BEARER_TOKEN", &creds.twitter_bearer_token, !self.twitter.mock),
        ];

        required
            .into_iter()
            .filter(|(_, value, needed)| {
                *needed && value.as_deref().map_or(true, |v| v.trim().is_empty())
            })
            .map(|(name, _, _)| name)
            .collect()
    }

    /// Fail with one message naming every missing credential.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_credentials();
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required credentials: {}\n\n\
                 Set them in the environment, in a .env file, or in the [credentials] \
                 table of the config file.",
                missing.join(", ")
            );
        }
        Ok(())
    }

    /// A copy with every credential value masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |value: &Option<String>| value.as_ref().map(|_| "********".to_string());
        let mut config = self.clone();
        config.credentials = Credentials {
            openai_api_key: mask(&self.credentials.openai_api_key),
            tavily_api_key: mask(&self.credentials.tavily_api_key),
            scrapin_api_key: mask(&self.credentials.scrapin_api_key),
            twitter_bearer_token: mask(&self.credentials.twitter_bearer_token),
        };
        config
    }
}

/// Maps `OPENAI_API_KEY` and friends onto `credentials.*`.
///
/// Values are read as plain strings. `Env` would parse `12345` into an
/// integer and fail extraction of a string field.
fn with_credential_env(figment: Figment) -> Figment {
    CREDENTIAL_VARS
        .iter()
        .fold(figment, |figment, var| match std::env::var(var) {
            Ok(value) => {
                let key = format!("credentials.{}", var.to_ascii_lowercase());
                figment.merge(Serialized::default(&key, value.trim().to_string()))
            }
            Err(_) => figment,
        })
}
