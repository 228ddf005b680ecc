//! Configuration types.
//!
//! Everything is read once at startup into an [`AppConfig`] value that is
//! passed to the pipeline, the oracle backends and the delivery sink.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default registry location, relative to the working directory.
pub const DEFAULT_REGISTRY_PATH: &str = "sheet.csv";

/// Slack rejects longer messages, so reports are chunked below this size.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 3500;

/// Default per-call oracle timeout.
pub const DEFAULT_ORACLE_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_HUGGINGFACE_ENDPOINT: &str =
    "https://api-inference.huggingface.co/models/mistralai/Mixtral-8x7B-Instruct-v0.1";
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// OpenAI backend settings.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
}

/// HuggingFace inference backend settings.
#[derive(Debug, Clone)]
pub struct HuggingFaceSettings {
    pub api_key: Option<SecretString>,
    pub endpoint: String,
}

/// Slack delivery settings. Delivery is skipped unless both the token and
/// the target channel are present.
#[derive(Debug, Clone)]
pub struct SlackSettings {
    pub bot_token: Option<SecretString>,
    /// Channel or user ID the report is posted to.
    pub channel: Option<String>,
    pub api_base: String,
    pub max_message_length: usize,
}

impl SlackSettings {
    pub fn is_configured(&self) -> bool {
        self.bot_token.is_some() && self.channel.is_some()
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// CSV file holding the task registry.
    pub registry_path: PathBuf,
    /// Upper bound for a single oracle call.
    pub oracle_timeout: Duration,
    pub openai: OpenAiSettings,
    pub huggingface: HuggingFaceSettings,
    pub slack: SlackSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            registry_path: PathBuf::from(DEFAULT_REGISTRY_PATH),
            oracle_timeout: Duration::from_secs(DEFAULT_ORACLE_TIMEOUT_SECS),
            openai: OpenAiSettings {
                api_key: None,
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
                model: DEFAULT_OPENAI_MODEL.to_string(),
            },
            huggingface: HuggingFaceSettings {
                api_key: None,
                endpoint: DEFAULT_HUGGINGFACE_ENDPOINT.to_string(),
            },
            slack: SlackSettings {
                bot_token: None,
                channel: None,
                api_base: DEFAULT_SLACK_API_BASE.to_string(),
                max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            },
        }
    }
}

impl AppConfig {
    /// Build config from environment variables.
    pub fn from_env() -> crate::error::Result<Self> {
        Ok(Self::from_lookup(|key| std::env::var(key).ok())?)
    }

    /// Build config from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secret = |key: &str| get(key).map(SecretString::from);
        let defaults = Self::default();

        let oracle_timeout = match get("ORACLE_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_positive("ORACLE_TIMEOUT_SECS", &raw)?),
            None => defaults.oracle_timeout,
        };

        let max_message_length = match get("MAX_MESSAGE_LENGTH") {
            Some(raw) => parse_positive("MAX_MESSAGE_LENGTH", &raw)? as usize,
            None => DEFAULT_MAX_MESSAGE_LENGTH,
        };

        Ok(Self {
            registry_path: get("TASK_REGISTRY_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.registry_path),
            oracle_timeout,
            openai: OpenAiSettings {
                api_key: secret("OPENAI_API_KEY"),
                base_url: get("OPENAI_BASE_URL").unwrap_or(defaults.openai.base_url),
                model: get("OPENAI_MODEL").unwrap_or(defaults.openai.model),
            },
            huggingface: HuggingFaceSettings {
                api_key: secret("HF_API_KEY"),
                endpoint: get("HF_ENDPOINT").unwrap_or(defaults.huggingface.endpoint),
            },
            slack: SlackSettings {
                bot_token: secret("SLACK_BOT_TOKEN"),
                channel: get("SLACK_USER_ID"),
                api_base: get("SLACK_API_BASE").unwrap_or(defaults.slack.api_base),
                max_message_length,
            },
        })
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<u64, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(0) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: "must be greater than zero".to_string(),
        }),
        Ok(n) => Ok(n),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}
