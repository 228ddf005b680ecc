//! Error types for task-sync.

use std::path::PathBuf;
use std::time::Duration;

/// Errors raised while setting the pipeline up.
///
/// Failures during a run never surface here; they are rendered into the
/// run's output text instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Task registry errors. Any of these aborts the whole run.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Task registry file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Failed to read task registry {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },

    #[error("Task registry {} is missing required column '{column}'", path.display())]
    MissingColumn { path: PathBuf, column: String },
}

/// Delivery channel errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to send on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },

    #[error("Channel {name} rejected the request: {reason}")]
    Rejected { name: String, reason: String },

    #[error("File upload on channel {name} failed: {reason}")]
    UploadFailed { name: String, reason: String },
}

/// Oracle backend errors.
///
/// These never cross the oracle boundary; backends render them into an
/// `{"error": ...}` payload instead.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{provider} API key not configured")]
    MissingCredentials { provider: String },

    #[error("{provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("{provider} request timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },

    #[error("{provider} returned status {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },
}

impl LlmError {
    /// Build from a reqwest error, separating timeouts from other faults.
    pub fn from_reqwest(provider: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                provider: provider.to_string(),
                timeout,
            }
        } else {
            Self::RequestFailed {
                provider: provider.to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Render as the `{"error": ...}` text an oracle returns on failure.
    pub fn to_oracle_output(&self) -> String {
        serde_json::json!({ "error": self.to_string() }).to_string()
    }
}

/// Errors that abort a whole pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Invalid message batch JSON: {0}")]
    BatchJson(String),

    #[error("Message batch must be a JSON array of message objects")]
    BatchShape,
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
