//! Classification oracles.
//!
//! Supports:
//! - **OpenAI**: chat completions API (paid, precise)
//! - **HuggingFace**: hosted inference API (free, approximate)
//!
//! Both sit behind [`ClassificationOracle`]. Backends never return an error
//! across this boundary; failures come back as `{"error": "..."}` text so the
//! response parser can treat them like any other output.

pub mod huggingface;
pub mod openai;

pub use huggingface::HuggingFaceOracle;
pub use openai::OpenAiOracle;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::error::LlmError;

/// Sampling temperature shared by both backends.
pub(crate) const CLASSIFY_TEMPERATURE: f32 = 0.2;

/// Anything that can answer a classification prompt with text.
#[async_trait]
pub trait ClassificationOracle: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Answer `prompt`. Never fails: errors are encoded as `{"error": ...}`.
    async fn classify(&self, prompt: &str) -> String;
}

/// Supported oracle backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OracleBackend {
    OpenAi,
    HuggingFace,
}

impl OracleBackend {
    /// Resolve a caller-supplied selector.
    ///
    /// Any selector mentioning "openai" picks OpenAI; everything else goes to
    /// the free HuggingFace backend.
    pub fn from_selector(selector: &str) -> Self {
        if selector.to_ascii_lowercase().contains("openai") {
            Self::OpenAi
        } else {
            Self::HuggingFace
        }
    }

    /// Human-readable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI GPT (precise)",
            Self::HuggingFace => "HuggingFace LLM (free)",
        }
    }
}

impl fmt::Display for OracleBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One oracle per backend, chosen per run by [`OracleBackend`].
#[derive(Clone)]
pub struct OracleSet {
    openai: Arc<dyn ClassificationOracle>,
    huggingface: Arc<dyn ClassificationOracle>,
}

impl OracleSet {
    pub fn new(
        openai: Arc<dyn ClassificationOracle>,
        huggingface: Arc<dyn ClassificationOracle>,
    ) -> Self {
        Self {
            openai,
            huggingface,
        }
    }

    /// Create both HTTP backends from configuration.
    ///
    /// Missing API keys are not an error here; the affected backend reports
    /// them per call.
    pub fn from_config(config: &AppConfig) -> Result<Self, LlmError> {
        let openai = OpenAiOracle::new(&config.openai, config.oracle_timeout)?;
        let huggingface = HuggingFaceOracle::new(&config.huggingface, config.oracle_timeout)?;
        tracing::info!(
            openai_model = %config.openai.model,
            openai_key = config.openai.api_key.is_some(),
            huggingface_key = config.huggingface.api_key.is_some(),
            "Oracle backends ready"
        );
        Ok(Self::new(Arc::new(openai), Arc::new(huggingface)))
    }

    pub fn get(&self, backend: OracleBackend) -> Arc<dyn ClassificationOracle> {
        match backend {
            OracleBackend::OpenAi => Arc::clone(&self.openai),
            OracleBackend::HuggingFace => Arc::clone(&self.huggingface),
        }
    }
}

/// Build the shared HTTP client with the per-call timeout applied.
pub(crate) fn http_client(
    provider: &str,
    timeout: std::time::Duration,
) -> Result<reqwest::Client, LlmError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::RequestFailed {
            provider: provider.to_string(),
            reason: format!("Failed to create HTTP client: {e}"),
        })
}

/// Keep at most `max` characters of an upstream body for error messages.
pub(crate) fn truncate_body(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}
