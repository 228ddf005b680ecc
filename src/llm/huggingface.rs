//! HuggingFace hosted-inference backend (Mixtral by default).

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, warn};

use super::{CLASSIFY_TEMPERATURE, ClassificationOracle, http_client, truncate_body};
use crate::config::HuggingFaceSettings;
use crate::error::LlmError;

const PROVIDER: &str = "HuggingFace";

/// Generation budget for one classification.
const MAX_NEW_TOKENS: u32 = 1024;

/// Free, approximate backend.
pub struct HuggingFaceOracle {
    api_key: Option<SecretString>,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl HuggingFaceOracle {
    pub fn new(settings: &HuggingFaceSettings, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            api_key: settings.api_key.clone(),
            endpoint: settings.endpoint.clone(),
            timeout,
            client: http_client(PROVIDER, timeout)?,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::MissingCredentials {
                provider: PROVIDER.to_string(),
            })?;

        let payload = serde_json::json!({
            "inputs": prompt,
            "parameters": {
                "max_new_tokens": MAX_NEW_TOKENS,
                "temperature": CLASSIFY_TEMPERATURE,
            }
        });

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|e| LlmError::from_reqwest(PROVIDER, self.timeout, e))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body: truncate_body(&text, 200),
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        let generated = generated_text(&body).ok_or_else(|| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: "unexpected response format".to_string(),
        })?;

        Ok(strip_prompt_echo(generated, prompt))
    }
}

#[async_trait]
impl ClassificationOracle for HuggingFaceOracle {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn classify(&self, prompt: &str) -> String {
        match self.generate(prompt).await {
            Ok(text) => {
                debug!(len = text.len(), "HuggingFace classification received");
                text
            }
            Err(e) => {
                warn!(error = %e, "HuggingFace classification failed");
                e.to_oracle_output()
            }
        }
    }
}

/// Pull `generated_text` from the first element of a non-empty array.
fn generated_text(body: &serde_json::Value) -> Option<&str> {
    let first = body.as_array()?.first()?;
    Some(
        first
            .get("generated_text")
            .and_then(|v| v.as_str())
            .unwrap_or(""),
    )
}

/// Text-generation models echo the prompt before their answer; keep only
/// what follows the last copy of it.
fn strip_prompt_echo(generated: &str, prompt: &str) -> String {
    if prompt.is_empty() {
        return generated.to_string();
    }
    match generated.rfind(prompt) {
        Some(idx) => generated[idx + prompt.len()..].trim().to_string(),
        None => generated.to_string(),
    }
}
