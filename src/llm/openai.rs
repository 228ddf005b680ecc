//! OpenAI chat-completions backend.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CLASSIFY_TEMPERATURE, ClassificationOracle, http_client, truncate_body};
use crate::config::OpenAiSettings;
use crate::error::LlmError;

const PROVIDER: &str = "OpenAI";

/// Paid, precise backend.
pub struct OpenAiOracle {
    api_key: Option<SecretString>,
    base_url: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiOracle {
    pub fn new(settings: &OpenAiSettings, timeout: Duration) -> Result<Self, LlmError> {
        Ok(Self {
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            timeout,
            client: http_client(PROVIDER, timeout)?,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::MissingCredentials {
                provider: PROVIDER.to_string(),
            })?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: CLASSIFY_TEMPERATURE,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&body)
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

        let parsed: ChatResponse = resp.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER.to_string(),
            reason: e.to_string(),
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER.to_string(),
                reason: "response has no message content".to_string(),
            })
    }
}

#[async_trait]
impl ClassificationOracle for OpenAiOracle {
    fn name(&self) -> &str {
        "openai"
    }

    async fn classify(&self, prompt: &str) -> String {
        match self.complete(prompt).await {
            Ok(content) => {
                debug!(model = %self.model, len = content.len(), "OpenAI classification received");
                content
            }
            Err(e) => {
                warn!(model = %self.model, error = %e, "OpenAI classification failed");
                e.to_oracle_output()
            }
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
