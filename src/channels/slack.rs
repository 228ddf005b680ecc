//! Slack delivery via the Web API.
//!
//! The report is posted as a series of code-fenced messages, then uploaded in
//! full as a text file using the external upload flow
//! (`files.getUploadURLExternal` → upload → `files.completeUploadExternal`).

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::{debug, info};

use crate::channels::{DeliverySink, chunk_text};
use crate::config::SlackSettings;
use crate::error::ChannelError;

const CHANNEL_NAME: &str = "slack";

/// File name of the uploaded report.
pub const REPORT_FILENAME: &str = "task_summary.txt";

/// Title shown for the uploaded report.
pub const REPORT_TITLE: &str = "Full task summary";

/// Bounded timeout for every Slack call.
const SLACK_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts reports to one Slack channel or user.
pub struct SlackSink {
    bot_token: SecretString,
    channel: String,
    api_base: String,
    max_message_length: usize,
    client: reqwest::Client,
}

impl SlackSink {
    pub fn new(
        bot_token: SecretString,
        channel: impl Into<String>,
        api_base: &str,
        max_message_length: usize,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(SLACK_TIMEOUT)
            .build()
            .map_err(|e| send_failed(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            bot_token,
            channel: channel.into(),
            api_base: api_base.trim_end_matches('/').to_string(),
            max_message_length,
            client,
        })
    }

    /// Build from settings. Returns `None` when the token or channel is unset.
    pub fn from_settings(settings: &SlackSettings) -> Result<Option<Self>, ChannelError> {
        let (Some(token), Some(channel)) = (&settings.bot_token, &settings.channel) else {
            return Ok(None);
        };
        Self::new(
            token.clone(),
            channel.clone(),
            &settings.api_base,
            settings.max_message_length,
        )
        .map(Some)
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    /// Post one chunk, wrapped in a code fence so tables keep their layout.
    async fn post_message(&self, text: &str) -> Result<(), ChannelError> {
        let body = serde_json::json!({
            "channel": self.channel,
            "text": format!("```\n{text}\n```"),
        });
        let request = self
            .client
            .post(self.api_url("chat.postMessage"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body);
        call(request, "chat.postMessage").await?;
        Ok(())
    }

    /// Upload `content` as a file shared to the channel.
    async fn upload_file(
        &self,
        content: &str,
        filename: &str,
        title: &str,
    ) -> Result<(), ChannelError> {
        let length = content.len().to_string();
        let request = self
            .client
            .post(self.api_url("files.getUploadURLExternal"))
            .bearer_auth(self.bot_token.expose_secret())
            .query(&[("filename", filename), ("length", length.as_str())]);
        let ticket = call(request, "files.getUploadURLExternal").await?;

        let upload_url = ticket["upload_url"]
            .as_str()
            .ok_or_else(|| upload_failed("response has no upload_url"))?;
        let file_id = ticket["file_id"]
            .as_str()
            .ok_or_else(|| upload_failed("response has no file_id"))?;

        let resp = self
            .client
            .post(upload_url)
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| upload_failed(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(upload_failed(format!("upload returned status {}", resp.status())));
        }

        let body = serde_json::json!({
            "files": [{ "id": file_id, "title": title }],
            "channel_id": self.channel,
        });
        let request = self
            .client
            .post(self.api_url("files.completeUploadExternal"))
            .bearer_auth(self.bot_token.expose_secret())
            .json(&body);
        call(request, "files.completeUploadExternal").await?;

        debug!(file_id, filename, "Report file uploaded");
        Ok(())
    }
}

#[async_trait]
impl DeliverySink for SlackSink {
    fn name(&self) -> &str {
        CHANNEL_NAME
    }

    async fn deliver(&self, report: &str) -> Result<(), ChannelError> {
        let mut parts = 0;
        for chunk in chunk_text(report, self.max_message_length) {
            self.post_message(chunk).await?;
            parts += 1;
        }
        self.upload_file(report, REPORT_FILENAME, REPORT_TITLE).await?;

        info!(channel = %self.channel, parts, "Report delivered to Slack");
        Ok(())
    }
}

/// Send a Web API request and check Slack's `ok` flag.
async fn call(request: reqwest::RequestBuilder, method: &str) -> Result<Value, ChannelError> {
    let resp = request
        .send()
        .await
        .map_err(|e| send_failed(format!("{method}: {e}")))?;

    let status = resp.status();
    let body: Value = resp.json().await.map_err(|e| {
        send_failed(format!(
            "{method} returned status {status} with unreadable body: {e}"
        ))
    })?;

    if body["ok"].as_bool() == Some(true) {
        return Ok(body);
    }

    let reason = body["error"].as_str().unwrap_or("unknown_error");
    Err(ChannelError::Rejected {
        name: CHANNEL_NAME.to_string(),
        reason: format!("{method}: {reason}"),
    })
}

fn send_failed(reason: impl Into<String>) -> ChannelError {
    ChannelError::SendFailed {
        name: CHANNEL_NAME.to_string(),
        reason: reason.into(),
    }
}

fn upload_failed(reason: impl Into<String>) -> ChannelError {
    ChannelError::UploadFailed {
        name: CHANNEL_NAME.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(token: Option<&str>, channel: Option<&str>) -> SlackSettings {
        SlackSettings {
            bot_token: token.map(|t| SecretString::from(t.to_string())),
            channel: channel.map(str::to_string),
            api_base: "https://slack.com/api/".to_string(),
            max_message_length: 3500,
        }
    }

    #[test]
    fn unconfigured_settings_give_no_sink() {
        assert!(SlackSink::from_settings(&settings(None, Some("U1"))).unwrap().is_none());
        assert!(SlackSink::from_settings(&settings(Some("xoxb"), None)).unwrap().is_none());
    }

    #[test]
    fn configured_settings_build_sink() {
        let sink = SlackSink::from_settings(&settings(Some("xoxb-test"), Some("U123")))
            .unwrap()
            .unwrap();
        assert_eq!(sink.name(), "slack");
        assert_eq!(sink.channel, "U123");
        assert_eq!(
            sink.api_url("chat.postMessage"),
            "https://slack.com/api/chat.postMessage"
        );
    }

    #[tokio::test]
    async fn unreachable_api_reports_send_failure() {
        let sink = SlackSink::new(
            SecretString::from("xoxb-test".to_string()),
            "U123",
            "http://127.0.0.1:9/api",
            3500,
        )
        .unwrap();

        let err = sink.deliver("report").await.unwrap_err();
        assert!(matches!(err, ChannelError::SendFailed { .. }));
        assert!(err.to_string().contains("chat.postMessage"));
    }
}
