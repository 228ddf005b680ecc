//! Matching engine: classifies each message against the task registry.
//!
//! Flow per message:
//! 1. Format the timestamp for display
//! 2. Build the classification prompt (registry + message body)
//! 3. Ask the oracle
//! 4. Parse the answer and file it as matched or unmatched
//!
//! Messages are handled one at a time, in input order. A bad answer for one
//! message only affects that message.

use std::sync::Arc;

use chrono::{DateTime, Datelike};
use tracing::{debug, info, warn};

use crate::llm::ClassificationOracle;
use crate::pipeline::parser::parse_classification;
use crate::pipeline::types::{
    ClassificationResult, InboundMessage, MatchOutcome, TaskRecord, UnmatchedEntry,
};

/// Shown instead of a timestamp that cannot be read.
pub const UNKNOWN_TIME: &str = "unknown time";

/// Prefix for oracle failures in the unmatched table.
pub const ORACLE_ERROR_PREFIX: &str = "[AI error]";

/// Classifies messages through a single oracle backend.
pub struct MatchingEngine {
    oracle: Arc<dyn ClassificationOracle>,
}

impl MatchingEngine {
    pub fn new(oracle: Arc<dyn ClassificationOracle>) -> Self {
        Self { oracle }
    }

    /// Classify every message and split the results into matched and
    /// unmatched lists, both in input order.
    pub async fn match_batch(
        &self,
        messages: &[InboundMessage],
        registry: &[TaskRecord],
    ) -> MatchOutcome {
        info!(
            count = messages.len(),
            tasks = registry.len(),
            oracle = self.oracle.name(),
            "Matching message batch"
        );

        let registry_json = render_registry(registry);
        let mut outcome = MatchOutcome::default();

        for (index, message) in messages.iter().enumerate() {
            let timestamp = format_timestamp(&message.ts);
            let result = self.classify(message, &registry_json).await;
            debug!(
                index,
                user = %message.user,
                result = result.label(),
                "Message classified"
            );
            file_result(&mut outcome, message, timestamp, result);
        }

        info!(
            total = outcome.total(),
            matched = outcome.matched.len(),
            unmatched = outcome.unmatched.len(),
            "Batch matching complete"
        );
        outcome
    }

    /// Classify one message. `registry_json` is the pre-rendered registry.
    pub async fn classify(
        &self,
        message: &InboundMessage,
        registry_json: &str,
    ) -> ClassificationResult {
        let prompt = build_classification_prompt(registry_json, &message.text);
        let raw = self.oracle.classify(&prompt).await;
        parse_classification(&raw, &message.text)
    }
}

/// Route a classification into the matching list.
fn file_result(
    outcome: &mut MatchOutcome,
    message: &InboundMessage,
    timestamp: String,
    result: ClassificationResult,
) {
    match result {
        ClassificationResult::Matched(task) => outcome.matched.push(task),
        ClassificationResult::Unmatched { original_text } => {
            outcome.unmatched.push(UnmatchedEntry {
                author: message.user.clone(),
                timestamp,
                text: original_text,
            });
        }
        ClassificationResult::OracleFailure { reason } => {
            warn!(user = %message.user, reason = %reason, "Oracle failed for message");
            outcome.unmatched.push(UnmatchedEntry {
                author: message.user.clone(),
                timestamp,
                text: format!("{ORACLE_ERROR_PREFIX} {reason}"),
            });
        }
    }
}

/// Format epoch seconds as `YYYY-MM-DD HH:MM` (UTC). Instants outside years
/// 1 to 9999 have no four-digit rendering and count as unreadable.
pub fn format_timestamp(ts: &str) -> String {
    let Ok(secs) = ts.trim().parse::<f64>() else {
        return UNKNOWN_TIME.to_string();
    };
    if !secs.is_finite() {
        return UNKNOWN_TIME.to_string();
    }
    DateTime::from_timestamp(secs.floor() as i64, 0)
        .filter(|dt| (1..=9999).contains(&dt.year()))
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| UNKNOWN_TIME.to_string())
}

// ── Prompt construction ─────────────────────────────────────────────

/// Render the registry as a pretty-printed JSON array for the prompt.
fn render_registry(registry: &[TaskRecord]) -> String {
    serde_json::to_string_pretty(registry).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to render task registry, sending an empty list");
        "[]".to_string()
    })
}

/// Build the classification prompt for one message.
fn build_classification_prompt(registry_json: &str, text: &str) -> String {
    format!(
        "You are a task analysis assistant. Decide whether the following Slack message \
         relates to one of the tasks in the task list.\n\n\
         Task list (JSON):\n{registry_json}\n\n\
         Message:\n{text}\n\n\
         Rules:\n\
         - If the message clearly mentions a task, its owner, its deadline or other related \
         details, find the corresponding task\n\
         - If a corresponding task is found, return that task as a JSON object with the keys \
         \"Task\", \"Priority\", \"Deadline\" and \"In-Charge\"\n\
         - If no task corresponds, return {{\"Unmatched\": \"<message text>\"}}\n\n\
         Return only a single JSON object, with no other explanatory text."
    )
}
