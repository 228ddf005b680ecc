//! Shared types for the matching pipeline.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Placeholder for task attributes the oracle left out.
pub const NOT_AVAILABLE: &str = "N/A";

// ── Registry ────────────────────────────────────────────────────────

/// One row of the task registry.
///
/// Serializes with the registry's own column names so the prompt shows the
/// oracle exactly the shape it is asked to echo back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRecord {
    #[serde(rename = "Task")]
    pub task: String,
    #[serde(rename = "Priority")]
    pub priority: String,
    #[serde(rename = "Deadline")]
    pub deadline: String,
    #[serde(rename = "In-Charge")]
    pub in_charge: String,
    /// Any additional registry columns, by header name.
    #[serde(flatten)]
    pub extra: BTreeMap<String, String>,
}

impl TaskRecord {
    pub fn new(
        task: impl Into<String>,
        priority: impl Into<String>,
        deadline: impl Into<String>,
        in_charge: impl Into<String>,
    ) -> Self {
        Self {
            task: task.into(),
            priority: priority.into(),
            deadline: deadline.into(),
            in_charge: in_charge.into(),
            extra: BTreeMap::new(),
        }
    }
}

// ── Inbound message ─────────────────────────────────────────────────

/// A chat message as supplied in the batch JSON.
///
/// Every field is optional in the input. Non-string values (e.g. a numeric
/// `ts`) are accepted and rendered as text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InboundMessage {
    /// Epoch seconds, possibly fractional.
    #[serde(default = "default_ts", deserialize_with = "lenient_ts")]
    pub ts: String,
    /// Author identifier.
    #[serde(default = "default_user", deserialize_with = "lenient_user")]
    pub user: String,
    /// Message body.
    #[serde(default, deserialize_with = "lenient_text")]
    pub text: String,
}

impl InboundMessage {
    pub fn new(ts: impl Into<String>, user: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            ts: ts.into(),
            user: user.into(),
            text: text.into(),
        }
    }
}

fn default_ts() -> String {
    "0".to_string()
}

fn default_user() -> String {
    "Unknown".to_string()
}

fn lenient_ts<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient(d, default_ts)
}

fn lenient_user<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient(d, default_user)
}

fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    lenient(d, String::new)
}

fn lenient<'de, D: Deserializer<'de>>(
    d: D,
    on_null: fn() -> String,
) -> Result<String, D::Error> {
    let value = serde_json::Value::deserialize(d)?;
    Ok(match value {
        serde_json::Value::Null => on_null(),
        other => value_to_text(&other),
    })
}

/// Render a JSON value as plain text: strings unquoted, everything else as JSON.
pub(crate) fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ── Classification ──────────────────────────────────────────────────

/// Task attributes extracted from a matching oracle answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchedTask {
    #[serde(rename = "Task")]
    pub task: String,
    #[serde(rename = "Priority")]
    pub priority: String,
    #[serde(rename = "Deadline")]
    pub deadline: String,
    #[serde(rename = "In-Charge")]
    pub in_charge: String,
}

/// Outcome of classifying one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationResult {
    /// The message refers to a registry task.
    Matched(MatchedTask),
    /// No task matched, or the oracle answer could not be read.
    Unmatched { original_text: String },
    /// The oracle reported an error instead of answering.
    OracleFailure { reason: String },
}

impl ClassificationResult {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Matched(_) => "matched",
            Self::Unmatched { .. } => "unmatched",
            Self::OracleFailure { .. } => "oracle_failure",
        }
    }
}

// ── Aggregates ──────────────────────────────────────────────────────

/// A message that did not match any task, as shown in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedEntry {
    pub author: String,
    /// Already formatted for display.
    pub timestamp: String,
    /// Original text, or `[AI error] <reason>` for oracle failures.
    pub text: String,
}

/// Matched and unmatched messages, each in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    pub matched: Vec<MatchedTask>,
    pub unmatched: Vec<UnmatchedEntry>,
}

impl MatchOutcome {
    /// Number of messages classified.
    pub fn total(&self) -> usize {
        self.matched.len() + self.unmatched.len()
    }
}
