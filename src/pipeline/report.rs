//! Markdown report rendering.

use chrono::{DateTime, Utc};

use crate::pipeline::types::{MatchOutcome, MatchedTask, UnmatchedEntry};

/// Maximum characters of a message shown in the unmatched table.
pub const SUMMARY_MAX_CHARS: usize = 40;

/// Shown in place of the matched table when nothing matched.
pub const NO_MATCHES_NOTICE: &str = "## No matching tasks found";

/// Render the report for one run.
pub fn build_report(
    outcome: &MatchOutcome,
    backend_name: &str,
    generated_at: DateTime<Utc>,
) -> String {
    let mut lines = vec![
        "# Task Summary Report".to_string(),
        String::new(),
        format!("**Generated at**: {}", generated_at.format("%Y-%m-%d %H:%M:%S")),
        format!("**Model**: {backend_name}"),
    ];

    lines.push(String::new());
    if outcome.matched.is_empty() {
        lines.push(NO_MATCHES_NOTICE.to_string());
    } else {
        lines.push("## Messages matching registry tasks".to_string());
        lines.push(String::new());
        lines.push("| Task | Priority | Deadline | In-Charge |".to_string());
        lines.push("|------|----------|----------|-----------|".to_string());
        lines.extend(outcome.matched.iter().map(matched_row));
    }

    if !outcome.unmatched.is_empty() {
        lines.push(String::new());
        lines.push("## Messages without a matching task".to_string());
        lines.push(String::new());
        lines.push("| Author | Time | Summary |".to_string());
        lines.push("|--------|------|---------|".to_string());
        lines.extend(outcome.unmatched.iter().map(unmatched_row));
    }

    lines.push(String::new());
    lines.push("---".to_string());
    lines.push(format!(
        "**Stats**: {} matched, {} unmatched",
        outcome.matched.len(),
        outcome.unmatched.len()
    ));

    lines.join("\n")
}

fn matched_row(task: &MatchedTask) -> String {
    format!(
        "| {} | {} | {} | {} |",
        cell(&task.task),
        cell(&task.priority),
        cell(&task.deadline),
        cell(&task.in_charge)
    )
}

fn unmatched_row(entry: &UnmatchedEntry) -> String {
    format!(
        "| {} | {} | {} |",
        cell(&entry.author),
        cell(&entry.timestamp),
        summarize(&entry.text)
    )
}

/// Make a value safe for a single table cell.
fn cell(value: &str) -> String {
    value.replace('|', "-").replace(['\r', '\n'], " ")
}

/// First non-blank line of `text`, capped at [`SUMMARY_MAX_CHARS`], with
/// `...` appended when anything was cut.
fn summarize(text: &str) -> String {
    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let first_line = lines.next().unwrap_or("");
    let mut summary: String = first_line.chars().take(SUMMARY_MAX_CHARS).collect();
    let truncated = summary.len() < first_line.len() || lines.next().is_some();
    summary = cell(&summary);
    if truncated {
        summary.push_str("...");
    }
    summary
}
