//! Message-to-task matching pipeline.
//!
//! A batch flows through:
//! 1. `registry::TaskSource::load()`: the task registry
//! 2. `MatchingEngine::match_batch()`: prompt, oracle, parse, route per message
//! 3. `build_report()`: Markdown report with statistics
//! 4. `DeliverySink::deliver()`: forwarded to Slack when configured
//!
//! Only a missing registry or an unreadable batch aborts a run. Everything
//! that goes wrong for a single message lands in the unmatched table.

pub mod matcher;
pub mod parser;
pub mod report;
pub mod runner;
pub mod types;

pub use matcher::{MatchingEngine, format_timestamp};
pub use parser::parse_classification;
pub use report::build_report;
pub use runner::{TaskSyncPipeline, parse_batch};
pub use types::{
    ClassificationResult, InboundMessage, MatchOutcome, MatchedTask, TaskRecord, UnmatchedEntry,
};
