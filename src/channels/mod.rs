//! Report delivery.
//!
//! A [`DeliverySink`] receives the finished report text. The Slack sink
//! splits it with [`chunk_text`] to stay under the per-message limit.

pub mod chunk;
pub mod slack;

pub use chunk::{Chunks, chunk_text};
pub use slack::SlackSink;

use async_trait::async_trait;

use crate::error::ChannelError;

/// Destination for a finished report.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Channel name (e.g. "slack").
    fn name(&self) -> &str;

    /// Forward the full report text.
    async fn deliver(&self, report: &str) -> Result<(), ChannelError>;
}
