//! Pipeline entry point: batch JSON in, report text out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::channels::{DeliverySink, SlackSink};
use crate::config::AppConfig;
use crate::error::PipelineError;
use crate::llm::{OracleBackend, OracleSet};
use crate::pipeline::matcher::MatchingEngine;
use crate::pipeline::report::build_report;
use crate::pipeline::types::InboundMessage;
use crate::registry::{CsvRegistry, TaskSource};

/// Appended when no delivery sink is configured.
pub const DELIVERY_SKIPPED_NOTE: &str = "Slack not configured; report shown only";

/// Appended when delivery was switched off for this pipeline.
pub const DELIVERY_DISABLED_NOTE: &str = "Slack delivery disabled; report shown only";

/// Appended after a successful delivery.
pub const DELIVERY_OK_NOTE: &str = "✅ Report delivered to Slack";

/// Registry + oracles + optional sink, wired once and run per batch.
pub struct TaskSyncPipeline {
    registry: Arc<dyn TaskSource>,
    oracles: OracleSet,
    sink: Option<Arc<dyn DeliverySink>>,
    delivery_disabled: bool,
}

impl TaskSyncPipeline {
    pub fn new(
        registry: Arc<dyn TaskSource>,
        oracles: OracleSet,
        sink: Option<Arc<dyn DeliverySink>>,
    ) -> Self {
        Self {
            registry,
            oracles,
            sink,
            delivery_disabled: false,
        }
    }

    /// Wire the CSV registry, both HTTP oracles and Slack (when configured).
    pub fn from_config(config: &AppConfig) -> crate::error::Result<Self> {
        let registry = Arc::new(CsvRegistry::new(config.registry_path.clone()));
        let oracles = OracleSet::from_config(config)?;
        let sink = SlackSink::from_settings(&config.slack)?
            .map(|sink| Arc::new(sink) as Arc<dyn DeliverySink>);
        if sink.is_none() {
            info!("Slack delivery not configured");
        }
        Ok(Self::new(registry, oracles, sink))
    }

    /// Drop the delivery sink; reports are only returned.
    pub fn without_delivery(mut self) -> Self {
        self.sink = None;
        self.delivery_disabled = true;
        self
    }

    /// Classify a batch, render the report and forward it.
    ///
    /// Always returns text: the report followed by a delivery status line, or
    /// a one-line description of why the run was aborted.
    pub async fn run(&self, messages_json: &str, selector: &str) -> String {
        let backend = OracleBackend::from_selector(selector);
        let report = match self.build(messages_json, backend, Utc::now()).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Pipeline aborted");
                return e.to_string();
            }
        };

        let status = self.deliver(&report).await;
        format!("{report}\n\n{status}")
    }

    /// Load the registry, classify the batch and render the report.
    pub async fn build(
        &self,
        messages_json: &str,
        backend: OracleBackend,
        generated_at: DateTime<Utc>,
    ) -> Result<String, PipelineError> {
        let registry = self.registry.load()?;
        let messages = parse_batch(messages_json)?;

        let engine = MatchingEngine::new(self.oracles.get(backend));
        let outcome = engine.match_batch(&messages, &registry).await;

        Ok(build_report(&outcome, backend.label(), generated_at))
    }

    /// Forward the report and describe what happened.
    async fn deliver(&self, report: &str) -> String {
        if self.delivery_disabled {
            return DELIVERY_DISABLED_NOTE.to_string();
        }
        let Some(sink) = &self.sink else {
            return DELIVERY_SKIPPED_NOTE.to_string();
        };
        match sink.deliver(report).await {
            Ok(()) => DELIVERY_OK_NOTE.to_string(),
            Err(e) => {
                warn!(sink = sink.name(), error = %e, "Report delivery failed");
                format!("Slack delivery failed: {e}")
            }
        }
    }
}

/// Decode the message batch: a JSON array of message objects.
pub fn parse_batch(messages_json: &str) -> Result<Vec<InboundMessage>, PipelineError> {
    let value: serde_json::Value = serde_json::from_str(messages_json)
        .map_err(|e| PipelineError::BatchJson(e.to_string()))?;

    let items = match value {
        serde_json::Value::Array(items) => items,
        _ => return Err(PipelineError::BatchShape),
    };
    if !items.iter().all(serde_json::Value::is_object) {
        return Err(PipelineError::BatchShape);
    }

    items
        .into_iter()
        .map(serde_json::from_value)
        .collect::<Result<Vec<InboundMessage>, _>>()
        .map_err(|e| PipelineError::BatchJson(e.to_string()))
}
