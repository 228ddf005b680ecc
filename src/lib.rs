//! task-sync: reconcile chat messages against a task registry.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod registry;
