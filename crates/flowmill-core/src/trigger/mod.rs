//! Trigger subsystem: run activations from auto, cron, file-watch, and
//! manual sources.
//!
//! The engine never calls the orchestrator directly; every fire is pushed
//! as a [`TriggerFired`] event into a bounded channel that the driver loop
//! drains. Neither side holds a reference to the other.

pub mod binder;
pub mod cron;
pub mod engine;

use thiserror::Error;

pub use cron::CronExpression;
pub use engine::{FileEventKind, TriggerEngine};

/// Errors raised while parsing trigger configuration.
#[derive(Debug, Error)]
pub enum TriggerError {
    /// A cron expression failed to parse.
    #[error("invalid cron expression: {0}")]
    InvalidExpression(String),

    /// A trigger's `params` JSON is missing or malformed.
    #[error("invalid trigger params: {0}")]
    InvalidParams(String),
}

/// A trigger activation: which workflow to run and which trigger asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerFired {
    pub workflow_id: String,
    pub trigger_id: String,
}
