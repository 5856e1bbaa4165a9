//! Engine-level error type.

use thiserror::Error;

/// Errors produced by the workflow engine (parsing, validation, resolution,
/// execution).
///
/// Validation is total: the registry collects every `WorkflowError` a
/// definition produces instead of stopping at the first. Task-level
/// failures are captured into the task's instance state and aggregated at
/// run level; they do not unwind the orchestrator.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// JCWF document could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// Structural validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// A task references a dependency that does not exist.
    #[error("unknown dependency: {0}")]
    UnknownDependency(String),

    /// The task graph contains a cycle.
    #[error("cycle detected: {0}")]
    CycleDetected(String),

    /// A dataflow edge or template reference could not be resolved.
    #[error("resolve error: {0}")]
    Resolve(String),

    /// An executor reported a failure.
    #[error("executor error: {0}")]
    Executor(String),

    /// No ready wave exists but non-terminal tasks remain.
    #[error("deadlock: {0}")]
    Deadlock(String),

    /// The requested workflow is not in the registry.
    #[error("unknown workflow: '{0}'")]
    UnknownWorkflow(String),

    /// Filesystem I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
