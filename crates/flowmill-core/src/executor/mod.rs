//! Task executor contract and registry.
//!
//! The orchestrator dispatches each task through an [`ExecutorRegistry`]
//! keyed on [`TaskKind`](flowmill_types::workflow::TaskKind). Executors
//! receive an exclusive reference to exactly one task instance at a time
//! and report a typed outcome instead of using errors as control flow;
//! panics inside spawned task units are converted to failures at the wave
//! join.

pub mod args;
pub mod internal;
#[cfg(test)]
pub mod mock;
pub mod registry;

use async_trait::async_trait;

use flowmill_types::workflow::{TaskDef, TaskInstanceState, WorkflowDefinition, WorkflowRun};

pub use registry::ExecutorRegistry;

/// Result of one executor invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Succeeded,
    Skipped,
    Failed { reason: String },
}

impl ExecutionOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped)
    }
}

/// The contract every task executor fulfils.
///
/// On success the executor populates `state.output_values` so downstream
/// dataflow edges can resolve against this task.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(
        &self,
        definition: &WorkflowDefinition,
        run: &WorkflowRun,
        task: &TaskDef,
        state: &mut TaskInstanceState,
    ) -> ExecutionOutcome;
}
