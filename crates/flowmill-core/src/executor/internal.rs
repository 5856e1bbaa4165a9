//! Built-in executor for `internal` tasks.
//!
//! Internal tasks carry no payload of their own; they exist to shape the
//! graph (fan-in points, logical checkpoints). Execution derives the
//! task's `output_values` from its declared slots and `file_outputs` and
//! succeeds.

use async_trait::async_trait;

use flowmill_types::workflow::{TaskDef, TaskInstanceState, WorkflowDefinition, WorkflowRun};

use super::{ExecutionOutcome, TaskExecutor, args};

#[derive(Debug, Clone, Copy, Default)]
pub struct InternalTaskExecutor;

impl InternalTaskExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TaskExecutor for InternalTaskExecutor {
    async fn execute(
        &self,
        _definition: &WorkflowDefinition,
        _run: &WorkflowRun,
        task: &TaskDef,
        state: &mut TaskInstanceState,
    ) -> ExecutionOutcome {
        tracing::debug!(task = task.id.as_str(), "executing internal task");

        state.output_values = args::derive_task_outputs(task, state);
        ExecutionOutcome::Succeeded
    }
}
