//! Value-type executor registry keyed by task kind.
//!
//! Owned by the runtime aggregate and shared with the orchestrator behind
//! an `Arc`; there is deliberately no global registry.

use std::collections::HashMap;
use std::sync::Arc;

use flowmill_types::workflow::{TaskDef, TaskInstanceState, TaskKind, WorkflowDefinition, WorkflowRun};

use super::{ExecutionOutcome, TaskExecutor};

/// Maps task kinds to executor implementations.
#[derive(Default)]
pub struct ExecutorRegistry {
    executors: HashMap<TaskKind, Arc<dyn TaskExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the executor for a task kind.
    pub fn register(&mut self, kind: TaskKind, executor: Arc<dyn TaskExecutor>) {
        self.executors.insert(kind, executor);
    }

    pub fn has(&self, kind: TaskKind) -> bool {
        self.executors.contains_key(&kind)
    }

    /// Dispatch a task to its executor. A kind with no registered executor
    /// fails the task with a recorded error.
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
        run: &WorkflowRun,
        task: &TaskDef,
        state: &mut TaskInstanceState,
    ) -> ExecutionOutcome {
        let Some(executor) = self.executors.get(&task.kind) else {
            tracing::error!(
                task = task.id.as_str(),
                kind = task.kind.as_keyword(),
                "no executor registered for task kind"
            );
            return ExecutionOutcome::failed(format!(
                "no executor registered for task kind '{}'",
                task.kind.as_keyword()
            ));
        };

        executor.execute(definition, run, task, state).await
    }
}
