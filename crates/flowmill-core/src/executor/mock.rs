//! `MockExecutor` -- a test double for [`TaskExecutor`].
//!
//! Used by orchestrator and integration tests where spawning real
//! processes is irrelevant. Records every task id it executes and follows
//! a scripted behaviour.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use flowmill_types::workflow::{TaskDef, TaskInstanceState, WorkflowDefinition, WorkflowRun};

use super::{ExecutionOutcome, TaskExecutor, args};

/// Behaviour injected into `MockExecutor` at construction time.
pub enum MockBehaviour {
    /// Derive outputs from `file_outputs` and succeed.
    Succeed,
    /// Create each `file_outputs` entry on disk, derive outputs, succeed.
    WriteFiles,
    /// Fail with the given reason.
    Fail(String),
}

/// A mock executor that records every call it receives.
pub struct MockExecutor {
    /// Label used in test assertions.
    pub name: String,
    pub behaviour: MockBehaviour,
    /// Task ids seen by this executor (in call order).
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl MockExecutor {
    pub fn succeeding(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::Succeed,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A mock that materializes its declared output files, so freshness
    /// checks in later runs see real timestamps.
    pub fn writing_files(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::WriteFiles,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::Fail(reason.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times this executor has run.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TaskExecutor for MockExecutor {
    async fn execute(
        &self,
        _definition: &WorkflowDefinition,
        _run: &WorkflowRun,
        task: &TaskDef,
        state: &mut TaskInstanceState,
    ) -> ExecutionOutcome {
        self.calls.lock().unwrap().push(task.id.clone());

        match &self.behaviour {
            MockBehaviour::Succeed => {
                state.output_values = args::derive_task_outputs(task, state);
                ExecutionOutcome::Succeeded
            }
            MockBehaviour::WriteFiles => {
                let no_outputs = std::collections::BTreeMap::new();
                let paths = crate::workflow::template::resolve_path_list(
                    &task.file_outputs,
                    &state.input_values,
                    &no_outputs,
                )
                .unwrap_or_default();

                for path in &paths {
                    if std::fs::write(path, self.name.as_bytes()).is_err() {
                        return ExecutionOutcome::failed(format!(
                            "mock could not write '{}'",
                            path.display()
                        ));
                    }
                }

                state.output_values = args::derive_task_outputs(task, state);
                ExecutionOutcome::Succeeded
            }
            MockBehaviour::Fail(reason) => ExecutionOutcome::failed(reason.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmill_types::workflow::TaskKind;

    #[tokio::test]
    async fn mock_records_calls() {
        let mock = MockExecutor::succeeding("m");
        let definition = WorkflowDefinition::new("wf");
        let run = WorkflowRun::new("wf", "wf_1", std::iter::empty());
        let task = TaskDef::new("t", TaskKind::Internal);
        let mut state = TaskInstanceState::default();

        mock.execute(&definition, &run, &task, &mut state).await;
        mock.execute(&definition, &run, &task, &mut state).await;

        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.calls.lock().unwrap().as_slice(), ["t", "t"]);
    }

    #[tokio::test]
    async fn failing_mock_reports_reason() {
        let mock = MockExecutor::failing("m", "scripted failure");
        let definition = WorkflowDefinition::new("wf");
        let run = WorkflowRun::new("wf", "wf_1", std::iter::empty());
        let task = TaskDef::new("t", TaskKind::Internal);
        let mut state = TaskInstanceState::default();

        let outcome = mock.execute(&definition, &run, &task, &mut state).await;
        assert_eq!(outcome, ExecutionOutcome::failed("scripted failure"));
    }

    #[tokio::test]
    async fn writing_mock_creates_output_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("artifact.txt");

        let mock = MockExecutor::writing_files("m");
        let definition = WorkflowDefinition::new("wf");
        let run = WorkflowRun::new("wf", "wf_1", std::iter::empty());
        let mut task = TaskDef::new("t", TaskKind::Internal);
        task.file_outputs = vec![out.display().to_string()];
        let mut state = TaskInstanceState::default();

        let outcome = mock.execute(&definition, &run, &task, &mut state).await;
        assert_eq!(outcome, ExecutionOutcome::Succeeded);
        assert!(out.exists());
    }
}
