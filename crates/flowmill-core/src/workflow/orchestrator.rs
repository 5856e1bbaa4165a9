//! Wave-based workflow orchestration.
//!
//! `run_once` drives a workflow to a terminal completion record: scan all
//! non-terminal tasks, skip the ones that are provably up to date, dispatch
//! every ready task concurrently, join the whole wave, repeat. Task state
//! mutations are safe because each spawned unit owns its instance state for
//! the duration of the wave and the driver merges results back at the join
//! barrier; `output_values` of a task become visible to dependents in the
//! next wave.
//!
//! A failed task does not cancel wave-mates; its dependents simply never
//! become ready, the next scan makes no progress, and the run completes as
//! failed.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::JoinSet;

use flowmill_types::workflow::{
    TaskDef, TaskInstanceState, TaskState, RunState, WorkflowDefinition, WorkflowRun,
};

use crate::executor::ExecutorRegistry;
use crate::workflow::freshness::{self, ResolvedPaths};
use crate::workflow::registry::WorkflowRegistry;
use crate::workflow::{dataflow, template};

/// Drives workflow runs and retains the last completed run per workflow.
pub struct WorkflowOrchestrator {
    registry: Arc<WorkflowRegistry>,
    executors: Arc<ExecutorRegistry>,
    /// One-slot-per-workflow cache of completed runs.
    last_runs: DashMap<String, WorkflowRun>,
}

impl WorkflowOrchestrator {
    pub fn new(registry: Arc<WorkflowRegistry>, executors: Arc<ExecutorRegistry>) -> Self {
        Self {
            registry,
            executors,
            last_runs: DashMap::new(),
        }
    }

    /// Execute one activation of `workflow_id`. Returns true iff the run
    /// completed with every task Succeeded or Skipped.
    ///
    /// The completed run is stored as the workflow's last run regardless of
    /// success.
    pub async fn run_once(&self, workflow_id: &str, run_id: Option<&str>) -> bool {
        let Some(definition) = self.registry.get(workflow_id) else {
            tracing::error!(workflow = workflow_id, "run_once: unknown workflow id");
            return false;
        };

        if !self.registry.is_valid(workflow_id) {
            tracing::error!(workflow = workflow_id, "run_once: workflow failed validation, refusing to run");
            return false;
        }

        let run_id = match run_id {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => generate_run_id(&definition),
        };

        let mut run = WorkflowRun::new(definition.id.clone(), run_id, definition.tasks.keys());
        run.state = RunState::Running;
        run.started_at = now_rfc3339();

        tracing::info!(workflow = definition.id.as_str(), run = run.run_id.as_str(), "starting workflow run");

        let success = self.execute_workflow(&definition, &mut run).await;

        run.completed_at = now_rfc3339();
        run.state = if run.has_failed {
            RunState::Failed
        } else {
            RunState::Succeeded
        };

        if run.has_failed {
            tracing::error!(workflow = definition.id.as_str(), run = run.run_id.as_str(), "workflow run finished with failure");
        } else {
            tracing::info!(workflow = definition.id.as_str(), run = run.run_id.as_str(), "workflow run completed successfully");
        }

        self.last_runs.insert(definition.id.clone(), run);
        success
    }

    /// The last completed run of a workflow, if any.
    pub fn last_run(&self, workflow_id: &str) -> Option<WorkflowRun> {
        self.last_runs.get(workflow_id).map(|r| r.value().clone())
    }

    // -----------------------------------------------------------------------
    // Execution loop
    // -----------------------------------------------------------------------

    async fn execute_workflow(
        &self,
        definition: &Arc<WorkflowDefinition>,
        run: &mut WorkflowRun,
    ) -> bool {
        while !run.completed {
            let made_progress = self.execute_one_ready_wave(definition, run).await;

            if !made_progress {
                if run.has_active_tasks() {
                    tracing::error!(
                        workflow = definition.id.as_str(),
                        "no ready wave but non-terminal tasks remain (deadlock)"
                    );
                    run.has_failed = true;
                }
                run.completed = true;
            } else if !run.has_active_tasks() {
                run.completed = true;
            }
        }

        !run.has_failed
    }

    /// One scheduler iteration: mark skips, dispatch ready tasks, join.
    /// Returns whether any task changed state.
    async fn execute_one_ready_wave(
        &self,
        definition: &Arc<WorkflowDefinition>,
        run: &mut WorkflowRun,
    ) -> bool {
        let mut made_progress = false;
        let mut ready: Vec<String> = Vec::new();

        // -------------------------------------------------------------------
        // 1. Collect the ready wave, resolving skips along the way.
        // -------------------------------------------------------------------
        let task_ids: Vec<String> = run.task_states.keys().cloned().collect();

        for task_id in task_ids {
            let current = run
                .task_states
                .get(&task_id)
                .map(|s| s.state)
                .unwrap_or(TaskState::Failed);
            if !matches!(current, TaskState::Pending | TaskState::Ready) {
                continue;
            }

            let Some(task) = definition.tasks.get(&task_id) else {
                tracing::error!(task = task_id.as_str(), "task missing from workflow definition");
                if let Some(state) = run.task_states.get_mut(&task_id) {
                    state.state = TaskState::Failed;
                    state.last_error = "task missing from workflow definition".to_string();
                }
                run.has_failed = true;
                made_progress = true;
                continue;
            };

            if !dependencies_satisfied(run, task) {
                continue;
            }

            // Up-to-date check with fully template-resolved paths. Tasks
            // whose templates cannot be resolved yet are conservatively
            // treated as not up to date.
            if let Some(paths) = resolve_freshness_paths(definition, run, task, &task_id) {
                let resolve_upstream = |upstream_id: &str| -> Option<Vec<PathBuf>> {
                    let upstream = definition.tasks.get(upstream_id)?;
                    resolve_freshness_paths(definition, run, upstream, upstream_id)
                        .map(|p| p.outputs)
                };

                if freshness::is_task_up_to_date(definition, &task_id, &paths, &resolve_upstream) {
                    tracing::info!(task = task_id.as_str(), "task is up to date, skipping");
                    if let Some(state) = run.task_states.get_mut(&task_id) {
                        populate_skipped_outputs(task, &paths, state);
                        state.state = TaskState::Skipped;
                        state.completed_at = now_rfc3339();
                    }
                    made_progress = true;
                    continue;
                }
            }

            ready.push(task_id);
        }

        // -------------------------------------------------------------------
        // 2. Nothing ready: this wave is over.
        // -------------------------------------------------------------------
        if ready.is_empty() {
            return made_progress;
        }
        made_progress = true;

        tracing::debug!(
            workflow = definition.id.as_str(),
            tasks = ready.len(),
            "dispatching ready wave"
        );

        // -------------------------------------------------------------------
        // 3. Transition to Running before submission so concurrent readers
        //    observe progress, then dispatch the whole wave.
        // -------------------------------------------------------------------
        let started_at = now_rfc3339();
        for task_id in &ready {
            if let Some(state) = run.task_states.get_mut(task_id) {
                state.state = TaskState::Running;
                state.attempt_count += 1;
                state.started_at = started_at.clone();
            }
        }

        // Upstream outputs are frozen for the duration of the wave, so a
        // snapshot is a correct resolution context for every wave member.
        let snapshot = Arc::new(run.clone());
        let mut join_set: JoinSet<(String, TaskInstanceState, bool)> = JoinSet::new();

        for task_id in &ready {
            let definition = Arc::clone(definition);
            let snapshot = Arc::clone(&snapshot);
            let executors = Arc::clone(&self.executors);
            let task_id = task_id.clone();
            let mut state = snapshot.task_states.get(&task_id).cloned().unwrap_or_default();

            join_set.spawn(async move {
                let Some(task) = definition.tasks.get(&task_id) else {
                    state.state = TaskState::Failed;
                    state.last_error = "task missing from workflow definition".to_string();
                    return (task_id, state, false);
                };

                let ok = execute_task_instance(
                    &definition,
                    &snapshot,
                    task,
                    &task_id,
                    &mut state,
                    &executors,
                )
                .await;

                (task_id, state, ok)
            });
        }

        // -------------------------------------------------------------------
        // 4. Join the wave and merge worker-owned states back into the run.
        // -------------------------------------------------------------------
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((task_id, mut state, ok)) => {
                    state.completed_at = now_rfc3339();
                    if !ok {
                        if state.state != TaskState::Failed {
                            state.state = TaskState::Failed;
                        }
                        run.has_failed = true;
                        tracing::error!(
                            task = task_id.as_str(),
                            error = state.last_error.as_str(),
                            "task failed"
                        );
                    } else if !state.state.is_terminal() {
                        state.state = TaskState::Succeeded;
                    }
                    run.task_states.insert(task_id, state);
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "task in wave panicked");
                    run.has_failed = true;
                }
            }
        }

        // A panicked unit never reported back; its state is still Running.
        for task_id in &ready {
            if let Some(state) = run.task_states.get_mut(task_id)
                && state.state == TaskState::Running
            {
                state.state = TaskState::Failed;
                state.last_error = "task panicked during execution".to_string();
                state.completed_at = now_rfc3339();
                run.has_failed = true;
            }
        }

        made_progress
    }
}

// ---------------------------------------------------------------------------
// Per-task execution
// ---------------------------------------------------------------------------

/// Resolve inputs, dispatch the executor, snapshot values. Returns true iff
/// the terminal state is Succeeded or Skipped.
async fn execute_task_instance(
    definition: &WorkflowDefinition,
    run: &WorkflowRun,
    task: &TaskDef,
    task_id: &str,
    state: &mut TaskInstanceState,
    executors: &ExecutorRegistry,
) -> bool {
    state.state = TaskState::Running;

    // Step 1: resolve logical inputs via dataflow edges.
    match dataflow::resolve_inputs_for_task(definition, run, task, task_id) {
        Ok(resolved) => {
            state.input_values = resolved;
            state.inputs_json = template::summarize_values(&state.input_values);
        }
        Err(e) => {
            state.last_error = format!("failed to resolve task inputs via dataflow: {e}");
            state.state = TaskState::Failed;
            return false;
        }
    }

    // Step 2: dispatch through the executor registry.
    let outcome = executors.execute(definition, run, task, state).await;

    match outcome {
        crate::executor::ExecutionOutcome::Failed { reason } => {
            state.last_error = reason;
            state.state = TaskState::Failed;
            return false;
        }
        crate::executor::ExecutionOutcome::Skipped => {
            state.state = TaskState::Skipped;
        }
        crate::executor::ExecutionOutcome::Succeeded => {
            if state.state != TaskState::Failed && state.state != TaskState::Skipped {
                state.state = TaskState::Succeeded;
            }
        }
    }

    // Step 3: snapshot outputs for inspection.
    state.outputs_json = template::summarize_values(&state.output_values);

    state.state.is_satisfied()
}

/// All dependencies Succeeded or Skipped.
fn dependencies_satisfied(run: &WorkflowRun, task: &TaskDef) -> bool {
    for dependency in &task.depends_on {
        let Some(dependency_state) = run.task_states.get(dependency) else {
            tracing::error!(
                task = task.id.as_str(),
                dependency = dependency.as_str(),
                "task depends on unknown task"
            );
            return false;
        };
        if !dependency_state.state.is_satisfied() {
            return false;
        }
    }
    true
}

// ---------------------------------------------------------------------------
// Freshness path resolution
// ---------------------------------------------------------------------------

/// Template-resolve a task's `file_inputs` / `file_outputs` for freshness.
///
/// Input-slot resolution is only attempted when a path template actually
/// references `${inputs.`; tasks with literal paths must stay checkable even
/// when their logical inputs cannot resolve yet. Output values are taken
/// from the task's own recorded state when present.
fn resolve_freshness_paths(
    definition: &WorkflowDefinition,
    run: &WorkflowRun,
    task: &TaskDef,
    task_id: &str,
) -> Option<ResolvedPaths> {
    let needs_input_resolution = task
        .file_inputs
        .iter()
        .chain(task.file_outputs.iter())
        .any(|t| t.contains("${inputs."));

    let input_values = if needs_input_resolution {
        dataflow::resolve_inputs_for_task(definition, run, task, task_id).ok()?
    } else {
        BTreeMap::new()
    };

    let output_values = run
        .task_states
        .get(task_id)
        .map(|s| s.output_values.clone())
        .unwrap_or_default();

    let inputs = template::resolve_path_list(&task.file_inputs, &input_values, &output_values)?;
    let outputs = template::resolve_path_list(&task.file_outputs, &input_values, &output_values)?;

    Some(ResolvedPaths { inputs, outputs })
}

/// Populate a skipped task's `output_values` so downstream dataflow still
/// resolves, per the deterministic slot/path pairing rule.
fn populate_skipped_outputs(task: &TaskDef, paths: &ResolvedPaths, state: &mut TaskInstanceState) {
    let derived = template::derive_output_values(&task.outputs, &paths.outputs);
    if derived.is_empty() {
        return;
    }
    state.output_values = derived;
    state.outputs_json = template::summarize_values(&state.output_values);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn generate_run_id(definition: &WorkflowDefinition) -> String {
    format!("{}_{}", definition.id, chrono::Utc::now().timestamp())
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
