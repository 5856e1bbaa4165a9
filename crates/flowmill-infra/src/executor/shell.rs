//! Shell task executor.
//!
//! Runs `params.command` (a `scripts/`-relative path) through the system
//! shell with template-expanded arguments. Two guards keep workflows on
//! simple, auditable commands: the script-path prefix check and a
//! per-argument character safety check. Neither is a sandbox; together
//! they make arbitrary command execution an explicit configuration error
//! instead of an accident.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use flowmill_core::executor::{args, ExecutionOutcome, TaskExecutor};
use flowmill_types::workflow::{TaskDef, TaskInstanceState, WorkflowDefinition, WorkflowRun};

/// Executor for `shell` tasks.
#[derive(Debug, Clone, Default)]
pub struct ShellTaskExecutor {
    /// Working directory for spawned commands; inherits the process CWD
    /// when unset.
    working_dir: Option<PathBuf>,
}

impl ShellTaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run commands from `dir` instead of the process working directory.
    pub fn with_working_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: Some(dir.into()),
        }
    }

    /// Commands must live under `scripts/` to avoid arbitrary execution.
    fn validate_script_path(path: &str) -> bool {
        path.starts_with("scripts/")
    }

    /// Parse `params` into `(command, raw_args)`.
    fn parse_params(params: &str) -> Result<(String, Vec<String>), String> {
        if params.is_empty() {
            return Err("missing params JSON".to_string());
        }

        let root: Value =
            serde_json::from_str(params).map_err(|_| "invalid params JSON".to_string())?;

        let command = match root.get("command") {
            Some(Value::String(command)) => command.clone(),
            Some(_) => return Err("invalid 'command' field".to_string()),
            None => return Err("missing 'command' field".to_string()),
        };

        let mut raw_args = Vec::new();
        if let Some(args_value) = root.get("args") {
            let Value::Array(entries) = args_value else {
                return Err("'args' must be an array if present".to_string());
            };
            for entry in entries {
                let Value::String(arg) = entry else {
                    return Err("non-string value in 'args' array".to_string());
                };
                raw_args.push(arg.clone());
            }
        }

        Ok((command, raw_args))
    }
}

#[async_trait]
impl TaskExecutor for ShellTaskExecutor {
    async fn execute(
        &self,
        _definition: &WorkflowDefinition,
        _run: &WorkflowRun,
        task: &TaskDef,
        state: &mut TaskInstanceState,
    ) -> ExecutionOutcome {
        tracing::info!(task = task.id.as_str(), "executing shell task");

        // 1) Params.
        let (command, mut raw_args) = match Self::parse_params(&task.params) {
            Ok(parsed) => parsed,
            Err(reason) => return ExecutionOutcome::failed(reason),
        };

        // 2) Script-path guard.
        if !Self::validate_script_path(&command) {
            return ExecutionOutcome::failed(
                "script path rejected (must start with 'scripts/')",
            );
        }

        // 3) Default input/output macros when none are present.
        args::ensure_default_io_args(&mut raw_args);

        // 4) Strict expansion and safety check per argument. Arguments that
        //    expand to nothing are dropped.
        let mut argument_list = vec![command];
        for raw in &raw_args {
            let expanded = match args::expand_arg_template(raw, task, state) {
                Ok(expanded) => expanded,
                Err(reason) => {
                    return ExecutionOutcome::failed(format!(
                        "Failed to expand argument template '{raw}': {reason}"
                    ));
                }
            };

            if !args::is_safe_argument(&expanded) {
                return ExecutionOutcome::failed(
                    "argument contains unsupported characters (safety check failed)",
                );
            }

            if !expanded.is_empty() {
                argument_list.push(expanded);
            }
        }

        // 5) Single shell line, run synchronously.
        let full_command = args::join_command(&argument_list);
        tracing::info!(task = task.id.as_str(), command = full_command.as_str(), "running shell command");

        let mut command = tokio::process::Command::new("sh");
        command.arg("-c").arg(&full_command);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let status = match command.status().await {
            Ok(status) => status,
            Err(e) => {
                return ExecutionOutcome::failed(format!("failed to spawn shell: {e}"));
            }
        };

        if !status.success() {
            return ExecutionOutcome::failed("shell command returned non-zero exit status");
        }

        // 6) Logical outputs for downstream dataflow.
        state.output_values = args::derive_task_outputs(task, state);
        ExecutionOutcome::Succeeded
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use flowmill_types::workflow::{SlotDef, TaskKind};

    fn context() -> (WorkflowDefinition, WorkflowRun) {
        (
            WorkflowDefinition::new("wf"),
            WorkflowRun::new("wf", "wf_1", std::iter::empty()),
        )
    }

    fn shell_task(params: &str) -> TaskDef {
        let mut task = TaskDef::new("t", TaskKind::Shell);
        task.params = params.to_string();
        task
    }

    async fn run_task(task: &TaskDef, executor: &ShellTaskExecutor) -> (ExecutionOutcome, TaskInstanceState) {
        let (definition, run) = context();
        let mut state = TaskInstanceState::default();
        let outcome = executor.execute(&definition, &run, task, &mut state).await;
        (outcome, state)
    }

    // -----------------------------------------------------------------------
    // Param validation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn missing_params_fails() {
        let task = shell_task("");
        let (outcome, _) = run_task(&task, &ShellTaskExecutor::new()).await;
        assert_eq!(outcome, ExecutionOutcome::failed("missing params JSON"));
    }

    #[tokio::test]
    async fn invalid_params_json_fails() {
        let task = shell_task("{ nope");
        let (outcome, _) = run_task(&task, &ShellTaskExecutor::new()).await;
        assert_eq!(outcome, ExecutionOutcome::failed("invalid params JSON"));
    }

    #[tokio::test]
    async fn missing_command_fails() {
        let task = shell_task(r#"{ "args": [] }"#);
        let (outcome, _) = run_task(&task, &ShellTaskExecutor::new()).await;
        assert_eq!(outcome, ExecutionOutcome::failed("missing 'command' field"));
    }

    #[tokio::test]
    async fn non_string_args_entry_fails() {
        let task = shell_task(r#"{ "command": "scripts/x", "args": [1] }"#);
        let (outcome, _) = run_task(&task, &ShellTaskExecutor::new()).await;
        assert_eq!(
            outcome,
            ExecutionOutcome::failed("non-string value in 'args' array")
        );
    }

    // -----------------------------------------------------------------------
    // Guards
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn command_outside_scripts_is_rejected() {
        for command in ["/bin/rm", "rm", "../scripts/x", "tools/x.sh"] {
            let task = shell_task(&format!(r#"{{ "command": "{command}" }}"#));
            let (outcome, _) = run_task(&task, &ShellTaskExecutor::new()).await;
            assert_eq!(
                outcome,
                ExecutionOutcome::failed("script path rejected (must start with 'scripts/')"),
                "command {command:?} should be rejected"
            );
        }
    }

    #[tokio::test]
    async fn template_expansion_failure_names_the_argument() {
        let task = shell_task(r#"{ "command": "scripts/x", "args": ["${slot.missing}"] }"#);
        let (outcome, _) = run_task(&task, &ShellTaskExecutor::new()).await;
        let ExecutionOutcome::Failed { reason } = outcome else {
            panic!("expected failure");
        };
        assert!(reason.contains("Failed to expand argument template"), "got: {reason}");
        assert!(reason.contains("${slot.missing}"));
    }

    #[tokio::test]
    async fn unsafe_expanded_argument_is_rejected() {
        let mut task = shell_task(r#"{ "command": "scripts/x", "args": ["${slot.evil}"] }"#);
        task.inputs.insert("evil".to_string(), SlotDef::default());

        let (definition, run) = context();
        let mut state = TaskInstanceState::default();
        state
            .input_values
            .insert("evil".to_string(), "a; rm -rf /".to_string());

        let outcome = ShellTaskExecutor::new()
            .execute(&definition, &run, &task, &mut state)
            .await;
        assert_eq!(
            outcome,
            ExecutionOutcome::failed("argument contains unsupported characters (safety check failed)")
        );
    }

    #[tokio::test]
    async fn expansion_failure_fails_the_whole_run() {
        use flowmill_core::executor::ExecutorRegistry;
        use flowmill_core::{WorkflowOrchestrator, WorkflowRegistry};
        use flowmill_types::workflow::{RunState, TaskState};
        use std::sync::Arc;

        let mut definition = WorkflowDefinition::new("wf");
        let mut task = TaskDef::new("broken", TaskKind::Shell);
        task.params = r#"{ "command": "scripts/x", "args": ["${slot.missing}"] }"#.to_string();
        definition.tasks.insert("broken".to_string(), task);

        let mut registry = WorkflowRegistry::new();
        registry.insert(definition);
        assert!(registry.validate_all());

        let mut executors = ExecutorRegistry::new();
        executors.register(TaskKind::Shell, Arc::new(ShellTaskExecutor::new()));
        let orchestrator =
            WorkflowOrchestrator::new(Arc::new(registry), Arc::new(executors));

        assert!(!orchestrator.run_once("wf", None).await);

        let run = orchestrator.last_run("wf").unwrap();
        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.task_states["broken"].state, TaskState::Failed);
        assert!(
            run.task_states["broken"]
                .last_error
                .contains("Failed to expand argument template")
        );
    }

    // -----------------------------------------------------------------------
    // Invocation
    // -----------------------------------------------------------------------

    #[cfg(unix)]
    fn install_script(dir: &std::path::Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;
        let scripts = dir.join("scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        let path = scripts.join(name);
        std::fs::write(&path, body).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_command_derives_outputs() {
        let dir = tempfile::tempdir().unwrap();
        // The script receives "<inputs> <outputs>" by the default macro rule
        // and copies the first argument to the second.
        install_script(dir.path(), "copy.sh", "#!/bin/sh\ncp \"$1\" \"$2\"\n");

        std::fs::write(dir.path().join("in.txt"), "payload").unwrap();

        let mut task = shell_task(r#"{ "command": "scripts/copy.sh" }"#);
        task.file_inputs = vec!["in.txt".to_string()];
        task.file_outputs = vec!["out.txt".to_string()];
        task.outputs.insert(
            "result".to_string(),
            SlotDef {
                slot_type: "string".to_string(),
                required: false,
            },
        );

        let executor = ShellTaskExecutor::with_working_dir(dir.path());
        let (outcome, state) = run_task(&task, &executor).await;

        assert_eq!(outcome, ExecutionOutcome::Succeeded);
        assert!(dir.path().join("out.txt").exists());
        assert_eq!(state.output_values["result"], "out.txt");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_fails_the_task() {
        let dir = tempfile::tempdir().unwrap();
        install_script(dir.path(), "fail.sh", "#!/bin/sh\nexit 3\n");

        let task = shell_task(r#"{ "command": "scripts/fail.sh" }"#);
        let executor = ShellTaskExecutor::with_working_dir(dir.path());
        let (outcome, _) = run_task(&task, &executor).await;

        assert_eq!(
            outcome,
            ExecutionOutcome::failed("shell command returned non-zero exit status")
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn default_macros_pass_inputs_then_outputs() {
        let dir = tempfile::tempdir().unwrap();
        // Record the argv the script actually saw.
        install_script(
            dir.path(),
            "record.sh",
            "#!/bin/sh\necho \"$@\" > argv.txt\n",
        );

        let mut task = shell_task(r#"{ "command": "scripts/record.sh" }"#);
        task.file_inputs = vec!["a.c".to_string(), "b.c".to_string()];
        task.file_outputs = vec!["a.o".to_string()];

        let executor = ShellTaskExecutor::with_working_dir(dir.path());
        let (outcome, _) = run_task(&task, &executor).await;
        assert_eq!(outcome, ExecutionOutcome::Succeeded);

        let argv = std::fs::read_to_string(dir.path().join("argv.txt")).unwrap();
        assert_eq!(argv.trim(), "a.c b.c a.o");
    }
}
