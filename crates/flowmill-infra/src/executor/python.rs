//! Python task executor.
//!
//! Runs `params.script` (a `scripts/`-relative path) through the
//! configured interpreter with the same argument pipeline as the shell
//! executor: default input/output macros, strict template expansion, and
//! the per-argument safety check.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;

use flowmill_core::executor::{args, ExecutionOutcome, TaskExecutor};
use flowmill_types::workflow::{TaskDef, TaskInstanceState, WorkflowDefinition, WorkflowRun};

/// Executor for `python` tasks.
#[derive(Debug, Clone)]
pub struct PythonTaskExecutor {
    interpreter: String,
    working_dir: Option<PathBuf>,
}

impl Default for PythonTaskExecutor {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            working_dir: None,
        }
    }
}

impl PythonTaskExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the interpreter binary (tests, virtualenvs).
    pub fn with_interpreter(interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            working_dir: None,
        }
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn parse_params(params: &str) -> Result<(String, Vec<String>), String> {
        if params.is_empty() {
            return Err("missing params JSON".to_string());
        }

        let root: Value =
            serde_json::from_str(params).map_err(|_| "invalid params JSON".to_string())?;

        let script = match root.get("script") {
            Some(Value::String(script)) => script.clone(),
            Some(_) => return Err("invalid 'script' field".to_string()),
            None => return Err("missing 'script' field".to_string()),
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

        Ok((script, raw_args))
    }
}

#[async_trait]
impl TaskExecutor for PythonTaskExecutor {
    async fn execute(
        &self,
        _definition: &WorkflowDefinition,
        _run: &WorkflowRun,
        task: &TaskDef,
        state: &mut TaskInstanceState,
    ) -> ExecutionOutcome {
        tracing::info!(task = task.id.as_str(), "executing python task");

        let (script, mut raw_args) = match Self::parse_params(&task.params) {
            Ok(parsed) => parsed,
            Err(reason) => return ExecutionOutcome::failed(reason),
        };

        if !script.starts_with("scripts/") {
            return ExecutionOutcome::failed(
                "script path rejected (must start with 'scripts/')",
            );
        }

        args::ensure_default_io_args(&mut raw_args);

        let mut expanded_args = Vec::with_capacity(raw_args.len());
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
                expanded_args.push(expanded);
            }
        }

        // Expanded macros may join several paths into one argument; split on
        // spaces so the script sees individual argv entries.
        let argv: Vec<&str> = expanded_args
            .iter()
            .flat_map(|a| a.split(' '))
            .filter(|a| !a.is_empty())
            .collect();

        tracing::info!(
            task = task.id.as_str(),
            script = script.as_str(),
            "running python script"
        );

        let mut command = tokio::process::Command::new(&self.interpreter);
        command.arg(&script).args(&argv);
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        let status = match command.status().await {
            Ok(status) => status,
            Err(e) => {
                return ExecutionOutcome::failed(format!(
                    "failed to spawn interpreter '{}': {e}",
                    self.interpreter
                ));
            }
        };

        if !status.success() {
            return ExecutionOutcome::failed("python script returned non-zero exit status");
        }

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
    use flowmill_types::workflow::TaskKind;

    fn python_task(params: &str) -> TaskDef {
        let mut task = TaskDef::new("t", TaskKind::Python);
        task.params = params.to_string();
        task
    }

    async fn run_task(task: &TaskDef, executor: &PythonTaskExecutor) -> ExecutionOutcome {
        let definition = WorkflowDefinition::new("wf");
        let run = WorkflowRun::new("wf", "wf_1", std::iter::empty());
        let mut state = TaskInstanceState::default();
        executor.execute(&definition, &run, task, &mut state).await
    }

    #[tokio::test]
    async fn missing_script_fails() {
        let task = python_task(r#"{ "args": [] }"#);
        let outcome = run_task(&task, &PythonTaskExecutor::new()).await;
        assert_eq!(outcome, ExecutionOutcome::failed("missing 'script' field"));
    }

    #[tokio::test]
    async fn script_outside_scripts_is_rejected() {
        let task = python_task(r#"{ "script": "/usr/bin/evil.py" }"#);
        let outcome = run_task(&task, &PythonTaskExecutor::new()).await;
        assert_eq!(
            outcome,
            ExecutionOutcome::failed("script path rejected (must start with 'scripts/')")
        );
    }

    #[tokio::test]
    async fn template_failure_is_reported() {
        let task = python_task(r#"{ "script": "scripts/x.py", "args": ["${slot.gone}"] }"#);
        let outcome = run_task(&task, &PythonTaskExecutor::new()).await;
        let ExecutionOutcome::Failed { reason } = outcome else {
            panic!("expected failure");
        };
        assert!(reason.contains("Failed to expand argument template"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn runs_script_through_interpreter() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        // "Interpreter" is sh; the script copies $1 to $2.
        std::fs::write(scripts.join("copy.py"), "cp \"$1\" \"$2\"\n").unwrap();
        std::fs::write(dir.path().join("in.txt"), "data").unwrap();

        let mut task = python_task(r#"{ "script": "scripts/copy.py" }"#);
        task.file_inputs = vec!["in.txt".to_string()];
        task.file_outputs = vec!["out.txt".to_string()];

        let executor = PythonTaskExecutor::with_interpreter("sh").working_dir(dir.path());
        let outcome = run_task(&task, &executor).await;

        assert_eq!(outcome, ExecutionOutcome::Succeeded);
        assert!(dir.path().join("out.txt").exists());
    }
}
