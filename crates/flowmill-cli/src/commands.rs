//! One-shot CLI command handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use console::style;

use flowmill_core::executor::internal::InternalTaskExecutor;
use flowmill_core::executor::ExecutorRegistry;
use flowmill_core::workflow::{parser, registry};
use flowmill_core::{WorkflowOrchestrator, WorkflowRegistry};
use flowmill_infra::config;
use flowmill_infra::executor::{PythonTaskExecutor, ShellTaskExecutor};
use flowmill_types::config::EngineConfig;
use flowmill_types::workflow::TaskKind;

/// Load the engine config and run the startup checks.
pub fn load_checked_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let mut config = config::load_config(path)
        .with_context(|| format!("cannot load config '{}'", path.display()))?;
    config::check_config(&mut config)?;
    Ok(config)
}

fn build_orchestrator(config: &EngineConfig) -> anyhow::Result<(Arc<WorkflowRegistry>, WorkflowOrchestrator)> {
    let mut registry = WorkflowRegistry::new();
    registry.load_directory(&config.workflows_folder)?;
    registry.validate_all();
    let registry = Arc::new(registry);

    let mut executors = ExecutorRegistry::new();
    executors.register(TaskKind::Shell, Arc::new(ShellTaskExecutor::new()));
    executors.register(TaskKind::Python, Arc::new(PythonTaskExecutor::new()));
    executors.register(TaskKind::Internal, Arc::new(InternalTaskExecutor::new()));

    let orchestrator = WorkflowOrchestrator::new(Arc::clone(&registry), Arc::new(executors));
    Ok((registry, orchestrator))
}

/// `flowmill run` -- activate one workflow and print the recorded run.
pub async fn run_workflow(
    config: EngineConfig,
    workflow_id: &str,
    run_id: Option<&str>,
    json: bool,
) -> anyhow::Result<bool> {
    let (_registry, orchestrator) = build_orchestrator(&config)?;

    let ok = orchestrator.run_once(workflow_id, run_id).await;
    let Some(run) = orchestrator.last_run(workflow_id) else {
        anyhow::bail!("workflow '{workflow_id}' produced no run (unknown or invalid)");
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
        return Ok(ok);
    }

    println!();
    println!(
        "  Run {} of '{}': {}",
        style(&run.run_id).dim(),
        style(workflow_id).cyan(),
        if ok {
            style("succeeded").green()
        } else {
            style("failed").red()
        }
    );
    for (task_id, state) in &run.task_states {
        let mark = match state.state {
            flowmill_types::workflow::TaskState::Succeeded => style("✓").green(),
            flowmill_types::workflow::TaskState::Skipped => style("≡").yellow(),
            flowmill_types::workflow::TaskState::Failed => style("✗").red(),
            _ => style("…").dim(),
        };
        let mut line = format!("  {mark} {task_id}");
        if !state.last_error.is_empty() {
            line.push_str(&format!("  ({})", state.last_error));
        }
        println!("{line}");
    }
    println!();

    Ok(ok)
}

/// `flowmill validate` -- parse and validate one JCWF file.
pub fn validate_file(path: &Path, json: bool) -> anyhow::Result<bool> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file '{}'", path.display()))?;

    let result = parser::parse_workflow_json(&content)
        .map(|definition| (registry::validate_workflow(&definition), definition));

    match result {
        Ok((errors, definition)) if errors.is_empty() => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "workflow": definition.id, "valid": true })
                );
            } else {
                println!(
                    "  {} workflow '{}' is valid ({} tasks, {} triggers)",
                    style("✓").green(),
                    style(&definition.id).cyan(),
                    definition.tasks.len(),
                    definition.triggers.len()
                );
            }
            Ok(true)
        }
        Ok((errors, definition)) => {
            if json {
                let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                println!(
                    "{}",
                    serde_json::json!({ "workflow": definition.id, "valid": false, "errors": messages })
                );
            } else {
                eprintln!(
                    "  {} workflow '{}' failed validation:",
                    style("✗").red(),
                    definition.id
                );
                for error in &errors {
                    eprintln!("    - {error}");
                }
            }
            Ok(false)
        }
        Err(e) => {
            if json {
                println!("{}", serde_json::json!({ "valid": false, "errors": [e.to_string()] }));
            } else {
                eprintln!("  {} {}", style("✗").red(), e);
            }
            Ok(false)
        }
    }
}

/// `flowmill list` -- workflows in the configured folder.
pub fn list_workflows(config: &EngineConfig, json: bool) -> anyhow::Result<()> {
    let mut registry = WorkflowRegistry::new();
    registry.load_directory(&config.workflows_folder)?;
    let all_valid = registry.validate_all();

    if json {
        let entries: Vec<serde_json::Value> = registry
            .ids()
            .into_iter()
            .map(|id| {
                serde_json::json!({
                    "id": id,
                    "valid": registry.is_valid(&id),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if registry.ids().is_empty() {
        println!("  no workflows found in '{}'", config.workflows_folder.display());
        return Ok(());
    }

    for id in registry.ids() {
        let Some(definition) = registry.get(&id) else {
            continue;
        };
        let mark = if registry.is_valid(&id) {
            style("✓").green()
        } else {
            style("✗").red()
        };
        let label = if definition.label.is_empty() {
            String::new()
        } else {
            format!("  -- {}", definition.label)
        };
        println!("  {mark} {}{label}", style(&id).cyan());
    }

    if !all_valid {
        eprintln!("  {}", style("some workflows failed validation").yellow());
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
