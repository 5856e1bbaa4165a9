//! Workflow registry: loaded definitions, duplicate handling, and total
//! validation.
//!
//! The registry owns every `WorkflowDefinition`. Loading walks the
//! immediate children of a directory for `*.jcwf` files; a file that fails
//! to parse is refused on its own while the others load normally.
//! Redefinition of an id logs a warning and overwrites.
//!
//! `validate_all` is total: every failure across every workflow is reported
//! and logged, none is fatal at load time. Definitions that failed
//! validation stay in the registry (so they remain inspectable) but the
//! orchestrator refuses to run them.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use flowmill_types::workflow::{TaskDef, TriggerType, WorkflowDefinition};

use crate::error::WorkflowError;
use crate::workflow::{dag, parser};

/// Holds all loaded workflow definitions, keyed by workflow id.
#[derive(Default)]
pub struct WorkflowRegistry {
    workflows: HashMap<String, Arc<WorkflowDefinition>>,
    invalid: HashSet<String>,
}

impl WorkflowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Loading
    // -----------------------------------------------------------------------

    /// Load every `*.jcwf` file among the immediate children of `dir`.
    ///
    /// A file that fails to parse is logged and skipped; other workflows
    /// load normally. Returns the number of workflows registered.
    pub fn load_directory(&mut self, dir: &Path) -> Result<usize, WorkflowError> {
        tracing::info!(dir = %dir.display(), "scanning workflows folder");

        let mut loaded = 0;
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_file() || path.extension().is_none_or(|ext| ext != "jcwf") {
                continue;
            }

            match self.load_file(&path) {
                Ok(id) => {
                    tracing::info!(workflow = id.as_str(), file = %path.display(), "registered workflow");
                    loaded += 1;
                }
                Err(e) => {
                    tracing::error!(file = %path.display(), error = %e, "failed to load workflow file");
                }
            }
        }

        Ok(loaded)
    }

    /// Load or reload a single JCWF file, returning the workflow id.
    pub fn load_file(&mut self, path: &Path) -> Result<String, WorkflowError> {
        let content = std::fs::read_to_string(path)?;
        let definition = parser::parse_workflow_json(&content)?;

        if self.workflows.contains_key(&definition.id) {
            tracing::warn!(workflow = definition.id.as_str(), "workflow already exists; reloading");
            self.invalid.remove(&definition.id);
        }

        let id = definition.id.clone();
        self.workflows.insert(id.clone(), Arc::new(definition));
        Ok(id)
    }

    /// Register an in-memory definition directly (tests, programmatic use).
    pub fn insert(&mut self, definition: WorkflowDefinition) {
        if self.workflows.contains_key(&definition.id) {
            tracing::warn!(workflow = definition.id.as_str(), "workflow already exists; reloading");
            self.invalid.remove(&definition.id);
        }
        self.workflows
            .insert(definition.id.clone(), Arc::new(definition));
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    pub fn has(&self, workflow_id: &str) -> bool {
        self.workflows.contains_key(workflow_id)
    }

    pub fn get(&self, workflow_id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.get(workflow_id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workflows.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// True when the workflow is present and passed its last validation.
    pub fn is_valid(&self, workflow_id: &str) -> bool {
        self.workflows.contains_key(workflow_id) && !self.invalid.contains(workflow_id)
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Validate every loaded workflow, logging all failures. Returns true
    /// when everything passed.
    pub fn validate_all(&mut self) -> bool {
        let mut all_ok = true;
        let mut invalid = HashSet::new();

        for (id, definition) in &self.workflows {
            tracing::info!(workflow = id.as_str(), "validating workflow");
            let errors = validate_workflow(definition);
            if !errors.is_empty() {
                for error in &errors {
                    tracing::error!(workflow = id.as_str(), error = %error, "workflow validation failed");
                }
                invalid.insert(id.clone());
                all_ok = false;
            }
        }

        self.invalid = invalid;
        all_ok
    }
}

/// Run every per-workflow check and collect all failures.
pub fn validate_workflow(definition: &WorkflowDefinition) -> Vec<WorkflowError> {
    let mut errors = Vec::new();

    validate_triggers(definition, &mut errors);
    validate_tasks(definition, &mut errors);
    validate_dataflow(definition, &mut errors);

    if let Err(e) = dag::validate_task_graph(&definition.tasks) {
        errors.push(e);
    }

    errors
}

fn validate_triggers(definition: &WorkflowDefinition, errors: &mut Vec<WorkflowError>) {
    let mut seen = HashSet::new();

    for trigger in &definition.triggers {
        if !seen.insert(trigger.id.as_str()) {
            errors.push(WorkflowError::Validation(format!(
                "trigger id '{}' is duplicated",
                trigger.id
            )));
        }

        if trigger.trigger_type == TriggerType::Unknown {
            errors.push(WorkflowError::Validation(format!(
                "trigger '{}' has unknown type",
                trigger.id
            )));
        }

        if trigger.trigger_type == TriggerType::Cron && trigger.params.is_empty() {
            errors.push(WorkflowError::Validation(format!(
                "cron trigger '{}' is missing parameters",
                trigger.id
            )));
        }
    }
}

fn validate_tasks(definition: &WorkflowDefinition, errors: &mut Vec<WorkflowError>) {
    for (task_id, task) in &definition.tasks {
        for dependency in &task.depends_on {
            if !definition.tasks.contains_key(dependency) {
                errors.push(WorkflowError::UnknownDependency(format!(
                    "task '{task_id}' depends on unknown task '{dependency}'"
                )));
            }
        }

        validate_task_io(task_id, task, errors);
    }
}

fn validate_task_io(task_id: &str, task: &TaskDef, errors: &mut Vec<WorkflowError>) {
    for (input_name, slot) in &task.inputs {
        if slot.required && slot.slot_type.is_empty() {
            errors.push(WorkflowError::Validation(format!(
                "task '{task_id}' input '{input_name}' is required but has no type"
            )));
        }
    }

    for (output_name, slot) in &task.outputs {
        if slot.slot_type.is_empty() {
            errors.push(WorkflowError::Validation(format!(
                "task '{task_id}' output '{output_name}' is missing a type"
            )));
        }
    }
}

fn validate_dataflow(definition: &WorkflowDefinition, errors: &mut Vec<WorkflowError>) {
    for edge in &definition.dataflow {
        let from_task = definition.tasks.get(&edge.from_task);
        let to_task = definition.tasks.get(&edge.to_task);

        if from_task.is_none() {
            errors.push(WorkflowError::Validation(format!(
                "dataflow references unknown from_task '{}'",
                edge.from_task
            )));
        }
        if to_task.is_none() {
            errors.push(WorkflowError::Validation(format!(
                "dataflow references unknown to_task '{}'",
                edge.to_task
            )));
        }

        if !edge.from_output.is_empty()
            && let Some(task) = from_task
            && !task.outputs.contains_key(&edge.from_output)
        {
            errors.push(WorkflowError::Validation(format!(
                "dataflow: from_task '{}' has no output slot '{}'",
                edge.from_task, edge.from_output
            )));
        }

        if !edge.to_input.is_empty()
            && let Some(task) = to_task
            && !task.inputs.contains_key(&edge.to_input)
        {
            errors.push(WorkflowError::Validation(format!(
                "dataflow: to_task '{}' has no input slot '{}'",
                edge.to_task, edge.to_input
            )));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
