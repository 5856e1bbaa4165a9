//! Workflow domain types for flowmill.
//!
//! Defines the canonical in-memory representation of a JCWF document
//! (`WorkflowDefinition` and its parts) plus the runtime execution tracking
//! types (`WorkflowRun`, `TaskInstanceState`). The JCWF parser in
//! `flowmill-core` produces these; the orchestrator and trigger binder
//! consume them.
//!
//! Engine-private sub-documents (`params`, `defaults`, trigger `params`,
//! environment variable values) are carried as opaque raw-JSON strings so
//! that this crate never needs to know every executor's schema. Consumers
//! parse them on demand.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Trigger model
// ---------------------------------------------------------------------------

/// The kind of a workflow trigger.
///
/// `Unknown` is produced by the parser for unrecognized `type` strings and
/// is rejected by the validator. `Structure` is documentary only; it never
/// registers a runtime trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Unknown,
    Auto,
    Cron,
    FileWatch,
    Structure,
    Manual,
}

impl TriggerType {
    /// Parse a JCWF `type` keyword. Returns `None` for unknown strings so
    /// the caller can decide how loudly to complain.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "auto" => Some(Self::Auto),
            "cron" => Some(Self::Cron),
            "file_watch" => Some(Self::FileWatch),
            "structure" => Some(Self::Structure),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }

    /// The JCWF keyword for this trigger type.
    pub fn as_keyword(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Auto => "auto",
            Self::Cron => "cron",
            Self::FileWatch => "file_watch",
            Self::Structure => "structure",
            Self::Manual => "manual",
        }
    }
}

/// A single trigger record from a workflow definition.
///
/// Type-specific settings (cron expression, watched path, events, debounce)
/// live in the opaque `params` JSON and are parsed by the trigger binder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerDef {
    pub trigger_type: TriggerType,
    /// Trigger id, unique within its workflow.
    pub id: String,
    pub enabled: bool,
    /// Raw JSON blob of the trigger's `params` object (may be empty).
    pub params: String,
}

// ---------------------------------------------------------------------------
// Task model
// ---------------------------------------------------------------------------

/// The kind of a task, selecting which executor runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Python,
    Shell,
    AiCall,
    Internal,
}

impl TaskKind {
    /// Parse a JCWF `type` keyword. Returns `None` for unknown strings.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "python" => Some(Self::Python),
            "shell" => Some(Self::Shell),
            "ai_call" => Some(Self::AiCall),
            "internal" => Some(Self::Internal),
            _ => None,
        }
    }

    /// The JCWF keyword for this task kind.
    pub fn as_keyword(&self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Shell => "shell",
            Self::AiCall => "ai_call",
            Self::Internal => "internal",
        }
    }
}

/// Whether a task runs once or per item of an expanded collection.
///
/// Per-item expansion is carried through the schema but not scheduled by the
/// current orchestrator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    #[default]
    Single,
    PerItem,
}

impl TaskMode {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "single" => Some(Self::Single),
            "per_item" => Some(Self::PerItem),
            _ => None,
        }
    }

    pub fn as_keyword(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::PerItem => "per_item",
        }
    }
}

/// A declared logical input or output slot on a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlotDef {
    /// Advisory type (string, object, json, ...) -- matches JCWF `type`.
    pub slot_type: String,
    pub required: bool,
}

/// Declared slots keyed by slot name. `BTreeMap` keeps iteration order
/// deterministic, which the skip-population rule relies on.
pub type SlotMap = BTreeMap<String, SlotDef>;

/// Execution environment settings for a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskEnvironment {
    /// Logical name for this environment (optional).
    pub name: String,
    /// For ai_call tasks in assistant mode: JCWF `assistant_id`.
    pub assistant_id: String,
    /// Environment variables; values are raw JSON strings.
    pub variables: BTreeMap<String, String>,
}

/// Queue file bindings for a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueBinding {
    /// STNG_* files (settings / tone).
    pub stng_files: Vec<String>,
    /// TASK_* files (instructions).
    pub task_files: Vec<String>,
    /// CNXT_* files (context).
    pub cnxt_files: Vec<String>,
}

/// Retry configuration. Carried through the data model; executors may honor
/// it later.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_ms: u32,
}

/// Static definition of a single task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDef {
    /// Task id. When the JCWF entry omits `id`, the map key is used.
    pub id: String,
    pub kind: TaskKind,
    pub mode: TaskMode,
    pub label: String,
    pub doc: String,
    /// Ids of tasks that must reach a terminal success state first.
    pub depends_on: Vec<String>,
    /// File path templates consumed by this task (declaration order).
    pub file_inputs: Vec<String>,
    /// File path templates produced by this task (declaration order).
    pub file_outputs: Vec<String>,
    pub environment: TaskEnvironment,
    pub queue_binding: QueueBinding,
    /// Declared logical input slots.
    pub inputs: SlotMap,
    /// Declared logical output slots.
    pub outputs: SlotMap,
    pub timeout_ms: u64,
    pub retry: RetryPolicy,
    /// Raw JSON blob of the task's `params` object (may be empty).
    pub params: String,
}

impl TaskDef {
    /// A blank task of the given kind, for programmatic construction.
    pub fn new(id: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            kind,
            mode: TaskMode::Single,
            label: String::new(),
            doc: String::new(),
            depends_on: Vec::new(),
            file_inputs: Vec::new(),
            file_outputs: Vec::new(),
            environment: TaskEnvironment::default(),
            queue_binding: QueueBinding::default(),
            inputs: SlotMap::new(),
            outputs: SlotMap::new(),
            timeout_ms: 0,
            retry: RetryPolicy::default(),
            params: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Dataflow edges
// ---------------------------------------------------------------------------

/// A named channel from one task's output slot to another task's input slot.
///
/// Distinct from the dependency edge: `depends_on` orders execution,
/// dataflow edges carry values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataflowEdge {
    pub from_task: String,
    pub from_output: String,
    pub to_task: String,
    pub to_input: String,
    /// Optional mapping object; values are raw JSON strings.
    pub mapping: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Workflow definition
// ---------------------------------------------------------------------------

/// A complete, immutable workflow definition parsed from a JCWF document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// JCWF `version`; only `"1.0"` is accepted.
    pub version: String,
    /// Workflow id, unique within a registry.
    pub id: String,
    pub label: String,
    pub doc: String,
    pub triggers: Vec<TriggerDef>,
    /// Tasks keyed by task id.
    pub tasks: BTreeMap<String, TaskDef>,
    pub dataflow: Vec<DataflowEdge>,
    /// Raw JSON blob of the `defaults` object (may be empty).
    pub defaults: String,
}

impl WorkflowDefinition {
    /// A minimal definition, for programmatic construction in tests.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            version: "1.0".to_string(),
            id: id.into(),
            label: String::new(),
            doc: String::new(),
            triggers: Vec::new(),
            tasks: BTreeMap::new(),
            dataflow: Vec::new(),
            defaults: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Runtime state: task instances
// ---------------------------------------------------------------------------

/// Lifecycle state of a single task instance within a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Pending,
    Ready,
    Running,
    Skipped,
    Succeeded,
    Failed,
}

impl TaskState {
    /// Terminal states: the task will not transition again this run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped | Self::Failed)
    }

    /// States that count as a satisfied dependency.
    pub fn is_satisfied(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Skipped)
    }
}

/// Mutable per-task state during a workflow run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInstanceState {
    pub state: TaskState,
    /// How many attempts have been made for this instance.
    pub attempt_count: u32,
    /// Last error message, if any.
    pub last_error: String,
    /// RFC 3339 timestamps (empty when not yet set).
    pub started_at: String,
    pub completed_at: String,
    /// `key=value;` summaries of the resolved inputs / produced outputs.
    pub inputs_json: String,
    pub outputs_json: String,
    /// Resolved input values by logical slot name.
    pub input_values: BTreeMap<String, String>,
    /// Produced output values by logical slot name.
    pub output_values: BTreeMap<String, String>,
}

// ---------------------------------------------------------------------------
// Runtime state: workflow runs
// ---------------------------------------------------------------------------

/// Overall state of a workflow run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

/// A single activation of a workflow. Created by the orchestrator when a
/// trigger fires, mutated only by the owning orchestrator call, and stored
/// as the workflow's last run on completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// `<workflow_id>_<unix_seconds>` unless supplied by the caller.
    pub run_id: String,
    pub workflow_id: String,
    pub state: RunState,
    /// Shared run-level context values.
    pub context: BTreeMap<String, String>,
    /// Per-task instance state keyed by task id.
    pub task_states: BTreeMap<String, TaskInstanceState>,
    /// RFC 3339 timestamps (empty when not yet set).
    pub started_at: String,
    pub completed_at: String,
    pub completed: bool,
    pub has_failed: bool,
}

impl WorkflowRun {
    /// Create a run with every task initialized to `Pending`.
    pub fn new<'a>(
        workflow_id: impl Into<String>,
        run_id: impl Into<String>,
        task_ids: impl IntoIterator<Item = &'a String>,
    ) -> Self {
        let task_states = task_ids
            .into_iter()
            .map(|id| (id.clone(), TaskInstanceState::default()))
            .collect();

        Self {
            run_id: run_id.into(),
            workflow_id: workflow_id.into(),
            state: RunState::Pending,
            context: BTreeMap::new(),
            task_states,
            started_at: String::new(),
            completed_at: String::new(),
            completed: false,
            has_failed: false,
        }
    }

    /// True when any task is still Pending, Ready, or Running.
    pub fn has_active_tasks(&self) -> bool {
        self.task_states.values().any(|s| !s.state.is_terminal())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
