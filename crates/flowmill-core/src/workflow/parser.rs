//! JCWF document parsing and serialization.
//!
//! Converts between UTF-8 JCWF JSON and the canonical `WorkflowDefinition`.
//! The walk is explicit (no derive) because JCWF semantics do not map onto
//! plain serde: unknown keys anywhere are accepted and logged at warn,
//! engine-private sub-documents (`params`, `defaults`, trigger `params`,
//! environment variable values) are preserved as raw JSON strings, and
//! several fields fall back to defaults with a warning instead of failing.
//!
//! Parse failure returns a descriptive error and no partial state.

use std::collections::BTreeMap;

use serde_json::{Map, Value, json};

use flowmill_types::workflow::{
    DataflowEdge, QueueBinding, RetryPolicy, SlotDef, SlotMap, TaskDef, TaskEnvironment, TaskKind,
    TaskMode, TriggerDef, TriggerType, WorkflowDefinition,
};

use crate::error::WorkflowError;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Parse a JCWF document into a `WorkflowDefinition`.
///
/// Enforces the required top-level fields (`version` == "1.0", `id`,
/// `tasks`). When the document declares no `triggers` key, a synthetic
/// enabled `auto` trigger is appended.
pub fn parse_workflow_json(content: &str) -> Result<WorkflowDefinition, WorkflowError> {
    if content.is_empty() {
        return Err(WorkflowError::Parse(
            "workflow JSON content is empty".to_string(),
        ));
    }

    let root: Value = serde_json::from_str(content)
        .map_err(|e| WorkflowError::Parse(format!("failed to parse workflow JSON: {e}")))?;

    let Value::Object(root) = root else {
        return Err(WorkflowError::Parse(
            "workflow document must be a JSON object".to_string(),
        ));
    };

    parse_root_object(&root)
}

fn parse_root_object(root: &Map<String, Value>) -> Result<WorkflowDefinition, WorkflowError> {
    let mut definition = WorkflowDefinition::new(String::new());
    definition.version = String::new();

    let mut has_version = false;
    let mut has_id = false;
    let mut has_tasks = false;
    let mut has_triggers = false;

    for (key, value) in root {
        match key.as_str() {
            "version" => {
                let version = element_to_string(value)
                    .ok_or_else(|| WorkflowError::Parse("field 'version' must be string".into()))?;
                if version != "1.0" {
                    return Err(WorkflowError::Parse(format!(
                        "unsupported JCWF version: {version}"
                    )));
                }
                definition.version = version;
                has_version = true;
            }
            "id" => {
                definition.id = element_to_string(value)
                    .ok_or_else(|| WorkflowError::Parse("field 'id' must be string".into()))?;
                has_id = true;
            }
            "label" => {
                if let Some(label) = element_to_string(value) {
                    definition.label = label;
                }
            }
            "doc" => {
                if let Some(doc) = element_to_string(value) {
                    definition.doc = doc;
                }
            }
            "triggers" => {
                definition.triggers = parse_triggers(value)?;
                has_triggers = true;
            }
            "tasks" => {
                definition.tasks = parse_tasks(value)?;
                has_tasks = true;
            }
            "dataflow" => {
                definition.dataflow = parse_dataflow(value)?;
            }
            "defaults" => {
                definition.defaults = raw_json(value);
            }
            other => {
                tracing::warn!(workflow = definition.id.as_str(), key = other, "unknown field in root JCWF object");
            }
        }
    }

    if !has_version {
        return Err(WorkflowError::Parse(
            "workflow missing required field: version".to_string(),
        ));
    }
    if !has_id {
        return Err(WorkflowError::Parse(
            "workflow missing required field: id".to_string(),
        ));
    }
    if !has_tasks {
        return Err(WorkflowError::Parse(
            "workflow missing required field: tasks".to_string(),
        ));
    }

    // A document with no triggers key gets an implicit always-on auto trigger.
    if !has_triggers {
        definition.triggers.push(TriggerDef {
            trigger_type: TriggerType::Auto,
            id: "auto".to_string(),
            enabled: true,
            params: "{}".to_string(),
        });
    }

    Ok(definition)
}

// ---------------------------------------------------------------------------
// Triggers
// ---------------------------------------------------------------------------

fn parse_triggers(value: &Value) -> Result<Vec<TriggerDef>, WorkflowError> {
    let Value::Array(entries) = value else {
        return Err(WorkflowError::Parse("'triggers' must be an array".into()));
    };

    let mut triggers = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(object) = entry else {
            return Err(WorkflowError::Parse(
                "trigger entry must be an object".into(),
            ));
        };
        triggers.push(parse_trigger(object)?);
    }

    Ok(triggers)
}

fn parse_trigger(object: &Map<String, Value>) -> Result<TriggerDef, WorkflowError> {
    let mut trigger = TriggerDef {
        trigger_type: TriggerType::Unknown,
        id: String::new(),
        enabled: true,
        params: String::new(),
    };

    let mut has_type = false;
    let mut has_id = false;

    for (key, value) in object {
        match key.as_str() {
            "type" => {
                let keyword = element_to_string(value).ok_or_else(|| {
                    WorkflowError::Parse("trigger field 'type' must be string".into())
                })?;
                trigger.trigger_type = match TriggerType::from_keyword(&keyword) {
                    Some(t) => t,
                    None => {
                        tracing::warn!(keyword = keyword.as_str(), "unknown trigger type, defaulting to Unknown");
                        TriggerType::Unknown
                    }
                };
                has_type = true;
            }
            "id" => {
                trigger.id = element_to_string(value).ok_or_else(|| {
                    WorkflowError::Parse("trigger field 'id' must be string".into())
                })?;
                has_id = true;
            }
            "enabled" => {
                let Value::Bool(enabled) = value else {
                    return Err(WorkflowError::Parse(
                        "trigger field 'enabled' must be bool".into(),
                    ));
                };
                trigger.enabled = *enabled;
            }
            "params" => {
                trigger.params = raw_json(value);
            }
            other => {
                tracing::warn!(trigger = trigger.id.as_str(), key = other, "unknown field in trigger");
            }
        }
    }

    if !has_type {
        return Err(WorkflowError::Parse(
            "trigger missing required field: type".to_string(),
        ));
    }
    if !has_id {
        return Err(WorkflowError::Parse(
            "trigger missing required field: id".to_string(),
        ));
    }

    Ok(trigger)
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

fn parse_tasks(value: &Value) -> Result<BTreeMap<String, TaskDef>, WorkflowError> {
    let Value::Object(entries) = value else {
        return Err(WorkflowError::Parse("'tasks' must be an object".into()));
    };

    let mut tasks = BTreeMap::new();
    for (task_key, entry) in entries {
        let Value::Object(object) = entry else {
            return Err(WorkflowError::Parse("task entry must be an object".into()));
        };

        let mut task = parse_task(object)?;
        if task.id.is_empty() {
            // Tasks without an explicit "id" take the map key.
            task.id = task_key.clone();
        }
        tasks.insert(task_key.clone(), task);
    }

    Ok(tasks)
}

fn parse_task(object: &Map<String, Value>) -> Result<TaskDef, WorkflowError> {
    let mut task = TaskDef::new(String::new(), TaskKind::Internal);
    let mut has_type = false;

    for (key, value) in object {
        match key.as_str() {
            "id" => {
                task.id = element_to_string(value)
                    .ok_or_else(|| WorkflowError::Parse("task field 'id' must be string".into()))?;
            }
            "type" => {
                let keyword = element_to_string(value).ok_or_else(|| {
                    WorkflowError::Parse("task field 'type' must be string".into())
                })?;
                task.kind = match TaskKind::from_keyword(&keyword) {
                    Some(kind) => kind,
                    None => {
                        tracing::warn!(keyword = keyword.as_str(), "unknown task type, defaulting to Internal");
                        TaskKind::Internal
                    }
                };
                has_type = true;
            }
            "mode" => {
                let keyword = element_to_string(value).ok_or_else(|| {
                    WorkflowError::Parse("task field 'mode' must be string".into())
                })?;
                task.mode = match TaskMode::from_keyword(&keyword) {
                    Some(mode) => mode,
                    None => {
                        tracing::warn!(keyword = keyword.as_str(), "unknown task mode, defaulting to Single");
                        TaskMode::Single
                    }
                };
            }
            "label" => {
                if let Some(label) = element_to_string(value) {
                    task.label = label;
                }
            }
            "doc" => {
                if let Some(doc) = element_to_string(value) {
                    task.doc = doc;
                }
            }
            "depends_on" => {
                task.depends_on = string_array(value, "task field 'depends_on'")?;
            }
            "file_inputs" => {
                task.file_inputs = string_array(value, "task field 'file_inputs'")?;
            }
            "file_outputs" => {
                task.file_outputs = string_array(value, "task field 'file_outputs'")?;
            }
            "environment" => {
                task.environment = parse_environment(value)?;
            }
            "queue_binding" => {
                task.queue_binding = parse_queue_binding(value)?;
            }
            "inputs" => {
                task.inputs = parse_slots(value, "task.inputs")?;
            }
            "outputs" => {
                task.outputs = parse_slots(value, "task.outputs")?;
            }
            "timeout_ms" => {
                task.timeout_ms = integer_field(value, "task field 'timeout_ms'")? as u64;
            }
            "retries" => {
                task.retry = parse_retries(value)?;
            }
            "params" => {
                task.params = raw_json(value);
            }
            other => {
                tracing::warn!(task = task.id.as_str(), key = other, "unknown field in task");
            }
        }
    }

    if !has_type {
        return Err(WorkflowError::Parse(
            "task missing required field: type".to_string(),
        ));
    }

    Ok(task)
}

fn parse_slots(value: &Value, context: &str) -> Result<SlotMap, WorkflowError> {
    let Value::Object(entries) = value else {
        return Err(WorkflowError::Parse(format!("{context} must be an object")));
    };

    let mut slots = SlotMap::new();
    for (name, entry) in entries {
        let Value::Object(fields) = entry else {
            return Err(WorkflowError::Parse(format!(
                "{context} entry must be an object"
            )));
        };

        let mut slot = SlotDef::default();
        for (key, field_value) in fields {
            match key.as_str() {
                "type" => {
                    slot.slot_type = element_to_string(field_value).ok_or_else(|| {
                        WorkflowError::Parse(format!("{context} field 'type' must be string"))
                    })?;
                }
                "required" => {
                    let Value::Bool(required) = field_value else {
                        return Err(WorkflowError::Parse(format!(
                            "{context} field 'required' must be bool"
                        )));
                    };
                    slot.required = *required;
                }
                other => {
                    tracing::warn!(slot = name.as_str(), key = other, "unknown field in slot definition");
                }
            }
        }

        slots.insert(name.clone(), slot);
    }

    Ok(slots)
}

fn parse_environment(value: &Value) -> Result<TaskEnvironment, WorkflowError> {
    let Value::Object(fields) = value else {
        return Err(WorkflowError::Parse(
            "task.environment must be an object".into(),
        ));
    };

    let mut environment = TaskEnvironment::default();
    for (key, field_value) in fields {
        match key.as_str() {
            "name" => {
                if let Some(name) = element_to_string(field_value) {
                    environment.name = name;
                }
            }
            "assistant_id" => {
                if let Some(assistant_id) = element_to_string(field_value) {
                    environment.assistant_id = assistant_id;
                }
            }
            "variables" => {
                let Value::Object(variables) = field_value else {
                    return Err(WorkflowError::Parse(
                        "task.environment.variables must be an object".into(),
                    ));
                };
                for (variable_key, variable_value) in variables {
                    environment
                        .variables
                        .insert(variable_key.clone(), raw_json(variable_value));
                }
            }
            other => {
                tracing::warn!(key = other, "unknown field in task environment");
            }
        }
    }

    Ok(environment)
}

fn parse_queue_binding(value: &Value) -> Result<QueueBinding, WorkflowError> {
    let Value::Object(fields) = value else {
        return Err(WorkflowError::Parse(
            "task.queue_binding must be an object".into(),
        ));
    };

    let mut binding = QueueBinding::default();
    for (key, field_value) in fields {
        match key.as_str() {
            "stng_files" => {
                binding.stng_files = string_array(field_value, "queue_binding.stng_files")?;
            }
            "task_files" => {
                binding.task_files = string_array(field_value, "queue_binding.task_files")?;
            }
            "cnxt_files" => {
                binding.cnxt_files = string_array(field_value, "queue_binding.cnxt_files")?;
            }
            other => {
                tracing::warn!(key = other, "unknown field in queue_binding");
            }
        }
    }

    Ok(binding)
}

fn parse_retries(value: &Value) -> Result<RetryPolicy, WorkflowError> {
    let Value::Object(fields) = value else {
        return Err(WorkflowError::Parse(
            "task field 'retries' must be object".into(),
        ));
    };

    let mut retry = RetryPolicy::default();
    for (key, field_value) in fields {
        match key.as_str() {
            "max_attempts" => {
                retry.max_attempts = integer_field(field_value, "retries field 'max_attempts'")? as u32;
            }
            "backoff_ms" => {
                retry.backoff_ms = integer_field(field_value, "retries field 'backoff_ms'")? as u32;
            }
            other => {
                tracing::warn!(key = other, "unknown field in retries");
            }
        }
    }

    Ok(retry)
}

// ---------------------------------------------------------------------------
// Dataflow
// ---------------------------------------------------------------------------

fn parse_dataflow(value: &Value) -> Result<Vec<DataflowEdge>, WorkflowError> {
    let Value::Array(entries) = value else {
        return Err(WorkflowError::Parse("'dataflow' must be an array".into()));
    };

    let mut edges = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::Object(object) = entry else {
            return Err(WorkflowError::Parse(
                "dataflow entry must be an object".into(),
            ));
        };
        edges.push(parse_dataflow_edge(object)?);
    }

    Ok(edges)
}

fn parse_dataflow_edge(object: &Map<String, Value>) -> Result<DataflowEdge, WorkflowError> {
    let mut edge = DataflowEdge {
        from_task: String::new(),
        from_output: String::new(),
        to_task: String::new(),
        to_input: String::new(),
        mapping: BTreeMap::new(),
    };

    for (key, value) in object {
        match key.as_str() {
            "from_task" => {
                edge.from_task = element_to_string(value).ok_or_else(|| {
                    WorkflowError::Parse("dataflow field 'from_task' must be string".into())
                })?;
            }
            "from_output" => {
                edge.from_output = element_to_string(value).ok_or_else(|| {
                    WorkflowError::Parse("dataflow field 'from_output' must be string".into())
                })?;
            }
            "to_task" => {
                edge.to_task = element_to_string(value).ok_or_else(|| {
                    WorkflowError::Parse("dataflow field 'to_task' must be string".into())
                })?;
            }
            "to_input" => {
                edge.to_input = element_to_string(value).ok_or_else(|| {
                    WorkflowError::Parse("dataflow field 'to_input' must be string".into())
                })?;
            }
            "mapping" => {
                let Value::Object(mapping) = value else {
                    return Err(WorkflowError::Parse(
                        "dataflow.mapping must be an object".into(),
                    ));
                };
                for (mapping_key, mapping_value) in mapping {
                    edge.mapping
                        .insert(mapping_key.clone(), raw_json(mapping_value));
                }
            }
            other => {
                tracing::warn!(key = other, "unknown field in dataflow");
            }
        }
    }

    if edge.from_task.is_empty()
        || edge.from_output.is_empty()
        || edge.to_task.is_empty()
        || edge.to_input.is_empty()
    {
        return Err(WorkflowError::Parse(
            "dataflow entry missing required fields (from_task, from_output, to_task, to_input)"
                .to_string(),
        ));
    }

    Ok(edge)
}

// ---------------------------------------------------------------------------
// Serialization
// ---------------------------------------------------------------------------

/// Serialize a `WorkflowDefinition` back to JCWF JSON.
///
/// Raw sub-blobs are re-embedded verbatim, so a parse / serialize / parse
/// cycle round-trips the recognized field set.
pub fn serialize_workflow_json(definition: &WorkflowDefinition) -> Result<String, WorkflowError> {
    let mut root = Map::new();
    root.insert("version".to_string(), json!(definition.version));
    root.insert("id".to_string(), json!(definition.id));
    if !definition.label.is_empty() {
        root.insert("label".to_string(), json!(definition.label));
    }
    if !definition.doc.is_empty() {
        root.insert("doc".to_string(), json!(definition.doc));
    }

    let triggers: Vec<Value> = definition
        .triggers
        .iter()
        .map(trigger_to_value)
        .collect::<Result<_, _>>()?;
    root.insert("triggers".to_string(), Value::Array(triggers));

    let mut tasks = Map::new();
    for (task_key, task) in &definition.tasks {
        tasks.insert(task_key.clone(), task_to_value(task)?);
    }
    root.insert("tasks".to_string(), Value::Object(tasks));

    if !definition.dataflow.is_empty() {
        let edges: Vec<Value> = definition
            .dataflow
            .iter()
            .map(edge_to_value)
            .collect::<Result<_, _>>()?;
        root.insert("dataflow".to_string(), Value::Array(edges));
    }

    if !definition.defaults.is_empty() {
        root.insert("defaults".to_string(), embed_blob(&definition.defaults)?);
    }

    serde_json::to_string_pretty(&Value::Object(root))
        .map_err(|e| WorkflowError::Parse(e.to_string()))
}

fn trigger_to_value(trigger: &TriggerDef) -> Result<Value, WorkflowError> {
    let mut object = Map::new();
    object.insert("type".to_string(), json!(trigger.trigger_type.as_keyword()));
    object.insert("id".to_string(), json!(trigger.id));
    object.insert("enabled".to_string(), json!(trigger.enabled));
    if !trigger.params.is_empty() {
        object.insert("params".to_string(), embed_blob(&trigger.params)?);
    }
    Ok(Value::Object(object))
}

fn task_to_value(task: &TaskDef) -> Result<Value, WorkflowError> {
    let mut object = Map::new();
    object.insert("id".to_string(), json!(task.id));
    object.insert("type".to_string(), json!(task.kind.as_keyword()));
    object.insert("mode".to_string(), json!(task.mode.as_keyword()));
    if !task.label.is_empty() {
        object.insert("label".to_string(), json!(task.label));
    }
    if !task.doc.is_empty() {
        object.insert("doc".to_string(), json!(task.doc));
    }
    if !task.depends_on.is_empty() {
        object.insert("depends_on".to_string(), json!(task.depends_on));
    }
    if !task.file_inputs.is_empty() {
        object.insert("file_inputs".to_string(), json!(task.file_inputs));
    }
    if !task.file_outputs.is_empty() {
        object.insert("file_outputs".to_string(), json!(task.file_outputs));
    }

    let environment = &task.environment;
    if !environment.name.is_empty()
        || !environment.assistant_id.is_empty()
        || !environment.variables.is_empty()
    {
        let mut env = Map::new();
        if !environment.name.is_empty() {
            env.insert("name".to_string(), json!(environment.name));
        }
        if !environment.assistant_id.is_empty() {
            env.insert("assistant_id".to_string(), json!(environment.assistant_id));
        }
        if !environment.variables.is_empty() {
            let mut variables = Map::new();
            for (key, blob) in &environment.variables {
                variables.insert(key.clone(), embed_blob(blob)?);
            }
            env.insert("variables".to_string(), Value::Object(variables));
        }
        object.insert("environment".to_string(), Value::Object(env));
    }

    let binding = &task.queue_binding;
    if !binding.stng_files.is_empty()
        || !binding.task_files.is_empty()
        || !binding.cnxt_files.is_empty()
    {
        object.insert(
            "queue_binding".to_string(),
            json!({
                "stng_files": binding.stng_files,
                "task_files": binding.task_files,
                "cnxt_files": binding.cnxt_files,
            }),
        );
    }

    if !task.inputs.is_empty() {
        object.insert("inputs".to_string(), slots_to_value(&task.inputs));
    }
    if !task.outputs.is_empty() {
        object.insert("outputs".to_string(), slots_to_value(&task.outputs));
    }
    if task.timeout_ms > 0 {
        object.insert("timeout_ms".to_string(), json!(task.timeout_ms));
    }
    if task.retry.max_attempts > 0 || task.retry.backoff_ms > 0 {
        object.insert(
            "retries".to_string(),
            json!({
                "max_attempts": task.retry.max_attempts,
                "backoff_ms": task.retry.backoff_ms,
            }),
        );
    }
    if !task.params.is_empty() {
        object.insert("params".to_string(), embed_blob(&task.params)?);
    }

    Ok(Value::Object(object))
}

fn slots_to_value(slots: &SlotMap) -> Value {
    let mut object = Map::new();
    for (name, slot) in slots {
        object.insert(
            name.clone(),
            json!({ "type": slot.slot_type, "required": slot.required }),
        );
    }
    Value::Object(object)
}

fn edge_to_value(edge: &DataflowEdge) -> Result<Value, WorkflowError> {
    let mut object = Map::new();
    object.insert("from_task".to_string(), json!(edge.from_task));
    object.insert("from_output".to_string(), json!(edge.from_output));
    object.insert("to_task".to_string(), json!(edge.to_task));
    object.insert("to_input".to_string(), json!(edge.to_input));
    if !edge.mapping.is_empty() {
        let mut mapping = Map::new();
        for (key, blob) in &edge.mapping {
            mapping.insert(key.clone(), embed_blob(blob)?);
        }
        object.insert("mapping".to_string(), Value::Object(mapping));
    }
    Ok(Value::Object(object))
}

// ---------------------------------------------------------------------------
// Value helpers
// ---------------------------------------------------------------------------

/// Coerce a scalar JSON value to a string: strings pass through, numbers
/// and booleans render as their JSON text, anything else is rejected.
fn element_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Compact raw-JSON text of a value, used to defer interpretation of
/// engine-private sub-documents to downstream consumers.
fn raw_json(value: &Value) -> String {
    value.to_string()
}

/// Re-embed a stored raw-JSON blob into a value tree.
fn embed_blob(blob: &str) -> Result<Value, WorkflowError> {
    serde_json::from_str(blob)
        .map_err(|e| WorkflowError::Parse(format!("stored raw JSON blob is invalid: {e}")))
}

fn string_array(value: &Value, context: &str) -> Result<Vec<String>, WorkflowError> {
    let Value::Array(entries) = value else {
        return Err(WorkflowError::Parse(format!(
            "{context} must be array of strings"
        )));
    };

    let mut strings = Vec::with_capacity(entries.len());
    for entry in entries {
        let Value::String(s) = entry else {
            return Err(WorkflowError::Parse(format!(
                "{context} must be array of strings"
            )));
        };
        strings.push(s.clone());
    }
    Ok(strings)
}

fn integer_field(value: &Value, context: &str) -> Result<i64, WorkflowError> {
    value
        .as_i64()
        .ok_or_else(|| WorkflowError::Parse(format!("{context} must be integer")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "version": "1.0",
        "id": "daily-report",
        "label": "Daily Reporting Workflow",
        "doc": "Generates a daily report and summarizes it.",
        "triggers": [
            { "type": "cron", "id": "nightly", "enabled": true,
              "params": { "expression": "0 2 * * *" } },
            { "type": "manual", "id": "by-hand", "enabled": true }
        ],
        "tasks": {
            "load_xls": {
                "type": "python",
                "label": "Load spreadsheet",
                "file_inputs": ["report.xls"],
                "file_outputs": ["rows.json"],
                "outputs": { "rows": { "type": "string", "required": false } },
                "params": { "script": "scripts/load.py" }
            },
            "summarize": {
                "id": "summarize",
                "type": "ai_call",
                "mode": "single",
                "depends_on": ["load_xls"],
                "inputs": { "section_text": { "type": "string", "required": true } },
                "outputs": { "markdown_path": { "type": "string", "required": false } },
                "environment": {
                    "name": "assistant_env",
                    "assistant_id": "assistant-123",
                    "variables": { "PROJECT": "DailyReports", "LIMIT": 5 }
                },
                "queue_binding": {
                    "stng_files": ["STNG_daily.txt"],
                    "task_files": ["TASK_summarize.txt"],
                    "cnxt_files": ["CNXT_daily.txt"]
                },
                "timeout_ms": 600000,
                "retries": { "max_attempts": 3, "backoff_ms": 1000 }
            }
        },
        "dataflow": [
            { "from_task": "load_xls", "from_output": "rows",
              "to_task": "summarize", "to_input": "section_text",
              "mapping": { "use_field": "A" } }
        ],
        "defaults": { "timeout_ms": 600000 }
    }"#;

    // -----------------------------------------------------------------------
    // Full document
    // -----------------------------------------------------------------------

    #[test]
    fn parses_full_document() {
        let def = parse_workflow_json(SAMPLE).expect("should parse");

        assert_eq!(def.version, "1.0");
        assert_eq!(def.id, "daily-report");
        assert_eq!(def.label, "Daily Reporting Workflow");
        assert_eq!(def.triggers.len(), 2);
        assert_eq!(def.triggers[0].trigger_type, TriggerType::Cron);
        assert!(def.triggers[0].params.contains("0 2 * * *"));
        assert_eq!(def.tasks.len(), 2);

        let load = &def.tasks["load_xls"];
        assert_eq!(load.id, "load_xls"); // id taken from map key
        assert_eq!(load.kind, TaskKind::Python);
        assert_eq!(load.file_inputs, vec!["report.xls"]);
        assert!(load.params.contains("scripts/load.py"));

        let summarize = &def.tasks["summarize"];
        assert_eq!(summarize.kind, TaskKind::AiCall);
        assert_eq!(summarize.depends_on, vec!["load_xls"]);
        assert!(summarize.inputs["section_text"].required);
        assert_eq!(summarize.environment.assistant_id, "assistant-123");
        // Environment variable values stay raw JSON.
        assert_eq!(summarize.environment.variables["PROJECT"], "\"DailyReports\"");
        assert_eq!(summarize.environment.variables["LIMIT"], "5");
        assert_eq!(summarize.timeout_ms, 600_000);
        assert_eq!(summarize.retry.max_attempts, 3);
        assert_eq!(summarize.queue_binding.stng_files, vec!["STNG_daily.txt"]);

        assert_eq!(def.dataflow.len(), 1);
        assert_eq!(def.dataflow[0].from_output, "rows");
        assert_eq!(def.dataflow[0].mapping["use_field"], "\"A\"");
        assert!(def.defaults.contains("timeout_ms"));
    }

    // -----------------------------------------------------------------------
    // Required fields and version gate
    // -----------------------------------------------------------------------

    #[test]
    fn rejects_empty_content() {
        let err = parse_workflow_json("").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn rejects_unsupported_version() {
        let err = parse_workflow_json(r#"{ "version": "2.0", "id": "x", "tasks": {} }"#)
            .unwrap_err();
        assert!(err.to_string().contains("unsupported JCWF version"));
    }

    #[test]
    fn rejects_missing_version() {
        let err = parse_workflow_json(r#"{ "id": "x", "tasks": {} }"#).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn rejects_missing_id() {
        let err = parse_workflow_json(r#"{ "version": "1.0", "tasks": {} }"#).unwrap_err();
        assert!(err.to_string().contains("id"));
    }

    #[test]
    fn rejects_missing_tasks() {
        let err = parse_workflow_json(r#"{ "version": "1.0", "id": "x" }"#).unwrap_err();
        assert!(err.to_string().contains("tasks"));
    }

    #[test]
    fn rejects_malformed_json() {
        let err = parse_workflow_json("{ not json").unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    // -----------------------------------------------------------------------
    // Defaults and fallbacks
    // -----------------------------------------------------------------------

    #[test]
    fn synthesizes_auto_trigger_when_triggers_absent() {
        let def = parse_workflow_json(
            r#"{ "version": "1.0", "id": "x",
                 "tasks": { "t": { "type": "internal" } } }"#,
        )
        .unwrap();

        assert_eq!(def.triggers.len(), 1);
        assert_eq!(def.triggers[0].trigger_type, TriggerType::Auto);
        assert_eq!(def.triggers[0].id, "auto");
        assert!(def.triggers[0].enabled);
    }

    #[test]
    fn empty_trigger_list_is_not_replaced() {
        let def = parse_workflow_json(
            r#"{ "version": "1.0", "id": "x", "triggers": [],
                 "tasks": { "t": { "type": "internal" } } }"#,
        )
        .unwrap();
        assert!(def.triggers.is_empty());
    }

    #[test]
    fn unknown_task_type_defaults_to_internal() {
        let def = parse_workflow_json(
            r#"{ "version": "1.0", "id": "x",
                 "tasks": { "t": { "type": "cobol" } } }"#,
        )
        .unwrap();
        assert_eq!(def.tasks["t"].kind, TaskKind::Internal);
    }

    #[test]
    fn unknown_mode_defaults_to_single() {
        let def = parse_workflow_json(
            r#"{ "version": "1.0", "id": "x",
                 "tasks": { "t": { "type": "shell", "mode": "batch" } } }"#,
        )
        .unwrap();
        assert_eq!(def.tasks["t"].mode, TaskMode::Single);
    }

    #[test]
    fn unknown_trigger_type_becomes_unknown() {
        let def = parse_workflow_json(
            r#"{ "version": "1.0", "id": "x",
                 "triggers": [{ "type": "webhook", "id": "w" }],
                 "tasks": { "t": { "type": "internal" } } }"#,
        )
        .unwrap();
        assert_eq!(def.triggers[0].trigger_type, TriggerType::Unknown);
    }

    #[test]
    fn task_missing_type_is_rejected() {
        let err = parse_workflow_json(
            r#"{ "version": "1.0", "id": "x", "tasks": { "t": { "label": "no type" } } }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("task missing required field: type"));
    }

    #[test]
    fn unknown_keys_are_tolerated() {
        let def = parse_workflow_json(
            r#"{ "version": "1.0", "id": "x", "future_field": 1,
                 "tasks": { "t": { "type": "internal", "color": "green" } } }"#,
        )
        .unwrap();
        assert_eq!(def.tasks["t"].kind, TaskKind::Internal);
    }

    // -----------------------------------------------------------------------
    // Dataflow constraints
    // -----------------------------------------------------------------------

    #[test]
    fn dataflow_entry_requires_all_endpoints() {
        let err = parse_workflow_json(
            r#"{ "version": "1.0", "id": "x",
                 "tasks": { "t": { "type": "internal" } },
                 "dataflow": [{ "from_task": "t", "to_task": "t" }] }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing required fields"));
    }

    // -----------------------------------------------------------------------
    // Roundtrip
    // -----------------------------------------------------------------------

    #[test]
    fn parse_serialize_parse_roundtrips() {
        let first = parse_workflow_json(SAMPLE).unwrap();
        let serialized = serialize_workflow_json(&first).unwrap();
        let second = parse_workflow_json(&serialized).unwrap();

        // Structural equality over the recognized field set.
        let a = serde_json::to_value(&first).unwrap();
        let b = serde_json::to_value(&second).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn raw_blobs_survive_roundtrip_bytewise() {
        let first = parse_workflow_json(SAMPLE).unwrap();
        let serialized = serialize_workflow_json(&first).unwrap();
        let second = parse_workflow_json(&serialized).unwrap();

        assert_eq!(first.defaults, second.defaults);
        assert_eq!(first.tasks["load_xls"].params, second.tasks["load_xls"].params);
        assert_eq!(first.triggers[0].params, second.triggers[0].params);
    }
}
