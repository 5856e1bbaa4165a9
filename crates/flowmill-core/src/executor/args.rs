//! Argv-level template expansion and argument safety for process-spawning
//! executors.
//!
//! Supported tokens (strict; unknown forms fail the argument):
//!
//! - `${inputs}` / `${outputs}` -- space-joined `file_inputs` / `file_outputs`
//! - `${input[N]}` / `${output[N]}` -- N-th entry, 0-based; out of range fails
//! - `${slot.NAME}` -- resolved input value; missing fails
//! - `${env.NAME}` -- environment variable raw value; missing expands empty
//!
//! Keeping misconfigurations explicit is the point: a typoed token should
//! fail the task, not silently run a different command.

use std::collections::BTreeMap;
use std::path::PathBuf;

use flowmill_types::workflow::{TaskDef, TaskInstanceState};

use crate::workflow::template;

/// Expand all templates inside a single raw argument.
///
/// Fails on a malformed pattern (missing closing brace), an out-of-range
/// index, an unknown `slot.NAME`, or an unrecognized token form.
pub fn expand_arg_template(
    raw: &str,
    task: &TaskDef,
    state: &TaskInstanceState,
) -> Result<String, String> {
    let mut expanded = String::with_capacity(raw.len());
    let mut cursor = 0;

    while cursor < raw.len() {
        let Some(start) = raw[cursor..].find("${").map(|i| cursor + i) else {
            expanded.push_str(&raw[cursor..]);
            break;
        };

        expanded.push_str(&raw[cursor..start]);

        let Some(close) = raw[start + 2..].find('}').map(|i| start + 2 + i) else {
            return Err(format!("malformed template in argument '{raw}'"));
        };

        let token = &raw[start + 2..close];
        let replacement = expand_token(token, task, state)
            .ok_or_else(|| format!("cannot expand token '${{{token}}}' in argument '{raw}'"))?;

        expanded.push_str(&replacement);
        cursor = close + 1;
    }

    Ok(expanded)
}

fn expand_token(token: &str, task: &TaskDef, state: &TaskInstanceState) -> Option<String> {
    if token == "inputs" {
        return Some(task.file_inputs.join(" "));
    }
    if token == "outputs" {
        return Some(task.file_outputs.join(" "));
    }

    if let Some(index) = indexed_token(token, "input[") {
        return task.file_inputs.get(index).cloned();
    }
    if let Some(index) = indexed_token(token, "output[") {
        return task.file_outputs.get(index).cloned();
    }

    if let Some(slot_name) = token.strip_prefix("slot.") {
        return state.input_values.get(slot_name).cloned();
    }

    if let Some(env_name) = token.strip_prefix("env.") {
        // Missing env variables expand as empty.
        return Some(
            task.environment
                .variables
                .get(env_name)
                .cloned()
                .unwrap_or_default(),
        );
    }

    None
}

fn indexed_token(token: &str, prefix: &str) -> Option<usize> {
    token
        .strip_prefix(prefix)?
        .strip_suffix(']')?
        .parse::<usize>()
        .ok()
}

/// Inject default input/output macros when the raw args mention neither.
///
/// If no argument textually contains `${inputs}` or `${input[`,
/// `"${inputs}"` is prepended; if none contains `${outputs}` or
/// `${output[`, `"${outputs}"` is appended.
pub fn ensure_default_io_args(args: &mut Vec<String>) {
    let has_input_macro = args
        .iter()
        .any(|a| a.contains("${inputs}") || a.contains("${input["));
    let has_output_macro = args
        .iter()
        .any(|a| a.contains("${outputs}") || a.contains("${output["));

    if !has_input_macro {
        args.insert(0, "${inputs}".to_string());
    }
    if !has_output_macro {
        args.push("${outputs}".to_string());
    }
}

/// Conservative safety check for one expanded argument: reject control
/// characters and the usual shell-injection metacharacters.
pub fn is_safe_argument(argument: &str) -> bool {
    argument.chars().all(|c| {
        !c.is_control() && !matches!(c, ';' | '&' | '|' | '>' | '<' | '\'' | '"' | '`')
    })
}

/// Join command and arguments into a single shell line.
pub fn join_command(parts: &[String]) -> String {
    parts.join(" ")
}

/// Derive `output_values` for a task from its declared output slots and its
/// (template-resolved) `file_outputs`, per the skip-population rule.
///
/// Templates that cannot be resolved against the task's input values fall
/// back to the raw declaration so that literal paths always work.
pub fn derive_task_outputs(
    task: &TaskDef,
    state: &TaskInstanceState,
) -> BTreeMap<String, String> {
    let no_outputs = BTreeMap::new();
    let resolved =
        template::resolve_path_list(&task.file_outputs, &state.input_values, &no_outputs)
            .unwrap_or_else(|| task.file_outputs.iter().map(PathBuf::from).collect());

    template::derive_output_values(&task.outputs, &resolved)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
