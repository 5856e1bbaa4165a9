//! Template expansion for dataflow values and file path lists.
//!
//! Two layers live here, with deliberately different strictness:
//!
//! - **Value layer** (`expand_input_refs`): rewrites literal
//!   `${inputs.KEY}` substrings inside already-resolved dataflow values.
//!   Malformed templates or unknown keys fail the whole resolution.
//! - **Path layer** (`resolve_path_template` / `resolve_path_list`):
//!   rewrites `${inputs.KEY}` and `${outputs.KEY}` inside `file_inputs` /
//!   `file_outputs` entries before freshness checks. Failure here is not an
//!   error; callers conservatively treat the task as not up to date.
//!
//! The argv-level tokens (`${inputs}`, `${input[N]}`, `${slot.NAME}`, ...)
//! are executor concerns and live in `crate::executor::args`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use flowmill_types::workflow::SlotMap;

use crate::error::WorkflowError;

// ---------------------------------------------------------------------------
// Value layer
// ---------------------------------------------------------------------------

/// Expand `${inputs.KEY}` references in a resolved dataflow value.
///
/// Only the `${inputs.` form is rewritten; any other text (including other
/// `${...}` shapes) passes through untouched, which makes the expansion
/// idempotent on already-literal strings. A `${inputs.` with no closing
/// brace, or a reference to a key absent from `inputs`, is an error.
pub fn expand_input_refs(
    raw: &str,
    inputs: &BTreeMap<String, String>,
) -> Result<String, WorkflowError> {
    const MARKER: &str = "${inputs.";

    let mut expanded = String::with_capacity(raw.len());
    let mut cursor = 0;

    while cursor < raw.len() {
        let Some(start) = raw[cursor..].find(MARKER).map(|i| cursor + i) else {
            expanded.push_str(&raw[cursor..]);
            break;
        };

        expanded.push_str(&raw[cursor..start]);

        let Some(close) = raw[start..].find('}').map(|i| start + i) else {
            return Err(WorkflowError::Resolve(format!(
                "malformed template in value '{raw}'"
            )));
        };

        let key = &raw[start + MARKER.len()..close];
        let Some(value) = inputs.get(key) else {
            return Err(WorkflowError::Resolve(format!(
                "template references unknown input '{key}'"
            )));
        };

        expanded.push_str(value);
        cursor = close + 1;
    }

    Ok(expanded)
}

// ---------------------------------------------------------------------------
// Path layer
// ---------------------------------------------------------------------------

/// Expand `${inputs.KEY}` / `${outputs.KEY}` tokens in a single path
/// template. Returns `None` for malformed templates, unsupported token
/// forms, or unknown keys.
pub fn resolve_path_template(
    raw: &str,
    inputs: &BTreeMap<String, String>,
    outputs: &BTreeMap<String, String>,
) -> Option<String> {
    let mut resolved = String::with_capacity(raw.len());
    let mut cursor = 0;

    while cursor < raw.len() {
        let Some(start) = raw[cursor..].find("${").map(|i| cursor + i) else {
            resolved.push_str(&raw[cursor..]);
            break;
        };

        resolved.push_str(&raw[cursor..start]);

        let close = raw[start + 2..].find('}').map(|i| start + 2 + i)?;
        let token = &raw[start + 2..close];

        if let Some(key) = token.strip_prefix("inputs.") {
            resolved.push_str(inputs.get(key)?);
        } else if let Some(key) = token.strip_prefix("outputs.") {
            resolved.push_str(outputs.get(key)?);
        } else {
            return None;
        }

        cursor = close + 1;
    }

    // A replacement value may itself carry template syntax; treat that as
    // unresolved.
    if resolved.contains("${") {
        return None;
    }

    Some(resolved)
}

/// Resolve a list of path templates. A template that fails to resolve but
/// contains no template syntax at all is accepted as a literal path; an
/// empty resolved path fails the whole list.
pub fn resolve_path_list(
    templates: &[String],
    inputs: &BTreeMap<String, String>,
    outputs: &BTreeMap<String, String>,
) -> Option<Vec<PathBuf>> {
    let mut paths = Vec::with_capacity(templates.len());

    for template in templates {
        match resolve_path_template(template, inputs, outputs) {
            Some(resolved) => {
                if resolved.is_empty() {
                    return None;
                }
                paths.push(PathBuf::from(resolved));
            }
            None if !template.contains("${") => {
                paths.push(PathBuf::from(template));
            }
            None => return None,
        }
    }

    Some(paths)
}

// ---------------------------------------------------------------------------
// Output slot population
// ---------------------------------------------------------------------------

/// Map declared output slots to resolved output paths.
///
/// Slot names iterate in ascending order (the slot map is a `BTreeMap`),
/// paths keep declaration order:
/// - equal counts: pair positionally,
/// - a single path: every slot maps to it,
/// - a single slot: it maps to the first path,
/// - otherwise the mapping is ambiguous and the result is empty, so
///   downstream dataflow resolution fails deterministically.
pub fn derive_output_values(
    slots: &SlotMap,
    paths: &[PathBuf],
) -> BTreeMap<String, String> {
    let mut values = BTreeMap::new();

    if slots.is_empty() || paths.is_empty() {
        return values;
    }

    if slots.len() == paths.len() {
        for (slot_name, path) in slots.keys().zip(paths) {
            values.insert(slot_name.clone(), path.display().to_string());
        }
    } else if paths.len() == 1 {
        let only = paths[0].display().to_string();
        for slot_name in slots.keys() {
            values.insert(slot_name.clone(), only.clone());
        }
    } else if slots.len() == 1 {
        let slot_name = slots.keys().next().cloned().unwrap_or_default();
        values.insert(slot_name, paths[0].display().to_string());
    }

    values
}

/// `key=value;` summary of a value map, kept on task instances for
/// inspection.
pub fn summarize_values(values: &BTreeMap<String, String>) -> String {
    let mut summary = String::new();
    for (key, value) in values {
        summary.push_str(key);
        summary.push('=');
        summary.push_str(value);
        summary.push(';');
    }
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
