//! Trigger binder: turning per-workflow trigger records into engine
//! registrations.
//!
//! Trigger `params` blobs stay opaque until this point; the binder parses
//! each one according to its trigger type. A trigger whose params fail to
//! parse is logged and left unregistered; the rest of the workflow still
//! binds.

use std::path::PathBuf;

use serde_json::Value;

use flowmill_types::workflow::TriggerType;

use crate::trigger::engine::{FileEventKind, TriggerEngine};
use crate::trigger::TriggerError;
use crate::workflow::registry::WorkflowRegistry;

/// Register every trigger of every workflow in the registry.
pub fn register_all(registry: &WorkflowRegistry, engine: &mut TriggerEngine) {
    for workflow_id in registry.ids() {
        let Some(definition) = registry.get(&workflow_id) else {
            continue;
        };

        for trigger in &definition.triggers {
            match trigger.trigger_type {
                TriggerType::Auto => {
                    engine.add_auto(&definition.id, &trigger.id, trigger.enabled);
                }

                TriggerType::Cron => match parse_cron_params(&trigger.params) {
                    Ok(expression) => {
                        engine.add_cron(&definition.id, &trigger.id, &expression, trigger.enabled);
                    }
                    Err(e) => {
                        tracing::error!(
                            workflow = definition.id.as_str(),
                            trigger = trigger.id.as_str(),
                            error = %e,
                            "failed to parse cron trigger params"
                        );
                    }
                },

                TriggerType::FileWatch => match parse_file_watch_params(&trigger.params) {
                    Ok((path, events, debounce_ms)) => {
                        engine.add_file_watch(
                            &definition.id,
                            &trigger.id,
                            path,
                            events,
                            debounce_ms,
                            trigger.enabled,
                        );
                    }
                    Err(e) => {
                        tracing::error!(
                            workflow = definition.id.as_str(),
                            trigger = trigger.id.as_str(),
                            error = %e,
                            "failed to parse file_watch trigger params"
                        );
                    }
                },

                TriggerType::Manual => {
                    engine.add_manual(&definition.id, &trigger.id, trigger.enabled);
                }

                TriggerType::Structure => {
                    // Structure triggers describe per-item expansion; they
                    // never register a runtime trigger.
                    tracing::info!(
                        workflow = definition.id.as_str(),
                        trigger = trigger.id.as_str(),
                        "structure trigger does not register at runtime"
                    );
                }

                TriggerType::Unknown => {
                    tracing::warn!(
                        workflow = definition.id.as_str(),
                        trigger = trigger.id.as_str(),
                        "trigger has unsupported or unknown type"
                    );
                }
            }
        }
    }
}

/// Extract `expression` from cron trigger params.
pub fn parse_cron_params(params: &str) -> Result<String, TriggerError> {
    let root = parse_params_object(params)?;

    match root.get("expression") {
        Some(Value::String(expression)) => Ok(expression.clone()),
        Some(_) => Err(TriggerError::InvalidParams(
            "'expression' must be a string".to_string(),
        )),
        None => Err(TriggerError::InvalidParams(
            "missing 'expression' field".to_string(),
        )),
    }
}

/// Extract `(path, events, debounce_ms)` from file_watch trigger params.
///
/// Unknown event keywords are skipped with a warning; at least one valid
/// event is required. A missing or negative `debounce_ms` becomes 0.
pub fn parse_file_watch_params(
    params: &str,
) -> Result<(PathBuf, Vec<FileEventKind>, u64), TriggerError> {
    let root = parse_params_object(params)?;

    let path = match root.get("path") {
        Some(Value::String(path)) => PathBuf::from(path),
        Some(_) => {
            return Err(TriggerError::InvalidParams(
                "'path' must be a string".to_string(),
            ));
        }
        None => {
            return Err(TriggerError::InvalidParams(
                "missing 'path' field".to_string(),
            ));
        }
    };

    let mut events = Vec::new();
    if let Some(raw_events) = root.get("events") {
        let Value::Array(entries) = raw_events else {
            return Err(TriggerError::InvalidParams(
                "'events' must be an array".to_string(),
            ));
        };

        for entry in entries {
            let Value::String(keyword) = entry else {
                tracing::warn!("skipping non-string event entry in file_watch params");
                continue;
            };
            match FileEventKind::from_keyword(keyword) {
                Some(kind) => events.push(kind),
                None => {
                    tracing::warn!(event = keyword.as_str(), "unknown file event keyword, ignoring");
                }
            }
        }
    }

    if events.is_empty() {
        return Err(TriggerError::InvalidParams(
            "no valid events in 'events' array".to_string(),
        ));
    }

    let debounce_ms = root
        .get("debounce_ms")
        .and_then(Value::as_i64)
        .map(|v| v.max(0) as u64)
        .unwrap_or(0);

    Ok((path, events, debounce_ms))
}

fn parse_params_object(params: &str) -> Result<serde_json::Map<String, Value>, TriggerError> {
    if params.is_empty() {
        return Err(TriggerError::InvalidParams(
            "params JSON is empty".to_string(),
        ));
    }

    let root: Value = serde_json::from_str(params)
        .map_err(|e| TriggerError::InvalidParams(format!("failed to parse params JSON: {e}")))?;

    match root {
        Value::Object(object) => Ok(object),
        _ => Err(TriggerError::InvalidParams(
            "params JSON must be an object".to_string(),
        )),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
