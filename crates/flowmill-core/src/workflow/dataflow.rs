//! Dataflow resolution: computing a task's logical input values.
//!
//! For every declared input slot the resolver scans the workflow's dataflow
//! edges for one targeting that slot and reads the source task's recorded
//! output value. After all slots resolve, a template-expansion pass rewrites
//! `${inputs.KEY}` references against the same resolved map, so inputs of a
//! task may reference each other.
//!
//! Run-context and literal-default resolution are reserved extension points;
//! today an input with no matching edge fails resolution.

use std::collections::BTreeMap;

use flowmill_types::workflow::{TaskDef, WorkflowDefinition, WorkflowRun};

use crate::error::WorkflowError;
use crate::workflow::template;

/// Resolve the full input map for `task_id`, or fail with a message naming
/// the first unresolvable slot or template.
pub fn resolve_inputs_for_task(
    definition: &WorkflowDefinition,
    run: &WorkflowRun,
    task: &TaskDef,
    task_id: &str,
) -> Result<BTreeMap<String, String>, WorkflowError> {
    let mut resolved = BTreeMap::new();

    // Step 1: resolve each declared input from dataflow edges.
    for input_name in task.inputs.keys() {
        let value = resolve_from_edges(definition, run, task_id, input_name)?;
        resolved.insert(input_name.clone(), value);
    }

    // Step 2: expand ${inputs.KEY} templates against the pre-expansion map,
    // so ordering between slots does not matter.
    let snapshot = resolved.clone();
    for (input_name, value) in &mut resolved {
        *value = template::expand_input_refs(value, &snapshot).map_err(|e| {
            WorkflowError::Resolve(format!(
                "template expansion failed for input '{input_name}' of task '{task_id}': {e}"
            ))
        })?;
    }

    Ok(resolved)
}

/// Look up the dataflow edge feeding `(task_id, input_name)` and read the
/// source task's output value.
fn resolve_from_edges(
    definition: &WorkflowDefinition,
    run: &WorkflowRun,
    task_id: &str,
    input_name: &str,
) -> Result<String, WorkflowError> {
    for edge in &definition.dataflow {
        if edge.to_task != task_id || edge.to_input != input_name {
            continue;
        }

        let source_state = run.task_states.get(&edge.from_task).ok_or_else(|| {
            WorkflowError::Resolve(format!(
                "dataflow references unknown task '{}' for '{}.{}'",
                edge.from_task, edge.to_task, edge.to_input
            ))
        })?;

        let value = source_state
            .output_values
            .get(&edge.from_output)
            .ok_or_else(|| {
                WorkflowError::Resolve(format!(
                    "output '{}' not found in task '{}' for dataflow into '{}.{}'",
                    edge.from_output, edge.from_task, edge.to_task, edge.to_input
                ))
            })?;

        return Ok(value.clone());
    }

    Err(WorkflowError::Resolve(format!(
        "missing input '{input_name}' for task '{task_id}': no dataflow edge supplies it"
    )))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use flowmill_types::workflow::{
        DataflowEdge, SlotDef, TaskKind, TaskState, WorkflowDefinition, WorkflowRun,
    };

    fn edge(from_task: &str, from_output: &str, to_task: &str, to_input: &str) -> DataflowEdge {
        DataflowEdge {
            from_task: from_task.to_string(),
            from_output: from_output.to_string(),
            to_task: to_task.to_string(),
            to_input: to_input.to_string(),
            mapping: BTreeMap::new(),
        }
    }

    /// `load` produces `rows`; `sum` consumes `section_text` via one edge.
    fn fixture() -> (WorkflowDefinition, WorkflowRun) {
        let mut definition = WorkflowDefinition::new("wf");

        let mut load = TaskDef::new("load", TaskKind::Internal);
        load.outputs.insert("rows".to_string(), SlotDef::default());
        definition.tasks.insert("load".to_string(), load);

        let mut sum = TaskDef::new("sum", TaskKind::Internal);
        sum.inputs.insert(
            "section_text".to_string(),
            SlotDef {
                slot_type: "string".to_string(),
                required: true,
            },
        );
        definition.tasks.insert("sum".to_string(), sum);

        definition
            .dataflow
            .push(edge("load", "rows", "sum", "section_text"));

        let mut run = WorkflowRun::new("wf", "wf_1", definition.tasks.keys());
        let load_state = run.task_states.get_mut("load").unwrap();
        load_state.state = TaskState::Succeeded;
        load_state
            .output_values
            .insert("rows".to_string(), "r.json".to_string());

        (definition, run)
    }

    #[test]
    fn resolves_input_from_upstream_output() {
        let (definition, run) = fixture();
        let task = definition.tasks["sum"].clone();

        let inputs = resolve_inputs_for_task(&definition, &run, &task, "sum").unwrap();
        assert_eq!(inputs["section_text"], "r.json");
    }

    #[test]
    fn resolution_is_a_function_of_definition_and_states() {
        let (definition, run) = fixture();
        let task = definition.tasks["sum"].clone();

        let a = resolve_inputs_for_task(&definition, &run, &task, "sum").unwrap();
        let b = resolve_inputs_for_task(&definition, &run.clone(), &task, "sum").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_edge_fails_with_slot_name() {
        let (mut definition, run) = fixture();
        definition.dataflow.clear();
        let task = definition.tasks["sum"].clone();

        let err = resolve_inputs_for_task(&definition, &run, &task, "sum").unwrap_err();
        assert!(err.to_string().contains("missing input 'section_text'"));
    }

    #[test]
    fn missing_source_output_fails_with_specific_message() {
        let (definition, mut run) = fixture();
        run.task_states
            .get_mut("load")
            .unwrap()
            .output_values
            .clear();
        let task = definition.tasks["sum"].clone();

        let err = resolve_inputs_for_task(&definition, &run, &task, "sum").unwrap_err();
        assert!(err.to_string().contains("output 'rows' not found in task 'load'"));
    }

    #[test]
    fn missing_source_state_fails() {
        let (definition, mut run) = fixture();
        run.task_states.remove("load");
        let task = definition.tasks["sum"].clone();

        let err = resolve_inputs_for_task(&definition, &run, &task, "sum").unwrap_err();
        assert!(err.to_string().contains("unknown task 'load'"));
    }

    #[test]
    fn inputs_may_reference_sibling_inputs() {
        let (mut definition, mut run) = fixture();

        // Second input whose upstream value references the first one.
        let sum = definition.tasks.get_mut("sum").unwrap();
        sum.inputs
            .insert("title".to_string(), SlotDef::default());
        definition
            .dataflow
            .push(edge("load", "title_tpl", "sum", "title"));

        let load_state = run.task_states.get_mut("load").unwrap();
        load_state.output_values.insert(
            "title_tpl".to_string(),
            "Section: ${inputs.section_text}".to_string(),
        );

        let task = definition.tasks["sum"].clone();
        let inputs = resolve_inputs_for_task(&definition, &run, &task, "sum").unwrap();
        assert_eq!(inputs["title"], "Section: r.json");
    }

    #[test]
    fn unknown_template_key_fails_resolution() {
        let (definition, mut run) = fixture();
        run.task_states
            .get_mut("load")
            .unwrap()
            .output_values
            .insert("rows".to_string(), "${inputs.nope}".to_string());
        let task = definition.tasks["sum"].clone();

        let err = resolve_inputs_for_task(&definition, &run, &task, "sum").unwrap_err();
        assert!(err.to_string().contains("template expansion failed"));
    }

    #[test]
    fn task_without_inputs_resolves_to_empty_map() {
        let (definition, run) = fixture();
        let task = definition.tasks["load"].clone();

        let inputs = resolve_inputs_for_task(&definition, &run, &task, "load").unwrap();
        assert!(inputs.is_empty());
    }
}
