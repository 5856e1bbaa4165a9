//! Dependency graph checks for a workflow's task map.
//!
//! Uses `petgraph` to model `depends_on` edges as a directed graph.
//! Topological sort detects cycles and names an offending task.

use std::collections::{BTreeMap, HashMap};

use petgraph::algo::toposort;
use petgraph::graph::DiGraph;

use flowmill_types::workflow::TaskDef;

use crate::error::WorkflowError;

/// Validate that the tasks form a valid DAG: every `depends_on` entry names
/// a known task, and the dependency graph is acyclic.
pub fn validate_task_graph(tasks: &BTreeMap<String, TaskDef>) -> Result<(), WorkflowError> {
    let mut graph = DiGraph::<&str, ()>::new();
    let mut node_indices = HashMap::new();

    for task_id in tasks.keys() {
        let index = graph.add_node(task_id.as_str());
        node_indices.insert(task_id.as_str(), index);
    }

    // Edge from dependency -> dependent.
    for (task_id, task) in tasks {
        let to_index = node_indices[task_id.as_str()];
        for dependency in &task.depends_on {
            let from_index = node_indices.get(dependency.as_str()).ok_or_else(|| {
                WorkflowError::UnknownDependency(format!(
                    "task '{task_id}' depends on unknown task '{dependency}'"
                ))
            })?;
            graph.add_edge(*from_index, to_index, ());
        }
    }

    toposort(&graph, None).map_err(|cycle| {
        let task_id = graph[cycle.node_id()];
        WorkflowError::CycleDetected(format!("cycle detected involving task '{task_id}'"))
    })?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
