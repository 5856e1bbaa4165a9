//! Make-style freshness: deciding whether a task's outputs are newer than
//! everything that feeds them.
//!
//! A task is up to date iff every declared output exists and the oldest
//! output mtime is >= the newest mtime among its declared inputs and the
//! outputs of every transitively upstream task. Missing or unreadable files
//! anywhere default to "not up to date" so transient filesystem states
//! simply trigger a rebuild.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use flowmill_types::workflow::WorkflowDefinition;

/// Fully template-resolved input and output paths for one task.
#[derive(Debug, Clone, Default)]
pub struct ResolvedPaths {
    pub inputs: Vec<PathBuf>,
    pub outputs: Vec<PathBuf>,
}

/// Resolves the output paths of an upstream task, or `None` when its
/// templates cannot be resolved yet.
pub type ResolveOutputPathsFn<'a> = dyn Fn(&str) -> Option<Vec<PathBuf>> + 'a;

/// Make-style up-to-date predicate.
///
/// `resolve_output_paths` supplies the resolved `file_outputs` of upstream
/// tasks; the caller owns template resolution so this check stays a pure
/// timestamp comparison. Cycles cannot occur here because the validator
/// rejects them, but a visited set guards traversal anyway.
pub fn is_task_up_to_date(
    definition: &WorkflowDefinition,
    task_id: &str,
    resolved: &ResolvedPaths,
    resolve_output_paths: &ResolveOutputPathsFn<'_>,
) -> bool {
    // No declared outputs: nothing provably up to date.
    if resolved.outputs.is_empty() {
        return false;
    }

    // 1) Declared input timestamps.
    let mut input_times = Vec::with_capacity(resolved.inputs.len());
    for path in &resolved.inputs {
        let Some(mtime) = modified_time(path) else {
            return false;
        };
        input_times.push(mtime);
    }

    // 2) Transitive upstream output timestamps.
    let Some(task) = definition.tasks.get(task_id) else {
        return false;
    };

    let mut visited = HashSet::new();
    visited.insert(task_id.to_string());

    for dependency in &task.depends_on {
        if !collect_upstream_output_times(
            definition,
            dependency,
            &mut visited,
            &mut input_times,
            resolve_output_paths,
        ) {
            return false;
        }
    }

    // No inputs and no upstream outputs: freshness cannot be proven.
    let Some(newest_input) = input_times.iter().max().copied() else {
        return false;
    };

    // 3) This task's output timestamps.
    let mut output_times = Vec::with_capacity(resolved.outputs.len());
    for path in &resolved.outputs {
        let Some(mtime) = modified_time(path) else {
            return false;
        };
        output_times.push(mtime);
    }

    let Some(oldest_output) = output_times.iter().min().copied() else {
        return false;
    };

    oldest_output >= newest_input
}

/// Collect output mtimes of `task_id` and everything upstream of it.
/// Returns false when any task, path resolution, or file lookup fails.
fn collect_upstream_output_times(
    definition: &WorkflowDefinition,
    task_id: &str,
    visited: &mut HashSet<String>,
    times: &mut Vec<SystemTime>,
    resolve_output_paths: &ResolveOutputPathsFn<'_>,
) -> bool {
    if !visited.insert(task_id.to_string()) {
        return true;
    }

    let Some(task) = definition.tasks.get(task_id) else {
        return false;
    };

    for dependency in &task.depends_on {
        if !collect_upstream_output_times(
            definition,
            dependency,
            visited,
            times,
            resolve_output_paths,
        ) {
            return false;
        }
    }

    let Some(paths) = resolve_output_paths(task_id) else {
        return false;
    };

    for path in paths {
        let Some(mtime) = modified_time(&path) else {
            return false;
        };
        times.push(mtime);
    }

    true
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;

    use flowmill_types::workflow::{TaskDef, TaskKind};

    fn definition(tasks: Vec<TaskDef>) -> WorkflowDefinition {
        let mut def = WorkflowDefinition::new("wf");
        for task in tasks {
            def.tasks.insert(task.id.clone(), task);
        }
        def
    }

    fn task(id: &str, depends_on: &[&str]) -> TaskDef {
        let mut t = TaskDef::new(id, TaskKind::Internal);
        t.depends_on = depends_on.iter().map(|d| d.to_string()).collect();
        t
    }

    /// Write `path` with an mtime `offset` seconds in the past.
    fn write_with_age(path: &Path, offset_secs: u64) {
        fs::write(path, b"x").unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(offset_secs);
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(mtime).unwrap();
    }

    fn no_upstream(_: &str) -> Option<Vec<PathBuf>> {
        Some(Vec::new())
    }

    #[test]
    fn zero_declared_outputs_is_never_up_to_date() {
        let def = definition(vec![task("t", &[])]);
        let resolved = ResolvedPaths::default();
        assert!(!is_task_up_to_date(&def, "t", &resolved, &no_upstream));
    }

    #[test]
    fn missing_input_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        write_with_age(&out, 0);

        let def = definition(vec![task("t", &[])]);
        let resolved = ResolvedPaths {
            inputs: vec![dir.path().join("absent.txt")],
            outputs: vec![out],
        };
        assert!(!is_task_up_to_date(&def, "t", &resolved, &no_upstream));
    }

    #[test]
    fn missing_output_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        write_with_age(&input, 100);

        let def = definition(vec![task("t", &[])]);
        let resolved = ResolvedPaths {
            inputs: vec![input],
            outputs: vec![dir.path().join("absent.txt")],
        };
        assert!(!is_task_up_to_date(&def, "t", &resolved, &no_upstream));
    }

    #[test]
    fn newer_output_is_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        write_with_age(&input, 100);
        write_with_age(&output, 10);

        let def = definition(vec![task("t", &[])]);
        let resolved = ResolvedPaths {
            inputs: vec![input],
            outputs: vec![output],
        };
        assert!(is_task_up_to_date(&def, "t", &resolved, &no_upstream));
    }

    #[test]
    fn stale_output_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        write_with_age(&input, 10);
        write_with_age(&output, 100);

        let def = definition(vec![task("t", &[])]);
        let resolved = ResolvedPaths {
            inputs: vec![input],
            outputs: vec![output],
        };
        assert!(!is_task_up_to_date(&def, "t", &resolved, &no_upstream));
    }

    #[test]
    fn equal_timestamps_count_as_up_to_date() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        write_with_age(&input, 50);
        write_with_age(&output, 50);

        let def = definition(vec![task("t", &[])]);
        let resolved = ResolvedPaths {
            inputs: vec![input],
            outputs: vec![output],
        };
        assert!(is_task_up_to_date(&def, "t", &resolved, &no_upstream));
    }

    #[test]
    fn no_inputs_and_no_upstream_cannot_be_proven_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        write_with_age(&output, 0);

        let def = definition(vec![task("t", &[])]);
        let resolved = ResolvedPaths {
            inputs: vec![],
            outputs: vec![output],
        };
        assert!(!is_task_up_to_date(&def, "t", &resolved, &no_upstream));
    }

    #[test]
    fn newer_upstream_output_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let upstream_out = dir.path().join("up.txt");
        let output = dir.path().join("out.txt");
        write_with_age(&upstream_out, 10); // upstream rebuilt recently
        write_with_age(&output, 100); // our output is older

        let def = definition(vec![task("up", &[]), task("t", &["up"])]);
        let resolved = ResolvedPaths {
            inputs: vec![],
            outputs: vec![output],
        };
        let upstream_path = upstream_out.clone();
        let resolve = move |task_id: &str| -> Option<Vec<PathBuf>> {
            (task_id == "up").then(|| vec![upstream_path.clone()])
        };
        assert!(!is_task_up_to_date(&def, "t", &resolved, &resolve));
    }

    #[test]
    fn transitive_upstream_is_considered() {
        let dir = tempfile::tempdir().unwrap();
        let a_out = dir.path().join("a.txt");
        let b_out = dir.path().join("b.txt");
        let c_out = dir.path().join("c.txt");
        write_with_age(&a_out, 5); // grandparent touched most recently
        write_with_age(&b_out, 200);
        write_with_age(&c_out, 100);

        // a -> b -> c
        let def = definition(vec![task("a", &[]), task("b", &["a"]), task("c", &["b"])]);
        let resolved = ResolvedPaths {
            inputs: vec![],
            outputs: vec![c_out],
        };
        let (a, b) = (a_out.clone(), b_out.clone());
        let resolve = move |task_id: &str| -> Option<Vec<PathBuf>> {
            match task_id {
                "a" => Some(vec![a.clone()]),
                "b" => Some(vec![b.clone()]),
                _ => None,
            }
        };
        assert!(!is_task_up_to_date(&def, "c", &resolved, &resolve));
    }

    #[test]
    fn unresolvable_upstream_outputs_force_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        write_with_age(&output, 0);

        let def = definition(vec![task("up", &[]), task("t", &["up"])]);
        let resolved = ResolvedPaths {
            inputs: vec![],
            outputs: vec![output],
        };
        let resolve = |_: &str| -> Option<Vec<PathBuf>> { None };
        assert!(!is_task_up_to_date(&def, "t", &resolved, &resolve));
    }

    #[test]
    fn missing_upstream_output_file_forces_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.txt");
        write_with_age(&output, 0);

        let def = definition(vec![task("up", &[]), task("t", &["up"])]);
        let resolved = ResolvedPaths {
            inputs: vec![],
            outputs: vec![output],
        };
        let missing = dir.path().join("never-written.txt");
        let resolve = move |_: &str| -> Option<Vec<PathBuf>> { Some(vec![missing.clone()]) };
        assert!(!is_task_up_to_date(&def, "t", &resolved, &resolve));
    }
}
