//! Workflow engine core: definition parsing, validation, dataflow, freshness,
//! and wave-based orchestration.
//!
//! - `parser` -- JCWF JSON to `WorkflowDefinition`, defaults, opaque blobs
//! - `registry` -- loaded workflows, duplicate handling, total validation
//! - `dag` -- dependency graph checks (unknown references, cycles)
//! - `template` -- `${...}` expansion for dataflow values and file paths
//! - `dataflow` -- resolved input maps from edges + template expansion
//! - `freshness` -- make-style up-to-date decision with transitive upstream
//! - `orchestrator` -- ready-wave scheduler, skip/succeed/fail state machine

pub mod dag;
pub mod dataflow;
pub mod freshness;
pub mod orchestrator;
pub mod parser;
pub mod registry;
pub mod template;
