//! Shared domain types for flowmill.
//!
//! This crate contains the JCWF workflow data model (definitions, triggers,
//! dataflow edges), the runtime state types (`WorkflowRun`,
//! `TaskInstanceState`), and the engine configuration type.
//!
//! Zero infrastructure dependencies -- only serde and serde_json.

pub mod config;
pub mod workflow;
