//! Host integration for flowmill.
//!
//! Everything that touches the machine lives here: engine configuration
//! loading and checking, the `notify`-based filesystem event source, and
//! the process-spawning task executors (shell, python). The core engine
//! consumes these only through its own interfaces.

pub mod config;
pub mod executor;
pub mod watcher;
