//! Runtime aggregate and the driver loop.
//!
//! A single [`Runtime`] owns the registry, orchestrator, executor registry,
//! and trigger engine; there are no process-wide singletons. The driver
//! loop ticks the trigger engine, forwards filesystem events, drains fired
//! triggers into `run_once`, and sleeps the configured interval. The first
//! interrupt requests cooperative shutdown; a second one exits hard.

use std::sync::Arc;

use tokio::sync::mpsc;

use flowmill_core::executor::internal::InternalTaskExecutor;
use flowmill_core::executor::ExecutorRegistry;
use flowmill_core::trigger::{binder, TriggerEngine, TriggerFired};
use flowmill_core::{WorkflowOrchestrator, WorkflowRegistry};
use flowmill_infra::executor::{PythonTaskExecutor, ShellTaskExecutor};
use flowmill_infra::watcher::{self, FileEvent, WatcherHandle};
use flowmill_types::config::EngineConfig;
use flowmill_types::workflow::TaskKind;

/// Capacity of the fired-trigger and file-event queues.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Everything the engine needs for one serve session.
pub struct Runtime {
    config: EngineConfig,
    registry: Arc<WorkflowRegistry>,
    orchestrator: WorkflowOrchestrator,
    trigger_engine: TriggerEngine,
    fired_rx: mpsc::Receiver<TriggerFired>,
    file_events_rx: mpsc::Receiver<FileEvent>,
    _watcher: Option<WatcherHandle>,
}

impl Runtime {
    /// Load workflows, validate, register executors and triggers, start the
    /// filesystem watcher.
    pub fn init(config: EngineConfig) -> anyhow::Result<Self> {
        let mut registry = WorkflowRegistry::new();
        let loaded = registry.load_directory(&config.workflows_folder)?;
        tracing::info!(count = loaded, "workflows loaded");

        if !registry.validate_all() {
            tracing::warn!("one or more workflows failed validation and will refuse to run");
        }
        let registry = Arc::new(registry);

        let mut executors = ExecutorRegistry::new();
        executors.register(TaskKind::Shell, Arc::new(ShellTaskExecutor::new()));
        executors.register(TaskKind::Python, Arc::new(PythonTaskExecutor::new()));
        executors.register(TaskKind::Internal, Arc::new(InternalTaskExecutor::new()));
        // ai_call stays unregistered until an API-backed executor exists;
        // dispatching one fails that task with a recorded error.

        let orchestrator = WorkflowOrchestrator::new(Arc::clone(&registry), Arc::new(executors));

        let (fired_tx, fired_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let mut trigger_engine = TriggerEngine::new(fired_tx);
        binder::register_all(&registry, &mut trigger_engine);

        let (file_events_tx, file_events_rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
        let mut watch_paths = trigger_engine.watched_paths();
        watch_paths.push(config.queue_folder.clone());

        let watcher = match watcher::start_watcher(&watch_paths, file_events_tx) {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::error!(error = %e, "file watcher unavailable, file triggers will not fire");
                None
            }
        };

        Ok(Self {
            config,
            registry,
            orchestrator,
            trigger_engine,
            fired_rx,
            file_events_rx,
            _watcher: watcher,
        })
    }

    /// One driver iteration: cron tick, file events, fired triggers.
    pub async fn tick(&mut self) {
        self.trigger_engine.tick(chrono::Local::now());

        while let Ok(event) = self.file_events_rx.try_recv() {
            self.trigger_engine
                .notify_file_event(&event.path, event.kind, event.at);
        }

        while let Ok(fired) = self.fired_rx.try_recv() {
            tracing::info!(
                workflow = fired.workflow_id.as_str(),
                trigger = fired.trigger_id.as_str(),
                "trigger fired"
            );

            if !self.orchestrator.run_once(&fired.workflow_id, None).await {
                tracing::error!(
                    workflow = fired.workflow_id.as_str(),
                    trigger = fired.trigger_id.as_str(),
                    "triggered workflow run failed"
                );
            }
        }
    }
}

/// Run the engine until interrupted.
pub async fn serve(config: EngineConfig) -> anyhow::Result<()> {
    let mut runtime = Runtime::init(config)?;
    let sleep = runtime.config.sleep_duration();

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("shutdown requested, finishing current work");
            let _ = shutdown_tx.send(true);
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::error!("second interrupt, exiting immediately");
            std::process::exit(130);
        }
    });

    tracing::info!(workflows = runtime.registry.ids().len(), "engine loop started");

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        runtime.tick().await;

        tokio::select! {
            _ = shutdown_rx.changed() => {}
            _ = tokio::time::sleep(sleep) => {}
        }
    }

    tracing::info!("engine stopped");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use flowmill_types::workflow::{RunState, TaskState};

    fn test_config(dir: &std::path::Path) -> EngineConfig {
        let queue = dir.join("queue");
        let workflows = dir.join("workflows");
        std::fs::create_dir_all(&queue).unwrap();
        std::fs::create_dir_all(&workflows).unwrap();

        serde_json::from_str(&format!(
            r#"{{ "queue folder": "{}", "workflows folder": "{}" }}"#,
            queue.display(),
            workflows.display()
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn auto_triggered_workflow_runs_on_first_tick() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        // No triggers key: the parser synthesizes an enabled auto trigger.
        std::fs::write(
            config.workflows_folder.join("hello.jcwf"),
            r#"{ "version": "1.0", "id": "hello",
                 "tasks": { "greet": { "type": "internal" } } }"#,
        )
        .unwrap();

        let mut runtime = Runtime::init(config).unwrap();
        assert!(runtime.registry.has("hello"));

        runtime.tick().await;

        let run = runtime.orchestrator.last_run("hello").expect("auto trigger should have run");
        assert_eq!(run.state, RunState::Succeeded);
        assert_eq!(run.task_states["greet"].state, TaskState::Succeeded);
    }

    #[tokio::test]
    async fn invalid_workflow_is_loaded_but_refuses_to_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());

        std::fs::write(
            config.workflows_folder.join("cyclic.jcwf"),
            r#"{ "version": "1.0", "id": "cyclic",
                 "tasks": {
                     "x": { "type": "internal", "depends_on": ["y"] },
                     "y": { "type": "internal", "depends_on": ["x"] }
                 } }"#,
        )
        .unwrap();

        let mut runtime = Runtime::init(config).unwrap();
        assert!(runtime.registry.has("cyclic"));
        assert!(!runtime.registry.is_valid("cyclic"));

        // The synthesized auto trigger fires, but run_once refuses.
        runtime.tick().await;
        assert!(runtime.orchestrator.last_run("cyclic").is_none());
    }
}
