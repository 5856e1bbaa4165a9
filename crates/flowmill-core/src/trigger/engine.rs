//! The trigger engine: registered triggers and their firing policy.
//!
//! Owns three vectors of registered triggers (cron, file-watch, manual)
//! plus an index from watched path to file-watch entries. Fires are pushed
//! into a bounded channel; if the queue is full the fire is dropped with a
//! warning rather than blocking the driver.
//!
//! All mutation happens on the driver thread; the engine itself is not
//! shared.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tokio::sync::mpsc;

use super::cron::CronExpression;
use super::TriggerFired;

/// Filesystem event kinds a file-watch trigger can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileEventKind {
    Created,
    Modified,
    Deleted,
}

impl FileEventKind {
    /// Parse a JCWF event keyword (case-insensitive).
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword.to_ascii_lowercase().as_str() {
            "created" => Some(Self::Created),
            "modified" => Some(Self::Modified),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

struct CronTriggerInstance {
    workflow_id: String,
    trigger_id: String,
    enabled: bool,
    /// `None` when the expression failed to parse; the record is kept but
    /// never fires.
    expression: Option<CronExpression>,
    next_fire: DateTime<Local>,
}

struct FileWatchTriggerInstance {
    workflow_id: String,
    trigger_id: String,
    enabled: bool,
    path: PathBuf,
    events: Vec<FileEventKind>,
    debounce: Duration,
    /// Monotonic timestamp of the last fire; `None` until the first one.
    last_fire: Option<Instant>,
}

struct ManualTriggerInstance {
    workflow_id: String,
    trigger_id: String,
    enabled: bool,
}

/// Registers triggers and turns time and file events into run activations.
pub struct TriggerEngine {
    fired_tx: mpsc::Sender<TriggerFired>,
    cron_triggers: Vec<CronTriggerInstance>,
    file_watch_triggers: Vec<FileWatchTriggerInstance>,
    manual_triggers: Vec<ManualTriggerInstance>,
    file_watch_index: HashMap<PathBuf, Vec<usize>>,
}

impl TriggerEngine {
    /// Create an engine that pushes fired events into `fired_tx`.
    pub fn new(fired_tx: mpsc::Sender<TriggerFired>) -> Self {
        Self {
            fired_tx,
            cron_triggers: Vec::new(),
            file_watch_triggers: Vec::new(),
            manual_triggers: Vec::new(),
            file_watch_index: HashMap::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Auto triggers start their workflow immediately upon registration.
    pub fn add_auto(&mut self, workflow_id: &str, trigger_id: &str, enabled: bool) {
        tracing::info!(workflow = workflow_id, trigger = trigger_id, "registered auto trigger");

        if !enabled {
            tracing::info!(workflow = workflow_id, trigger = trigger_id, "auto trigger disabled, not firing");
            return;
        }

        self.fire(workflow_id, trigger_id);
    }

    /// Register a cron trigger. An unparseable expression is stored but
    /// marked disabled.
    pub fn add_cron(&mut self, workflow_id: &str, trigger_id: &str, expression: &str, enabled: bool) {
        let mut instance = CronTriggerInstance {
            workflow_id: workflow_id.to_string(),
            trigger_id: trigger_id.to_string(),
            enabled,
            expression: None,
            next_fire: Local::now(),
        };

        match CronExpression::parse(expression) {
            Ok(parsed) => {
                instance.next_fire = parsed.next_fire(Local::now());
                instance.expression = Some(parsed);
            }
            Err(e) => {
                tracing::error!(
                    workflow = workflow_id,
                    trigger = trigger_id,
                    error = %e,
                    "failed to parse cron expression, trigger disabled"
                );
                instance.enabled = false;
            }
        }

        self.cron_triggers.push(instance);
        tracing::info!(workflow = workflow_id, trigger = trigger_id, "registered cron trigger");
    }

    pub fn add_file_watch(
        &mut self,
        workflow_id: &str,
        trigger_id: &str,
        path: PathBuf,
        events: Vec<FileEventKind>,
        debounce_ms: u64,
        enabled: bool,
    ) {
        let index = self.file_watch_triggers.len();
        self.file_watch_index
            .entry(path.clone())
            .or_default()
            .push(index);

        self.file_watch_triggers.push(FileWatchTriggerInstance {
            workflow_id: workflow_id.to_string(),
            trigger_id: trigger_id.to_string(),
            enabled,
            path,
            events,
            debounce: Duration::from_millis(debounce_ms),
            last_fire: None,
        });

        tracing::info!(workflow = workflow_id, trigger = trigger_id, "registered file-watch trigger");
    }

    pub fn add_manual(&mut self, workflow_id: &str, trigger_id: &str, enabled: bool) {
        self.manual_triggers.push(ManualTriggerInstance {
            workflow_id: workflow_id.to_string(),
            trigger_id: trigger_id.to_string(),
            enabled,
        });

        tracing::info!(workflow = workflow_id, trigger = trigger_id, "registered manual trigger");
    }

    /// Remove all triggers of a workflow and rebuild the path index.
    pub fn clear_workflow_triggers(&mut self, workflow_id: &str) {
        tracing::info!(workflow = workflow_id, "clearing workflow triggers");

        self.cron_triggers.retain(|t| t.workflow_id != workflow_id);
        self.manual_triggers.retain(|t| t.workflow_id != workflow_id);
        self.file_watch_triggers
            .retain(|t| t.workflow_id != workflow_id);

        self.file_watch_index.clear();
        for (index, trigger) in self.file_watch_triggers.iter().enumerate() {
            self.file_watch_index
                .entry(trigger.path.clone())
                .or_default()
                .push(index);
        }
    }

    // -----------------------------------------------------------------------
    // Evaluation
    // -----------------------------------------------------------------------

    /// Fire every enabled cron trigger whose next fire time has passed, and
    /// recompute its next fire time from `now`. Missing several windows
    /// while stalled produces a single fire.
    ///
    /// An expression with no reachable fire time (`next_fire` returns its
    /// reference, e.g. a calendar-impossible date like February 30th) is
    /// disabled instead of fired, so it cannot re-fire on every tick.
    pub fn tick(&mut self, now: DateTime<Local>) {
        let mut fires = Vec::new();

        for instance in &mut self.cron_triggers {
            if !instance.enabled {
                continue;
            }
            let Some(expression) = &instance.expression else {
                continue;
            };

            if instance.next_fire <= now {
                let next = expression.next_fire(now);
                if next <= now {
                    tracing::warn!(
                        workflow = instance.workflow_id.as_str(),
                        trigger = instance.trigger_id.as_str(),
                        "cron expression has no future fire time, disabling trigger"
                    );
                    instance.enabled = false;
                    continue;
                }

                instance.next_fire = next;
                fires.push((instance.workflow_id.clone(), instance.trigger_id.clone()));
            }
        }

        for (workflow_id, trigger_id) in fires {
            self.fire(&workflow_id, &trigger_id);
        }
    }

    /// Route one filesystem event to the file-watch triggers on that exact
    /// path. A trigger fires when it never fired before or the debounce
    /// interval has elapsed on the monotonic clock.
    pub fn notify_file_event(&mut self, path: &Path, kind: FileEventKind, now: Instant) {
        let Some(indices) = self.file_watch_index.get(path) else {
            return;
        };

        let mut fires = Vec::new();

        for &index in indices {
            let Some(instance) = self.file_watch_triggers.get_mut(index) else {
                continue;
            };
            if !instance.enabled || !instance.events.contains(&kind) {
                continue;
            }

            let can_fire = match instance.last_fire {
                None => true,
                Some(last) => now.saturating_duration_since(last) >= instance.debounce,
            };

            if can_fire {
                instance.last_fire = Some(now);
                fires.push((instance.workflow_id.clone(), instance.trigger_id.clone()));
            }
        }

        for (workflow_id, trigger_id) in fires {
            self.fire(&workflow_id, &trigger_id);
        }
    }

    /// Fire the first enabled manual trigger matching the pair, or warn.
    pub fn fire_manual(&mut self, workflow_id: &str, trigger_id: &str) {
        let matched = self.manual_triggers.iter().any(|t| {
            t.enabled && t.workflow_id == workflow_id && t.trigger_id == trigger_id
        });

        if matched {
            self.fire(workflow_id, trigger_id);
        } else {
            tracing::warn!(
                workflow = workflow_id,
                trigger = trigger_id,
                "manual trigger not found or disabled"
            );
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    /// All paths with at least one file-watch trigger, for wiring the
    /// filesystem event source.
    pub fn watched_paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.file_watch_index.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn cron_count(&self) -> usize {
        self.cron_triggers.len()
    }

    pub fn file_watch_count(&self) -> usize {
        self.file_watch_triggers.len()
    }

    pub fn manual_count(&self) -> usize {
        self.manual_triggers.len()
    }

    // -----------------------------------------------------------------------
    // Firing
    // -----------------------------------------------------------------------

    fn fire(&self, workflow_id: &str, trigger_id: &str) {
        tracing::info!(workflow = workflow_id, trigger = trigger_id, "firing trigger");

        let event = TriggerFired {
            workflow_id: workflow_id.to_string(),
            trigger_id: trigger_id.to_string(),
        };

        if self.fired_tx.try_send(event).is_err() {
            tracing::warn!(
                workflow = workflow_id,
                trigger = trigger_id,
                "trigger queue full or closed, dropping fire"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
