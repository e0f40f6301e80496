//! Async work that completes an action
//!
//! Stores are single-threaded, so asynchronous work runs on the tokio runtime
//! and only its *outcome* travels back to the owning thread. The thread that
//! owns the dispatcher applies outcomes with [`TaskManager::complete`] (or
//! [`TaskManager::drain_ready`]), which dispatches the action's `success` or
//! `error` completion with the produced payload.
//!
//! - Spawning with a key that is already running cancels the previous task
//! - Debounced spawns wait before running and reset on each call
//! - Outcomes of replaced or cancelled tasks are dropped
//!
//! # Example
//!
//! ```ignore
//! use boutique::tasks::TaskManager;
//! use serde_json::json;
//!
//! let mut tasks = TaskManager::new();
//! tasks.spawn("login", &actions["login"], async move {
//!     match api::login(&user).await {
//!         Ok(token) => Ok(json!({ "token": token })),
//!         Err(e) => Err(json!(e.to_string())),
//!     }
//! });
//!
//! while let Some(done) = tasks.next().await {
//!     tasks.complete(done)?;
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, trace};

use crate::action::{Action, Payload};
use crate::error::Result;

/// Result a task resolves to: `Ok` dispatches `success`, `Err` dispatches `error`
pub type Outcome = std::result::Result<Payload, Payload>;

/// Identifies a task for cancellation and replacement.
///
/// Tasks with the same key are mutually exclusive: spawning a new task
/// with a key that's already running cancels the existing one.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct TaskKey(String);

impl TaskKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for TaskKey {
    fn from(s: &'static str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Outcome of a finished task, waiting to be applied
#[derive(Debug)]
pub struct Completion {
    key: TaskKey,
    generation: u64,
    outcome: Outcome,
}

impl Completion {
    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }
}

struct Running {
    action: Action,
    generation: u64,
    handle: AbortHandle,
}

/// Runs keyed tasks and routes their outcomes to completion sub-actions
pub struct TaskManager {
    tasks: HashMap<TaskKey, Running>,
    generation: u64,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TaskManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskManager")
            .field("running", &self.tasks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TaskManager {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tasks: HashMap::new(),
            generation: 0,
            tx,
            rx,
        }
    }

    /// Spawn a task completing `action`, cancelling any task with the same key.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&mut self, key: impl Into<TaskKey>, action: &Action, future: F) -> &mut Self
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.start(key.into(), action, None, future)
    }

    /// Spawn after `duration` of quiet; calling again with the same key resets the timer.
    pub fn debounce<F>(
        &mut self,
        key: impl Into<TaskKey>,
        action: &Action,
        duration: Duration,
        future: F,
    ) -> &mut Self
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.start(key.into(), action, Some(duration), future)
    }

    fn start<F>(
        &mut self,
        key: TaskKey,
        action: &Action,
        delay: Option<Duration>,
        future: F,
    ) -> &mut Self
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.cancel(&key);
        self.generation += 1;
        let generation = self.generation;

        let tx = self.tx.clone();
        let task_key = key.clone();
        let handle: JoinHandle<()> = tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            let outcome = future.await;
            let _ = tx.send(Completion {
                key: task_key,
                generation,
                outcome,
            });
        });

        trace!(task = %key.name(), action = %action.name(), "task spawned");
        self.tasks.insert(
            key,
            Running {
                action: action.clone(),
                generation,
                handle: handle.abort_handle(),
            },
        );
        self
    }

    /// Wait for the next finished task
    pub async fn next(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }

    /// Dispatch the completion sub-action for a finished task
    ///
    /// Returns `Ok(false)` when the task was cancelled or replaced since it
    /// finished; nothing is dispatched then.
    pub fn complete(&mut self, completion: Completion) -> Result<bool> {
        let current = self
            .tasks
            .get(&completion.key)
            .is_some_and(|running| running.generation == completion.generation);
        if !current {
            debug!(task = %completion.key.name(), "dropping stale task outcome");
            return Ok(false);
        }
        let Some(running) = self.tasks.remove(&completion.key) else {
            return Ok(false);
        };

        let (kind, payload) = match completion.outcome {
            Ok(payload) => ("success", payload),
            Err(payload) => ("error", payload),
        };
        match running.action.completion(kind) {
            Some(target) => target.dispatch(payload)?,
            None => {
                debug!(action = %running.action.name(), kind, "action has no such completion")
            }
        }
        Ok(true)
    }

    /// Apply every outcome that is already available; returns how many dispatched
    pub fn drain_ready(&mut self) -> Result<usize> {
        let mut applied = 0;
        while let Ok(completion) = self.rx.try_recv() {
            if self.complete(completion)? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    /// Cancel a task by key; no-op if it is not running
    pub fn cancel(&mut self, key: &TaskKey) {
        if let Some(running) = self.tasks.remove(key) {
            running.handle.abort();
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, running) in self.tasks.drain() {
            running.handle.abort();
        }
    }

    /// Whether `key` has a task whose outcome has not been applied yet
    pub fn is_running(&self, key: &TaskKey) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn running_keys(&self) -> impl Iterator<Item = &TaskKey> {
        self.tasks.keys()
    }
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
