//! Action logging with pattern-based filtering and in-memory storage
//!
//! [`ActionLoggerMiddleware`] logs dispatched actions through `tracing` and,
//! optionally, records them in an [`ActionLog`] ring buffer that can be
//! inspected after the fact. Glob patterns select which action names are
//! logged; completions are matched by their full name (`login.success`).
//!
//! # Example
//!
//! ```
//! use boutique_core::log::{ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
//! use boutique_core::{generate_actions, Dispatcher};
//!
//! let logger = ActionLoggerMiddleware::with_log(ActionLogConfig::new(
//!     50,
//!     ActionLoggerConfig::new(None, Some("*.progress")),
//! ));
//!
//! let dispatcher = Dispatcher::new();
//! dispatcher.add_middleware(logger.clone());
//! let actions = dispatcher.create_actions(generate_actions(["login"]).unwrap()).unwrap();
//! actions["login"].dispatch("ada").unwrap();
//!
//! let log = logger.log().unwrap();
//! let entry = log.entries().next().unwrap();
//! assert_eq!(entry.name, "login");
//! assert_eq!(entry.succeeded, Some(true));
//! ```

use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use crate::action::{Action, Payload};
use crate::middleware::Middleware;

/// Configuration for action logging with glob pattern filtering.
///
/// Patterns support:
/// - `*` matches any sequence of characters
/// - `?` matches any single character
/// - Literal text matches exactly
///
/// # Examples
///
/// - `login*` matches login, login.success, login.error
/// - `*.error` matches the error completion of every action
/// - `fetch?` matches fetchA but not fetch
#[derive(Debug, Clone, Default)]
pub struct ActionLoggerConfig {
    /// If non-empty, only log actions matching these patterns
    pub include_patterns: Vec<String>,
    /// Exclude actions matching these patterns (applied after include)
    pub exclude_patterns: Vec<String>,
}

impl ActionLoggerConfig {
    /// Create a new config from comma-separated pattern strings
    ///
    /// ```
    /// use boutique_core::log::ActionLoggerConfig;
    ///
    /// let config = ActionLoggerConfig::new(Some("login*,logout"), Some("*.error"));
    /// assert!(config.should_log("login.success"));
    /// assert!(config.should_log("logout"));
    /// assert!(!config.should_log("login.error"));
    /// ```
    pub fn new(include: Option<&str>, exclude: Option<&str>) -> Self {
        Self {
            include_patterns: include.map(split_patterns).unwrap_or_default(),
            exclude_patterns: exclude.map(split_patterns).unwrap_or_default(),
        }
    }

    pub fn with_patterns(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include_patterns: include,
            exclude_patterns: exclude,
        }
    }

    /// Check if an action name should be logged based on include/exclude patterns
    pub fn should_log(&self, action_name: &str) -> bool {
        if !self.include_patterns.is_empty()
            && !self
                .include_patterns
                .iter()
                .any(|p| glob_match(p, action_name))
        {
            return false;
        }

        !self
            .exclude_patterns
            .iter()
            .any(|p| glob_match(p, action_name))
    }
}

fn split_patterns(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// In-Memory Action Log
// ============================================================================

/// An entry in the action log
#[derive(Debug, Clone)]
pub struct ActionLogEntry {
    /// Action name, `login` or `login.success`
    pub name: String,
    /// Payload as compact JSON
    pub payload: String,
    pub timestamp: Instant,
    /// Sequence number for ordering
    pub sequence: u64,
    /// Nesting level: 0 for a top-level dispatch
    pub depth: usize,
    /// Number of stores the action reached (set once dispatch finished)
    pub handled: Option<usize>,
    /// Whether the dispatch completed without error (set once dispatch finished)
    pub succeeded: Option<bool>,
}

impl ActionLogEntry {
    pub fn new(name: impl Into<String>, payload: String, sequence: u64, depth: usize) -> Self {
        Self {
            name: name.into(),
            payload,
            timestamp: Instant::now(),
            sequence,
            depth,
            handled: None,
            succeeded: None,
        }
    }

    pub fn elapsed(&self) -> std::time::Duration {
        self.timestamp.elapsed()
    }

    /// Format the elapsed time for display (e.g., "2.3s", "150ms")
    pub fn elapsed_display(&self) -> String {
        let elapsed = self.elapsed();
        if elapsed.as_secs() >= 1 {
            format!("{:.1}s", elapsed.as_secs_f64())
        } else {
            format!("{}ms", elapsed.as_millis())
        }
    }
}

/// Configuration for the action log ring buffer
#[derive(Debug, Clone)]
pub struct ActionLogConfig {
    /// Maximum number of entries to keep
    pub capacity: usize,
    pub filter: ActionLoggerConfig,
}

impl Default for ActionLogConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            filter: ActionLoggerConfig::default(),
        }
    }
}

impl ActionLogConfig {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    pub fn new(capacity: usize, filter: ActionLoggerConfig) -> Self {
        Self { capacity, filter }
    }
}

/// In-memory ring buffer of recent dispatches
///
/// Older entries are discarded when capacity is reached.
#[derive(Debug, Clone)]
pub struct ActionLog {
    entries: VecDeque<ActionLogEntry>,
    config: ActionLogConfig,
    next_sequence: u64,
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(ActionLogConfig::default())
    }
}

impl ActionLog {
    pub fn new(config: ActionLogConfig) -> Self {
        Self {
            entries: VecDeque::with_capacity(config.capacity),
            config,
            next_sequence: 0,
        }
    }

    /// Record a dispatch if it passes the filter; returns its sequence number
    pub fn record(&mut self, name: &str, payload: &Payload, depth: usize) -> Option<u64> {
        if !self.config.filter.should_log(name) {
            return None;
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        if self.entries.len() >= self.config.capacity {
            self.entries.pop_front();
        }
        self.entries
            .push_back(ActionLogEntry::new(name, payload.to_string(), sequence, depth));
        Some(sequence)
    }

    /// Fill in the outcome of a recorded dispatch, if it is still buffered
    pub fn finish(&mut self, sequence: u64, handled: usize, succeeded: bool) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .rev()
            .find(|e| e.sequence == sequence)
        {
            entry.handled = Some(handled);
            entry.succeeded = Some(succeeded);
        }
    }

    /// All entries (oldest first)
    pub fn entries(&self) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter()
    }

    /// The most recent N entries (newest first)
    pub fn recent(&self, count: usize) -> impl Iterator<Item = &ActionLogEntry> {
        self.entries.iter().rev().take(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn config(&self) -> &ActionLogConfig {
        &self.config
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Middleware that logs actions with configurable pattern filtering.
///
/// Supports two modes:
/// - **Tracing only** (default): logs via `tracing::debug!()`
/// - **With storage**: also records into a shared [`ActionLog`]
///
/// Clones share the same log, so keep a clone after handing one to
/// `Dispatcher::add_middleware` to read it back.
#[derive(Debug, Clone)]
pub struct ActionLoggerMiddleware {
    config: ActionLoggerConfig,
    log: Option<Rc<RefCell<ActionLog>>>,
    /// Sequence numbers of in-flight dispatches, innermost last
    open: Vec<Option<u64>>,
    active: bool,
}

impl ActionLoggerMiddleware {
    /// Tracing only, no in-memory storage
    pub fn new(config: ActionLoggerConfig) -> Self {
        Self {
            config,
            log: None,
            open: Vec::new(),
            active: true,
        }
    }

    pub fn with_log(config: ActionLogConfig) -> Self {
        Self {
            config: config.filter.clone(),
            log: Some(Rc::new(RefCell::new(ActionLog::new(config)))),
            open: Vec::new(),
            active: true,
        }
    }

    pub fn with_default_log() -> Self {
        Self::with_log(ActionLogConfig::default())
    }

    pub fn log_all() -> Self {
        Self::new(ActionLoggerConfig::default())
    }

    /// Set whether the middleware is active.
    ///
    /// When inactive, both hooks return immediately. Useful for conditional
    /// logging based on CLI flags.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The action log (if storage is enabled)
    pub fn log(&self) -> Option<Ref<'_, ActionLog>> {
        self.log.as_ref().map(|log| log.borrow())
    }

    pub fn config(&self) -> &ActionLoggerConfig {
        &self.config
    }
}

impl Middleware for ActionLoggerMiddleware {
    fn before(&mut self, action: &Action, payload: &Payload) {
        if !self.active {
            return;
        }

        let name = action.name();
        if self.config.should_log(name) {
            tracing::debug!(action = %name, %payload, "action");
        }

        let depth = self.open.len();
        let sequence = self
            .log
            .as_ref()
            .and_then(|log| log.borrow_mut().record(name, payload, depth));
        self.open.push(sequence);
    }

    fn after(&mut self, _action: &Action, handled: usize, succeeded: bool) {
        if !self.active {
            return;
        }

        // Only dispatches that were recorded get their outcome filled in
        if let (Some(Some(sequence)), Some(log)) = (self.open.pop(), &self.log) {
            log.borrow_mut().finish(sequence, handled, succeeded);
        }
    }
}

/// Simple glob pattern matching supporting `*` and `?`.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let mut pi = 0;
    let mut ti = 0;
    let mut star_pi = None;
    let mut star_ti = 0;

    while ti < text.len() {
        if pi < pattern.len() && (pattern[pi] == '?' || pattern[pi] == text[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < pattern.len() && pattern[pi] == '*' {
            star_pi = Some(pi);
            star_ti = ti;
            pi += 1;
        } else if let Some(spi) = star_pi {
            pi = spi + 1;
            star_ti += 1;
            ti = star_ti;
        } else {
            return false;
        }
    }

    while pi < pattern.len() && pattern[pi] == '*' {
        pi += 1;
    }

    pi == pattern.len()
}
