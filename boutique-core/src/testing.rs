//! Test utilities for boutique stores
//!
//! - [`ListenerSpy`]: a change listener that records every notification
//! - [`WarningRecorder`]: captures dispatcher warnings
//! - [`CallLog`]: shared, ordered log for asserting handler order
//! - Assertion macros for recorded warnings
//!
//! # Example
//!
//! ```
//! use boutique_core::testing::ListenerSpy;
//! use boutique_core::{Dispatcher, ObjectShape};
//! use serde_json::json;
//!
//! let dispatcher = Dispatcher::new();
//! let store = dispatcher.create_store(ObjectShape::new("Counter")).unwrap();
//! let spy = ListenerSpy::new();
//! store.listen(spy.listener());
//!
//! store.set_state(json!({ "count": 1 }));
//! assert!(spy.called_once());
//! assert_eq!(spy.last().unwrap()["count"], json!(1));
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use crate::store::{Listener, State};
use crate::warning::Warning;
use crate::Dispatcher;

/// Change listener that records the state passed to each call
///
/// [`listener`](Self::listener) always returns the same `Rc`, so it can be
/// registered and removed repeatedly.
#[derive(Clone)]
pub struct ListenerSpy {
    calls: Rc<RefCell<Vec<State>>>,
    listener: Listener,
}

impl ListenerSpy {
    pub fn new() -> Self {
        let calls: Rc<RefCell<Vec<State>>> = Rc::default();
        let sink = calls.clone();
        let listener: Listener = Rc::new(move |state: &State| sink.borrow_mut().push(state.clone()));
        Self { calls, listener }
    }

    pub fn listener(&self) -> Listener {
        self.listener.clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn called_once(&self) -> bool {
        self.call_count() == 1
    }

    pub fn not_called(&self) -> bool {
        self.call_count() == 0
    }

    /// State passed to the most recent call
    pub fn last(&self) -> Option<State> {
        self.calls.borrow().last().cloned()
    }

    pub fn calls(&self) -> Vec<State> {
        self.calls.borrow().clone()
    }

    pub fn reset(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl Default for ListenerSpy {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ListenerSpy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerSpy")
            .field("calls", &self.call_count())
            .finish()
    }
}

/// Collects warnings emitted by a dispatcher
#[derive(Debug, Clone, Default)]
pub struct WarningRecorder {
    warnings: Rc<RefCell<Vec<Warning>>>,
}

impl WarningRecorder {
    /// Register a recorder as a warning sink of `dispatcher`
    pub fn install(dispatcher: &Dispatcher) -> Self {
        let recorder = Self::default();
        let sink = recorder.warnings.clone();
        dispatcher.on_warning(move |warning| sink.borrow_mut().push(warning.clone()));
        recorder
    }

    pub fn count(&self) -> usize {
        self.warnings.borrow().len()
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.borrow().clone()
    }

    /// Take recorded warnings, leaving the recorder empty
    pub fn drain(&self) -> Vec<Warning> {
        std::mem::take(&mut *self.warnings.borrow_mut())
    }
}

/// Shared append-only log of strings
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Rc<RefCell<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        self.entries.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

/// Assert that a warning matching a pattern was recorded.
///
/// # Example
///
/// ```ignore
/// use boutique::testing::{assert_warned, WarningRecorder};
///
/// let warnings = WarningRecorder::install(&dispatcher);
/// // ... bind a store with a missing handler
/// assert_warned!(warnings, Warning::MissingHandler { fallback: None, .. });
/// ```
#[macro_export]
macro_rules! assert_warned {
    ($recorder:expr, $pattern:pat $(if $guard:expr)?) => {
        let warnings = $recorder.warnings();
        assert!(
            warnings.iter().any(|w| matches!(w, $pattern $(if $guard)?)),
            "Expected warning matching `{}`, but got: {:?}",
            stringify!($pattern),
            warnings
        );
    };
}

/// Assert that no warning matching a pattern was recorded.
#[macro_export]
macro_rules! assert_not_warned {
    ($recorder:expr, $pattern:pat $(if $guard:expr)?) => {
        let warnings = $recorder.warnings();
        assert!(
            !warnings.iter().any(|w| matches!(w, $pattern $(if $guard)?)),
            "Expected no warning matching `{}`, but got: {:?}",
            stringify!($pattern),
            warnings
        );
    };
}

/// Count recorded warnings matching a pattern.
///
/// ```ignore
/// assert_eq!(count_warnings!(warnings, Warning::DirectHandlerCall { .. }), 2);
/// ```
#[macro_export]
macro_rules! count_warnings {
    ($recorder:expr, $pattern:pat $(if $guard:expr)?) => {
        $recorder
            .warnings()
            .iter()
            .filter(|w| matches!(w, $pattern $(if $guard)?))
            .count()
    };
}

pub use crate::{assert_not_warned, assert_warned, count_warnings};
