//! Advisory diagnostics
//!
//! Warnings never change dispatch outcome. They are logged through `tracing`
//! and handed to any sink registered with `Dispatcher::on_warning`.

use std::fmt;
use std::rc::Rc;

/// Callback receiving dispatcher warnings
pub type WarningSink = Rc<dyn Fn(&Warning)>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A binding named a handler the store does not define.
    ///
    /// `fallback` is the bare method that was bound instead, if one existed.
    MissingHandler {
        store: String,
        action: String,
        handler: String,
        fallback: Option<String>,
    },
    /// A bound handler was invoked directly rather than through its action.
    DirectHandlerCall { store: String, handler: String },
}

impl Warning {
    pub fn store(&self) -> &str {
        match self {
            Warning::MissingHandler { store, .. } | Warning::DirectHandlerCall { store, .. } => {
                store
            }
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MissingHandler {
                store,
                action,
                handler,
                fallback: Some(fallback),
            } => write!(
                f,
                "{store}: no handler `{handler}` for action `{action}`, bound `{fallback}` instead"
            ),
            Warning::MissingHandler {
                store,
                action,
                handler,
                fallback: None,
            } => write!(
                f,
                "{store}: no handler `{handler}` for action `{action}`, binding ignored"
            ),
            Warning::DirectHandlerCall { store, handler } => write!(
                f,
                "{store}: `{handler}` is an action handler; dispatch its action instead of calling it"
            ),
        }
    }
}
