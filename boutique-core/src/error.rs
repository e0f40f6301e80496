//! Error types for registry, binding and dispatch failures

/// Errors produced by `boutique`
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    InvalidName(#[from] InvalidNameError),

    #[error(transparent)]
    OrderingCycle(#[from] OrderingCycleError),

    /// The store's shape is already borrowed by a handler further up the call stack.
    #[error("store `{store}` is still handling an action and cannot run `{operation}`")]
    StoreBusy { store: String, operation: String },

    #[error("action `{action}` was created by a different dispatcher")]
    ForeignAction { action: String },

    #[error("store `{store}` has no method `{method}`")]
    UnknownMethod { store: String, method: String },

    #[error("invalid dispatcher config: {0}")]
    Config(#[from] serde_json::Error),

    /// Failure reported by user handler code.
    #[error("handler failed: {0}")]
    Handler(String),
}

impl Error {
    /// Build a handler failure from any displayable message
    pub fn handler(message: impl std::fmt::Display) -> Self {
        Self::Handler(message.to_string())
    }
}

/// Malformed or duplicate action name, raised at registry time
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidNameError {
    #[error("action name must not be empty")]
    Empty,

    #[error("action `{0}` is declared more than once")]
    Duplicate(String),

    #[error("action name `{0}` is not a valid identifier")]
    NotIdentifier(String),
}

/// `wait_for` could not be satisfied for the current dispatch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderingCycleError {
    /// `wait_for` was called while the store was not reacting to an action.
    #[error("store `{store}` called wait_for outside of an active dispatch")]
    OutsideDispatch { store: String },

    /// The awaited store is itself waiting, directly or transitively.
    #[error("circular wait_for while dispatching `{action}`: {}", chain.join(" -> "))]
    Cycle { action: String, chain: Vec<String> },
}

pub type Result<T> = std::result::Result<T, Error>;

/// Return type of store handlers
pub type HandlerResult = Result<()>;
