//! Core types for boutique
//!
//! This crate provides the runtime of a Flux-style data layer: named actions
//! dispatched synchronously to observable stores, with batched change
//! notifications and explicit ordering between stores.
//!
//! # Core Concepts
//!
//! - **Action**: a named, callable identity with `success`/`error` completions
//! - **Dispatcher**: owns the action → store graph and creates actions and stores
//! - **Store**: JSON-object state, listeners, and bindings from actions to methods
//! - **Shape**: the user value behind a store, exposing a method table
//! - **Batching**: one change notification per store per dispatch or batch region
//!
//! # Basic Example
//!
//! ```
//! use boutique_core::prelude::*;
//! use serde_json::json;
//!
//! let dispatcher = Dispatcher::new();
//! let actions = dispatcher.create_actions(generate_actions(["login", "logout"])?)?;
//!
//! let bound = actions.clone();
//! let session = dispatcher.create_store(
//!     ObjectShape::new("Session")
//!         .initial_state(json!({ "user": null }))
//!         .method("onLogin", |_, store, payload| {
//!             store.set_state(json!({ "user": payload }));
//!             Ok(())
//!         })
//!         .method("onLogout", |_, store, _| {
//!             store.set_state(json!({ "user": null }));
//!             Ok(())
//!         })
//!         .constructor(move |_, store| store.bind_actions(&bound)),
//! )?;
//!
//! session.listen(listener(|state| println!("session: {state:?}")));
//!
//! actions["login"].dispatch("ada")?;
//! assert_eq!(session.get("user"), Some(json!("ada")));
//!
//! actions["logout"].fire()?;
//! assert_eq!(session.get("user"), Some(json!(null)));
//! # Ok::<(), boutique_core::Error>(())
//! ```
//!
//! # Ordering Stores
//!
//! A handler can require another store to react to the current action
//! first with [`StoreCore::wait_for`]. Waiting on a store that is itself
//! waiting (directly or transitively) aborts the dispatch with
//! [`OrderingCycleError::Cycle`].
//!
//! # Async Completions
//!
//! With the `tasks` feature, [`TaskManager`] runs futures on tokio and turns
//! their outcomes into `success`/`error` dispatches on the owning thread.

pub mod action;
pub mod binding;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod log;
pub mod middleware;
mod scheduler;
pub mod shape;
pub mod store;
#[cfg(feature = "tasks")]
pub mod tasks;
pub mod testing;
pub mod warning;

// Action exports
pub use action::{
    generate_actions, validate_name, Action, ActionId, ActionSpec, ActionSpecs, Actions, Payload,
    PayloadFn,
};

// Binding exports
pub use binding::{conventional_handler, fallback_method, Binding, BindingTable, Listeners};

// Dispatcher exports
pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;

// Store exports
pub use shape::{Handlers, Method, Methods, ObjectShape, StoreShape};
pub use store::{listener, Listener, State, Store, StoreCore, StoreId};

// Middleware exports
pub use log::{ActionLog, ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware};
pub use middleware::{ComposedMiddleware, LoggingMiddleware, Middleware, NoopMiddleware};

// Error exports
pub use error::{Error, HandlerResult, InvalidNameError, OrderingCycleError, Result};
pub use warning::{Warning, WarningSink};

// Task exports (requires "tasks" feature)
#[cfg(feature = "tasks")]
pub use tasks::{Completion, Outcome, TaskKey, TaskManager};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::action::{generate_actions, Action, ActionSpec, ActionSpecs, Actions, Payload};
    pub use crate::binding::Listeners;
    pub use crate::config::DispatcherConfig;
    pub use crate::dispatcher::Dispatcher;
    pub use crate::error::{Error, HandlerResult};
    pub use crate::middleware::{LoggingMiddleware, Middleware};
    pub use crate::shape::{Handlers, Methods, ObjectShape, StoreShape};
    pub use crate::store::{listener, Listener, State, Store, StoreCore};
    pub use crate::warning::Warning;
    #[cfg(feature = "tasks")]
    pub use crate::tasks::{TaskKey, TaskManager};
}
