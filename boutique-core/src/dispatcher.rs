//! The dispatcher: dispatch graph, dispatch frames and store factory
//!
//! A [`Dispatcher`] owns everything that is shared between actions and
//! stores: the `action → stores` graph, the stack of in-flight dispatches,
//! the change scheduler, middleware and warning sinks. There is no global
//! instance; actions and stores keep the dispatcher that created them alive.
//!
//! # Dispatch
//!
//! Invoking an action snapshots the stores bound to it and runs them in
//! binding order. Each store is `Pending`, `InProgress` or `Handled` for the
//! duration of that dispatch; `wait_for` uses these states to run another
//! store first or to report a cycle. An action invoked from inside a handler
//! is dispatched immediately with its own frame. Notifications are deferred
//! until the outermost dispatch or batch region returns.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use crate::action::{Action, ActionId, ActionSpecs, Actions, Payload};
use crate::config::DispatcherConfig;
use crate::error::{InvalidNameError, Result};
use crate::middleware::Middleware;
use crate::scheduler::ChangeScheduler;
use crate::shape::StoreShape;
use crate::store::{Store, StoreId};
use crate::warning::{Warning, WarningSink};

/// A store as seen by the dispatch engine, independent of its shape type
pub(crate) trait DispatchTarget {
    fn store_id(&self) -> StoreId;
    fn store_name(&self) -> &str;
    /// Run this store's handlers bound to the frame's action
    fn react(&self, frame: &Frame) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Status {
    Pending,
    InProgress,
    Handled,
}

/// One in-flight dispatch
pub(crate) struct Frame {
    action: Action,
    payload: Payload,
    targets: Vec<Rc<dyn DispatchTarget>>,
    status: RefCell<Vec<Status>>,
    /// Stores currently in progress, outermost first
    chain: RefCell<Vec<String>>,
}

impl Frame {
    fn new(action: Action, payload: Payload, targets: Vec<Rc<dyn DispatchTarget>>) -> Self {
        let status = vec![Status::Pending; targets.len()];
        Self {
            action,
            payload,
            targets,
            status: RefCell::new(status),
            chain: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn action(&self) -> &Action {
        &self.action
    }

    pub(crate) fn payload(&self) -> &Payload {
        &self.payload
    }

    pub(crate) fn position(&self, store: StoreId) -> Option<usize> {
        self.targets.iter().position(|t| t.store_id() == store)
    }

    pub(crate) fn status(&self, index: usize) -> Status {
        self.status.borrow()[index]
    }

    /// Stores that actually ran, failed or not
    fn handled(&self) -> usize {
        self.status
            .borrow()
            .iter()
            .filter(|s| **s == Status::Handled)
            .count()
    }

    /// Chain of waiting stores ending with `next`, for cycle reports
    pub(crate) fn chain_to(&self, next: &str) -> Vec<String> {
        let mut chain = self.chain.borrow().clone();
        chain.push(next.to_string());
        chain
    }

    /// Run the store at `index`; it counts as handled even if it failed
    pub(crate) fn run(&self, index: usize) -> Result<()> {
        let target = &self.targets[index];
        self.status.borrow_mut()[index] = Status::InProgress;
        self.chain.borrow_mut().push(target.store_name().to_string());

        let result = target.react(self);

        self.chain.borrow_mut().pop();
        self.status.borrow_mut()[index] = Status::Handled;
        result
    }

    fn run_all(&self) -> Result<()> {
        for index in 0..self.targets.len() {
            // Stores already run through wait_for are skipped
            if self.status(index) == Status::Pending {
                self.run(index)?;
            }
        }
        Ok(())
    }
}

/// Pops the current frame even if a handler panics
struct FrameGuard<'a>(&'a RefCell<Vec<Rc<Frame>>>);

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.0.borrow_mut().pop();
    }
}

pub(crate) struct DispatcherInner {
    config: DispatcherConfig,
    next_id: Cell<u64>,
    /// action → stores bound to it, in first-binding order
    graph: RefCell<HashMap<ActionId, Vec<StoreId>>>,
    stores: RefCell<HashMap<StoreId, Weak<dyn DispatchTarget>>>,
    frames: RefCell<Vec<Rc<Frame>>>,
    pub(crate) scheduler: ChangeScheduler,
    middleware: RefCell<Vec<Box<dyn Middleware>>>,
    sinks: RefCell<Vec<WarningSink>>,
}

impl DispatcherInner {
    fn new(config: DispatcherConfig) -> Self {
        Self {
            config,
            next_id: Cell::new(1),
            graph: RefCell::default(),
            stores: RefCell::default(),
            frames: RefCell::default(),
            scheduler: ChangeScheduler::default(),
            middleware: RefCell::default(),
            sinks: RefCell::default(),
        }
    }

    pub(crate) fn next_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    pub(crate) fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub(crate) fn register_store(&self, id: StoreId, target: Weak<dyn DispatchTarget>) {
        self.stores.borrow_mut().insert(id, target);
    }

    /// Forget a dropped store; stale entries are also skipped at dispatch time
    pub(crate) fn unregister_store(&self, id: StoreId) {
        if let Ok(mut stores) = self.stores.try_borrow_mut() {
            stores.remove(&id);
        }
        if let Ok(mut graph) = self.graph.try_borrow_mut() {
            for bound in graph.values_mut() {
                bound.retain(|s| *s != id);
            }
            graph.retain(|_, bound| !bound.is_empty());
        }
    }

    pub(crate) fn link(&self, action: ActionId, store: StoreId) {
        let mut graph = self.graph.borrow_mut();
        let bound = graph.entry(action).or_default();
        if !bound.contains(&store) {
            bound.push(store);
        }
    }

    fn targets_for(&self, action: ActionId) -> Vec<Rc<dyn DispatchTarget>> {
        let ids = self.graph.borrow().get(&action).cloned().unwrap_or_default();
        let stores = self.stores.borrow();
        ids.iter()
            .filter_map(|id| stores.get(id).and_then(Weak::upgrade))
            .collect()
    }

    pub(crate) fn current_frame(&self) -> Option<Rc<Frame>> {
        self.frames.borrow().last().cloned()
    }

    pub(crate) fn dispatch(&self, action: &Action, payload: Payload) -> Result<()> {
        let targets = self.targets_for(action.id());
        if self.config.trace_dispatch {
            debug!(
                action = %action.name(),
                stores = targets.len(),
                depth = self.frames.borrow().len(),
                "dispatching action"
            );
        }

        if let Ok(mut middleware) = self.middleware.try_borrow_mut() {
            for m in middleware.iter_mut() {
                m.before(action, &payload);
            }
        }

        let frame = Rc::new(Frame::new(action.clone(), payload, targets));
        let result = self.scheduler.batch(|| {
            self.frames.borrow_mut().push(frame.clone());
            let _guard = FrameGuard(&self.frames);
            frame.run_all()
        });

        let handled = frame.handled();
        if let Err(err) = &result {
            warn!(action = %action.name(), error = %err, handled, "dispatch aborted");
        }
        if let Ok(mut middleware) = self.middleware.try_borrow_mut() {
            for m in middleware.iter_mut().rev() {
                m.after(action, handled, result.is_ok());
            }
        }
        result
    }

    pub(crate) fn warn(&self, warning: Warning) {
        let enabled = match warning {
            Warning::MissingHandler { .. } => self.config.warn_missing_handlers,
            Warning::DirectHandlerCall { .. } => self.config.warn_direct_handler_calls,
        };
        if !enabled {
            return;
        }
        warn!(store = %warning.store(), "{}", warning);
        let sinks = self.sinks.borrow().clone();
        for sink in sinks {
            sink(&warning);
        }
    }
}

/// Owner of the dispatch graph; factory for actions and stores
///
/// Cloning yields another handle to the same dispatcher.
///
/// # Example
///
/// ```
/// use boutique_core::{generate_actions, Dispatcher, ObjectShape};
/// use serde_json::json;
///
/// let dispatcher = Dispatcher::new();
/// let actions = dispatcher.create_actions(generate_actions(["login"])?)?;
///
/// let login = actions["login"].clone();
/// let store = dispatcher.create_store(
///     ObjectShape::new("Session")
///         .method("onLogin", |_, store, payload| {
///             store.set_state(json!({ "user": payload }));
///             Ok(())
///         })
///         .constructor(move |_, store| store.bind_action(&login, None)),
/// )?;
///
/// actions["login"].dispatch("ada")?;
/// assert_eq!(store.get("user"), Some(json!("ada")));
/// # Ok::<(), boutique_core::Error>(())
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    inner: Rc<DispatcherInner>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.inner.config)
            .field("stores", &self.store_count())
            .field("dispatching", &self.is_dispatching())
            .finish()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            inner: Rc::new(DispatcherInner::new(config)),
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        self.inner.config()
    }

    /// Same as [`generate_actions`](crate::generate_actions)
    pub fn generate_actions<I, S>(&self, names: I) -> std::result::Result<ActionSpecs, InvalidNameError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        crate::action::generate_actions(names)
    }

    /// Wrap specs into invocable actions owned by this dispatcher
    pub fn create_actions(&self, specs: ActionSpecs) -> Result<Actions> {
        specs.validate()?;
        let actions = Actions::from_specs(&self.inner, &specs);
        debug!(count = actions.len(), "actions created");
        Ok(actions)
    }

    /// Build a store around `shape` and run its constructor once
    pub fn create_store<T: StoreShape>(&self, shape: T) -> Result<Store<T>> {
        Store::create(&self.inner, shape)
    }

    /// Run `f` as one batch region: one notification per dirty store at the end
    pub fn batch_changes<R>(&self, f: impl FnOnce() -> R) -> R {
        self.inner.scheduler.batch(f)
    }

    /// Register a callback for warnings
    pub fn on_warning(&self, sink: impl Fn(&Warning) + 'static) {
        self.inner.sinks.borrow_mut().push(Rc::new(sink));
    }

    pub fn add_middleware(&self, middleware: impl Middleware + 'static) {
        self.inner.middleware.borrow_mut().push(Box::new(middleware));
    }

    /// Whether an action dispatch is on the call stack
    pub fn is_dispatching(&self) -> bool {
        !self.inner.frames.borrow().is_empty()
    }

    /// Innermost action being dispatched
    pub fn current_action(&self) -> Option<Action> {
        self.inner.current_frame().map(|f| f.action().clone())
    }

    /// Number of live stores
    pub fn store_count(&self) -> usize {
        self.inner
            .stores
            .borrow()
            .values()
            .filter(|s| s.strong_count() > 0)
            .count()
    }
}
