//! Observable stores
//!
//! A store owns a JSON-object state, an ordered set of listeners and the
//! bindings that connect it to actions. [`StoreCore`] carries everything that
//! does not depend on the shape type and is what handlers receive; the typed
//! [`Store<T>`] handle adds the shape, its method table and the bind calls.
//!
//! State mutations are applied immediately, notifications are batched: a
//! store emits at most one change notification per dispatch or batch region,
//! and none if nothing was set.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::fmt;
use std::ops::Deref;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::action::{Action, Actions, Payload};
use crate::binding::{Binding, BindingTable, Listeners};
use crate::dispatcher::{DispatchTarget, DispatcherInner, Frame, Status};
use crate::error::{Error, OrderingCycleError, Result};
use crate::shape::{Methods, StoreShape};
use crate::warning::Warning;

/// Store state: a flat JSON object
pub type State = serde_json::Map<String, Value>;

/// Change listener, called with the state after each flushed change
///
/// Listener identity is the `Rc` allocation: registering a clone of the same
/// `Rc` twice is a no-op.
pub type Listener = Rc<dyn Fn(&State)>;

/// Wrap a closure as a [`Listener`]
pub fn listener(f: impl Fn(&State) + 'static) -> Listener {
    Rc::new(f)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreId(pub(crate) u64);

impl StoreId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Shape-independent part of a store: state, listeners, bindings
pub struct StoreCore {
    id: StoreId,
    name: String,
    me: Weak<StoreCore>,
    dispatcher: Rc<DispatcherInner>,
    state: RefCell<State>,
    listeners: RefCell<Vec<Listener>>,
    pub(crate) pending: Cell<bool>,
    bindings: RefCell<BindingTable>,
}

impl StoreCore {
    fn new(id: StoreId, name: String, dispatcher: Rc<DispatcherInner>, state: State) -> Rc<Self> {
        Rc::new_cyclic(|me| Self {
            id,
            name,
            me: me.clone(),
            dispatcher,
            state: RefCell::new(state),
            listeners: RefCell::default(),
            pending: Cell::new(false),
            bindings: RefCell::default(),
        })
    }

    pub fn id(&self) -> StoreId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn weak(&self) -> Weak<StoreCore> {
        self.me.clone()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> State {
        self.state.borrow().clone()
    }

    /// Read the state without cloning it
    pub fn with_state<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.state.borrow().get(key).cloned()
    }

    /// Shallow-merge `partial` into the state and schedule a notification
    ///
    /// The merge is visible immediately. Only JSON objects merge; anything
    /// else is ignored.
    pub fn set_state(&self, partial: impl Into<Value>) {
        let Value::Object(partial) = partial.into() else {
            warn!(store = %self.name, "set_state expects an object, ignoring");
            return;
        };
        self.dispatcher.scheduler.batch(|| {
            self.state.borrow_mut().extend(partial);
            self.dispatcher.scheduler.mark(self);
        });
    }

    /// Notify listeners now, outside of batching
    pub fn emit_change(&self) {
        self.pending.set(false);
        self.notify();
    }

    /// Run `f` as one batch region
    pub fn batch_changes<R>(&self, f: impl FnOnce() -> R) -> R {
        self.dispatcher.scheduler.batch(f)
    }

    /// Subscribe to change notifications; idempotent per listener
    pub fn listen(&self, listener: Listener) {
        let mut listeners = self.listeners.borrow_mut();
        if !listeners.iter().any(|l| Rc::ptr_eq(l, &listener)) {
            listeners.push(listener);
        }
    }

    /// Remove a listener; no-op if it was not registered
    pub fn stop_listening(&self, listener: &Listener) {
        self.listeners
            .borrow_mut()
            .retain(|l| !Rc::ptr_eq(l, listener));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Whether a notification is queued for the end of the current region
    pub fn has_pending_changes(&self) -> bool {
        self.pending.get()
    }

    /// Make sure `other` has finished reacting to the current action first
    ///
    /// Only valid from a handler of this store. If `other` is bound to the
    /// action and has not run yet, it runs now; if it already ran (or is not
    /// bound) this returns at once.
    pub fn wait_for(&self, other: &StoreCore) -> Result<()> {
        self.wait_for_all(&[other])
    }

    /// [`wait_for`](Self::wait_for) on several stores, in order
    pub fn wait_for_all(&self, others: &[&StoreCore]) -> Result<()> {
        let outside = || OrderingCycleError::OutsideDispatch {
            store: self.name.clone(),
        };
        let frame = self.dispatcher.current_frame().ok_or_else(outside)?;
        match frame.position(self.id) {
            Some(index) if frame.status(index) == Status::InProgress => {}
            _ => return Err(outside().into()),
        }

        for other in others {
            let Some(index) = frame.position(other.id) else {
                continue;
            };
            match frame.status(index) {
                Status::Handled => {}
                Status::InProgress => {
                    return Err(OrderingCycleError::Cycle {
                        action: frame.action().name().to_string(),
                        chain: frame.chain_to(&other.name),
                    }
                    .into());
                }
                Status::Pending => {
                    trace!(store = %self.name, waits_for = %other.name, "running dependency first");
                    frame.run(index)?;
                }
            }
        }
        Ok(())
    }

    /// Bindings declared by this store, in binding order
    pub fn bindings(&self) -> Vec<Binding> {
        self.bindings.borrow().entries().to_vec()
    }

    pub(crate) fn flush_change(&self) {
        if self.pending.replace(false) {
            self.notify();
        }
    }

    fn notify(&self) {
        let listeners = self.listeners.borrow().clone();
        if listeners.is_empty() {
            return;
        }
        let state = self.state();
        trace!(store = %self.name, listeners = listeners.len(), "change");
        for listener in listeners {
            listener(&state);
        }
    }
}

impl fmt::Debug for StoreCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state.borrow())
            .field("listeners", &self.listener_count())
            .field("bindings", &self.bindings.borrow().len())
            .finish()
    }
}

struct StoreInner<T> {
    core: Rc<StoreCore>,
    shape: RefCell<T>,
    methods: Methods<T>,
}

impl<T: StoreShape> DispatchTarget for StoreInner<T> {
    fn store_id(&self) -> StoreId {
        self.core.id
    }

    fn store_name(&self) -> &str {
        &self.core.name
    }

    fn react(&self, frame: &Frame) -> Result<()> {
        let handlers = self.core.bindings.borrow().handlers_for(frame.action().id());
        let mut shape = self.shape.try_borrow_mut().map_err(|_| Error::StoreBusy {
            store: self.core.name.clone(),
            operation: frame.action().name().to_string(),
        })?;
        for handler in handlers {
            if let Some(method) = self.methods.get(&handler) {
                method(&mut shape, &self.core, frame.payload())?;
            }
        }
        Ok(())
    }
}

impl<T> Drop for StoreInner<T> {
    fn drop(&mut self) {
        self.core.dispatcher.unregister_store(self.core.id);
    }
}

/// Handle to a store built from shape `T`
///
/// Cloning yields another handle to the same store. Derefs to [`StoreCore`]
/// for state, listeners, batching and `wait_for`.
pub struct Store<T: StoreShape> {
    inner: Rc<StoreInner<T>>,
}

impl<T: StoreShape> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: StoreShape> Deref for Store<T> {
    type Target = StoreCore;

    fn deref(&self) -> &StoreCore {
        &self.inner.core
    }
}

impl<T: StoreShape> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("core", &self.inner.core)
            .field("methods", &self.inner.methods)
            .finish()
    }
}

impl<T: StoreShape> Store<T> {
    pub(crate) fn create(dispatcher: &Rc<DispatcherInner>, shape: T) -> Result<Self> {
        let id = StoreId(dispatcher.next_id());
        let core = StoreCore::new(
            id,
            shape.display_name(),
            dispatcher.clone(),
            shape.initial_state(),
        );
        let methods = shape.methods();
        let inner = Rc::new(StoreInner {
            core,
            shape: RefCell::new(shape),
            methods,
        });
        let weak = Rc::downgrade(&inner);
        let target: Weak<dyn DispatchTarget> = weak;
        dispatcher.register_store(id, target);

        let store = Self { inner };
        {
            let mut shape = store.inner.shape.borrow_mut();
            shape.construct(&store)?;
        }
        debug!(
            store = %store.name(),
            bindings = store.inner.core.bindings.borrow().len(),
            "store created"
        );
        Ok(store)
    }

    /// The shape-independent part of the store
    pub fn core(&self) -> &StoreCore {
        &self.inner.core
    }

    /// Bind `action` to `handler` (default: the conventional `on<Action>` name)
    ///
    /// A missing handler is tolerated: if a method named after the action
    /// exists it is bound instead, otherwise the binding is skipped. Both
    /// cases emit a [`Warning::MissingHandler`].
    pub fn bind_action(&self, action: &Action, handler: Option<&str>) -> Result<()> {
        self.ensure_owned(action)?;
        let handler = handler
            .map(str::to_string)
            .unwrap_or_else(|| action.handler_name());
        if self.inner.methods.contains(&handler) {
            self.link(action, &handler);
            return Ok(());
        }

        let fallback = action.method_name();
        let fallback = self.inner.methods.contains(&fallback).then_some(fallback);
        if let Some(method) = &fallback {
            self.link(action, method);
        }
        self.inner.core.dispatcher.warn(Warning::MissingHandler {
            store: self.name().to_string(),
            action: action.name().to_string(),
            handler,
            fallback,
        });
        Ok(())
    }

    /// Bind every action by convention; completions only where a handler exists
    pub fn bind_actions(&self, actions: &Actions) -> Result<()> {
        for action in actions {
            self.bind_action(action, None)?;
            for completion in action.completions() {
                let handler = completion.handler_name();
                if self.inner.methods.contains(&handler) {
                    self.link(completion, &handler);
                }
            }
        }
        Ok(())
    }

    /// Bind each handler in `listeners` to all of its actions
    pub fn bind_listeners(&self, listeners: Listeners) -> Result<()> {
        for (handler, actions) in listeners {
            for action in &actions {
                self.ensure_owned(action)?;
                if self.inner.methods.contains(&handler) {
                    self.link(action, &handler);
                } else {
                    self.inner.core.dispatcher.warn(Warning::MissingHandler {
                        store: self.name().to_string(),
                        action: action.name().to_string(),
                        handler: handler.clone(),
                        fallback: None,
                    });
                }
            }
        }
        Ok(())
    }

    /// Invoke a shape method directly
    ///
    /// Bound handlers still run, but emit a [`Warning::DirectHandlerCall`]:
    /// they are meant to be reached through their action.
    pub fn call(&self, method: &str, payload: impl Into<Payload>) -> Result<()> {
        let core = &self.inner.core;
        let handler = self
            .inner
            .methods
            .get(method)
            .cloned()
            .ok_or_else(|| Error::UnknownMethod {
                store: core.name.clone(),
                method: method.to_string(),
            })?;
        if core.bindings.borrow().is_handler_bound(method) {
            core.dispatcher.warn(Warning::DirectHandlerCall {
                store: core.name.clone(),
                handler: method.to_string(),
            });
        }
        let payload = payload.into();
        let mut shape = self
            .inner
            .shape
            .try_borrow_mut()
            .map_err(|_| Error::StoreBusy {
                store: core.name.clone(),
                operation: method.to_string(),
            })?;
        handler(&mut shape, core, &payload)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.inner.methods.contains(name)
    }

    pub fn method_names(&self) -> Vec<String> {
        self.inner.methods.names().map(str::to_string).collect()
    }

    /// Borrow the shape
    ///
    /// # Panics
    ///
    /// Panics if one of this store's handlers is running.
    pub fn shape(&self) -> Ref<'_, T> {
        self.inner.shape.borrow()
    }

    /// Mutably borrow the shape
    ///
    /// # Panics
    ///
    /// Panics if one of this store's handlers is running.
    pub fn shape_mut(&self) -> RefMut<'_, T> {
        self.inner.shape.borrow_mut()
    }

    fn ensure_owned(&self, action: &Action) -> Result<()> {
        if action.belongs_to(&self.inner.core.dispatcher) {
            Ok(())
        } else {
            Err(Error::ForeignAction {
                action: action.name().to_string(),
            })
        }
    }

    fn link(&self, action: &Action, handler: &str) {
        let core = &self.inner.core;
        if core.bindings.borrow_mut().insert(action, handler) {
            core.dispatcher.link(action.id(), core.id);
        }
    }
}
