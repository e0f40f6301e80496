//! User-defined store shapes and their method tables
//!
//! A store wraps a user value (the *shape*). The shape exposes its callable
//! methods through a [`Methods`] table; bindings refer to those methods by
//! name, and the store resolves them through the table at dispatch time.
//!
//! Shapes come in two flavours:
//!
//! - a struct implementing [`StoreShape`] (methods usually generated with
//!   `#[store_methods]`);
//! - an [`ObjectShape`], assembled at runtime from closures, for stores that
//!   have no dedicated type.
//!
//! Composition replaces inheritance: [`Methods::inherit`] pulls a base
//! shape's table into a derived one through a field projection.

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::action::Payload;
use crate::error::{HandlerResult, Result};
use crate::store::{State, Store, StoreCore};

/// A callable method of shape `T`
pub type Method<T> = Rc<dyn Fn(&mut T, &StoreCore, &Payload) -> HandlerResult>;

/// Name → method table of a shape
pub struct Methods<T> {
    entries: Vec<(String, Method<T>)>,
}

impl<T> Clone for Methods<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T> Default for Methods<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T: 'static> fmt::Debug for Methods<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl<T: 'static> Methods<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a method
    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&mut T, &StoreCore, &Payload) -> HandlerResult + 'static,
    ) -> Self {
        self.insert(name, Rc::new(method));
        self
    }

    /// Add a method, replacing any existing entry with the same name in place
    pub fn insert(&mut self, name: impl Into<String>, method: Method<T>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = method,
            None => self.entries.push((name, method)),
        }
    }

    /// Pull in every method of a base shape reachable through `project`
    ///
    /// Methods already present (or added later) on `self` take precedence,
    /// so a derived shape can override what it inherits.
    pub fn inherit<B: 'static>(
        mut self,
        base: Methods<B>,
        project: impl Fn(&mut T) -> &mut B + 'static,
    ) -> Self {
        let project = Rc::new(project);
        for (name, method) in base.entries {
            if self.contains(&name) {
                continue;
            }
            let project = project.clone();
            let lifted: Method<T> =
                Rc::new(move |this: &mut T, store: &StoreCore, payload: &Payload| {
                    method(project(this), store, payload)
                });
            self.entries.push((name, lifted));
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Method<T>> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, m)| m)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Types exposing a method table
///
/// Implemented by `#[store_methods]` for an annotated `impl` block.
pub trait Handlers: Sized + 'static {
    fn methods(&self) -> Methods<Self>;
}

/// A value that can be turned into a store
pub trait StoreShape: Handlers {
    /// Runs once during `create_store`; wire bindings here
    fn construct(&mut self, store: &Store<Self>) -> Result<()> {
        let _ = store;
        Ok(())
    }

    /// State the store starts with
    fn initial_state(&self) -> State {
        State::new()
    }

    /// Name used in logs, warnings and errors
    fn display_name(&self) -> String {
        short_type_name::<Self>()
    }
}

fn short_type_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

type Constructor = Rc<dyn Fn(&mut ObjectShape, &Store<ObjectShape>) -> Result<()>>;

/// Shape assembled at runtime: free-form fields plus closure methods
///
/// ```
/// use boutique_core::{Dispatcher, ObjectShape};
/// use serde_json::json;
///
/// let dispatcher = Dispatcher::new();
/// let store = dispatcher
///     .create_store(
///         ObjectShape::new("Counter")
///             .field("step", json!(2))
///             .initial_state(json!({ "count": 0 }))
///             .method("bump", |this, store, _| {
///                 let step = this.get_field("step").and_then(|v| v.as_i64()).unwrap_or(1);
///                 let count = store.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
///                 store.set_state(json!({ "count": count + step }));
///                 Ok(())
///             }),
///     )
///     .unwrap();
///
/// store.call("bump", ()).unwrap();
/// assert_eq!(store.get("count"), Some(json!(2)));
/// ```
pub struct ObjectShape {
    name: String,
    fields: State,
    state: State,
    methods: Methods<ObjectShape>,
    constructor: Option<Constructor>,
}

impl ObjectShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: State::new(),
            state: State::new(),
            methods: Methods::new(),
            constructor: None,
        }
    }

    /// Set a free-form field on the shape (not part of the observable state)
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Initial state; non-object values are ignored
    pub fn initial_state(mut self, state: impl Into<Value>) -> Self {
        if let Value::Object(state) = state.into() {
            self.state = state;
        }
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&mut ObjectShape, &StoreCore, &Payload) -> HandlerResult + 'static,
    ) -> Self {
        self.methods.insert(name, Rc::new(method));
        self
    }

    /// Constructor run once by `create_store`
    pub fn constructor(
        mut self,
        constructor: impl Fn(&mut ObjectShape, &Store<ObjectShape>) -> Result<()> + 'static,
    ) -> Self {
        self.constructor = Some(Rc::new(constructor));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set_field(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn fields(&self) -> &State {
        &self.fields
    }
}

impl fmt::Debug for ObjectShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectShape")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("methods", &self.methods)
            .finish()
    }
}

impl Handlers for ObjectShape {
    fn methods(&self) -> Methods<Self> {
        self.methods.clone()
    }
}

impl StoreShape for ObjectShape {
    fn construct(&mut self, store: &Store<Self>) -> Result<()> {
        match self.constructor.clone() {
            Some(constructor) => constructor(self, store),
            None => Ok(()),
        }
    }

    fn initial_state(&self) -> State {
        self.state.clone()
    }

    fn display_name(&self) -> String {
        self.name.clone()
    }
}
