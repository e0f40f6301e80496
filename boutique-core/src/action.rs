//! Actions, action specs and the action registry
//!
//! An [`Action`] is a named, callable identity. Invoking it dispatches the
//! payload synchronously to every store bound to that identity. Each action
//! carries completion sub-actions (`success`, `error`, and any extra declared
//! variant) with identities of their own.
//!
//! # Example
//!
//! ```
//! use boutique_core::{generate_actions, Dispatcher};
//!
//! let dispatcher = Dispatcher::new();
//! let actions = dispatcher
//!     .create_actions(generate_actions(["login", "logout"]).unwrap())
//!     .unwrap();
//!
//! assert_eq!(actions["login"].name(), "login");
//! assert_eq!(actions["login"].success().name(), "login.success");
//! assert_eq!(actions["login"].success().handler_name(), "onLoginSuccess");
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Index;
use std::rc::Rc;

use crate::binding::{conventional_handler, fallback_method};
use crate::dispatcher::DispatcherInner;
use crate::error::{InvalidNameError, Result};

/// Value carried by an action invocation
pub type Payload = serde_json::Value;

/// Maps the raw invocation argument to the dispatched payload
pub type PayloadFn = Rc<dyn Fn(Payload) -> Payload>;

/// Completion variants every action gets
pub const DEFAULT_COMPLETIONS: [&str; 2] = ["success", "error"];

/// Identity of an action or completion sub-action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(pub(crate) u64);

impl ActionId {
    /// Raw numeric id
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Declaration of one action before it is bound to a dispatcher
#[derive(Clone)]
pub struct ActionSpec {
    name: String,
    completions: Vec<String>,
    mapper: Option<PayloadFn>,
}

impl ActionSpec {
    /// Plain action that dispatches its argument unchanged
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            completions: DEFAULT_COMPLETIONS.iter().map(|c| c.to_string()).collect(),
            mapper: None,
        }
    }

    /// Action whose argument is passed through `mapper` before dispatch
    pub fn with_mapper(name: impl Into<String>, mapper: impl Fn(Payload) -> Payload + 'static) -> Self {
        Self {
            mapper: Some(Rc::new(mapper)),
            ..Self::new(name)
        }
    }

    /// Declare an additional completion variant (e.g. `"progress"`)
    pub fn with_completion(mut self, completion: impl Into<String>) -> Self {
        let completion = completion.into();
        if !self.completions.contains(&completion) {
            self.completions.push(completion);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn completions(&self) -> &[String] {
        &self.completions
    }

    pub fn has_mapper(&self) -> bool {
        self.mapper.is_some()
    }
}

impl fmt::Debug for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionSpec")
            .field("name", &self.name)
            .field("completions", &self.completions)
            .field("has_mapper", &self.mapper.is_some())
            .finish()
    }
}

/// Ordered set of action specs, input to `Dispatcher::create_actions`
#[derive(Debug, Clone, Default)]
pub struct ActionSpecs {
    specs: Vec<ActionSpec>,
}

impl ActionSpecs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a spec
    pub fn spec(mut self, spec: ActionSpec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Add an action backed by a payload function
    pub fn function(
        self,
        name: impl Into<String>,
        mapper: impl Fn(Payload) -> Payload + 'static,
    ) -> Self {
        self.spec(ActionSpec::with_mapper(name, mapper))
    }

    pub fn get(&self, name: &str) -> Option<&ActionSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionSpec> {
        self.specs.iter()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Check every name (and completion name) is a unique identifier
    pub fn validate(&self) -> std::result::Result<(), InvalidNameError> {
        let mut seen = HashSet::new();
        for spec in &self.specs {
            validate_name(&spec.name)?;
            if !seen.insert(spec.name.as_str()) {
                return Err(InvalidNameError::Duplicate(spec.name.clone()));
            }
            for completion in &spec.completions {
                validate_name(completion)?;
            }
        }
        Ok(())
    }
}

impl IntoIterator for ActionSpecs {
    type Item = ActionSpec;
    type IntoIter = std::vec::IntoIter<ActionSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.specs.into_iter()
    }
}

/// Turn a list of names into action specs
///
/// Pure and deterministic: one spec per name, declaration order kept.
/// Fails on empty, duplicate or non-identifier names.
///
/// ```
/// use boutique_core::{generate_actions, InvalidNameError};
///
/// let specs = generate_actions(["login", "logout"]).unwrap();
/// assert_eq!(specs.names().collect::<Vec<_>>(), ["login", "logout"]);
///
/// assert_eq!(
///     generate_actions(["login", "login"]).unwrap_err(),
///     InvalidNameError::Duplicate("login".into())
/// );
/// ```
pub fn generate_actions<I, S>(names: I) -> std::result::Result<ActionSpecs, InvalidNameError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let specs = names
        .into_iter()
        .fold(ActionSpecs::new(), |specs, name| {
            specs.spec(ActionSpec::new(name.as_ref()))
        });
    specs.validate()?;
    Ok(specs)
}

/// Identifier rule: `[A-Za-z_$][A-Za-z0-9_$]*`
pub fn validate_name(name: &str) -> std::result::Result<(), InvalidNameError> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(InvalidNameError::Empty);
    };
    let valid_first = first.is_ascii_alphabetic() || first == '_' || first == '$';
    if !valid_first || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        return Err(InvalidNameError::NotIdentifier(name.to_string()));
    }
    Ok(())
}

/// A dispatchable action handle
///
/// Cheap to clone; clones share identity.
#[derive(Clone)]
pub struct Action {
    inner: Rc<ActionInner>,
}

struct ActionInner {
    id: ActionId,
    name: String,
    completion: Option<String>,
    mapper: Option<PayloadFn>,
    completions: Vec<Action>,
    dispatcher: Rc<DispatcherInner>,
}

impl Action {
    pub(crate) fn from_spec(dispatcher: &Rc<DispatcherInner>, spec: &ActionSpec) -> Self {
        let id = ActionId(dispatcher.next_id());
        let completions = spec
            .completions
            .iter()
            .map(|completion| Self {
                inner: Rc::new(ActionInner {
                    id: ActionId(dispatcher.next_id()),
                    name: format!("{}.{}", spec.name, completion),
                    completion: Some(completion.clone()),
                    mapper: None,
                    completions: Vec::new(),
                    dispatcher: dispatcher.clone(),
                }),
            })
            .collect();

        Self {
            inner: Rc::new(ActionInner {
                id,
                name: spec.name.clone(),
                completion: None,
                mapper: spec.mapper.clone(),
                completions,
                dispatcher: dispatcher.clone(),
            }),
        }
    }

    pub fn id(&self) -> ActionId {
        self.inner.id
    }

    /// Display name: `login`, or `login.success` for a completion
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Conventional handler name (`login` → `onLogin`)
    pub fn handler_name(&self) -> String {
        conventional_handler(&self.inner.name)
    }

    /// Method name tried when the conventional handler is missing
    pub fn method_name(&self) -> String {
        fallback_method(&self.inner.name)
    }

    /// Completion variant of a sub-action (`Some("success")`), `None` for a plain action
    pub fn completion_kind(&self) -> Option<&str> {
        self.inner.completion.as_deref()
    }

    pub fn is_completion(&self) -> bool {
        self.inner.completion.is_some()
    }

    /// Completion sub-action by variant name
    pub fn completion(&self, kind: &str) -> Option<&Action> {
        self.inner
            .completions
            .iter()
            .find(|a| a.completion_kind() == Some(kind))
    }

    /// All completion sub-actions in declaration order
    pub fn completions(&self) -> impl Iterator<Item = &Action> {
        self.inner.completions.iter()
    }

    /// The `success` completion
    ///
    /// # Panics
    ///
    /// Panics when called on a completion sub-action, which has no completions.
    pub fn success(&self) -> &Action {
        self.completion("success")
            .unwrap_or_else(|| panic!("`{}` has no success completion", self.name()))
    }

    /// The `error` completion
    ///
    /// # Panics
    ///
    /// Panics when called on a completion sub-action, which has no completions.
    pub fn error(&self) -> &Action {
        self.completion("error")
            .unwrap_or_else(|| panic!("`{}` has no error completion", self.name()))
    }

    /// Invoke the action: every bound handler runs before this returns
    pub fn dispatch(&self, payload: impl Into<Payload>) -> Result<()> {
        let payload = payload.into();
        let payload = match &self.inner.mapper {
            Some(mapper) => mapper(payload),
            None => payload,
        };
        self.inner.dispatcher.dispatch(self, payload)
    }

    /// Invoke without a payload
    pub fn fire(&self) -> Result<()> {
        self.dispatch(Payload::Null)
    }

    pub(crate) fn belongs_to(&self, dispatcher: &Rc<DispatcherInner>) -> bool {
        Rc::ptr_eq(&self.inner.dispatcher, dispatcher)
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Action {}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .finish()
    }
}

/// Name → action mapping produced by `Dispatcher::create_actions`
#[derive(Debug, Clone, Default)]
pub struct Actions {
    actions: Vec<Action>,
    index: HashMap<String, usize>,
}

impl Actions {
    pub(crate) fn from_specs(dispatcher: &Rc<DispatcherInner>, specs: &ActionSpecs) -> Self {
        let actions: Vec<Action> = specs
            .iter()
            .map(|spec| Action::from_spec(dispatcher, spec))
            .collect();
        let index = actions
            .iter()
            .enumerate()
            .map(|(i, a)| (a.name().to_string(), i))
            .collect();
        Self { actions, index }
    }

    pub fn get(&self, name: &str) -> Option<&Action> {
        self.index.get(name).map(|&i| &self.actions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Actions in declaration order
    pub fn iter(&self) -> std::slice::Iter<'_, Action> {
        self.actions.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.actions.iter().map(Action::name)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Index<&str> for Actions {
    type Output = Action;

    fn index(&self, name: &str) -> &Action {
        self.get(name)
            .unwrap_or_else(|| panic!("no action named `{}`", name))
    }
}

impl<'a> IntoIterator for &'a Actions {
    type Item = &'a Action;
    type IntoIter = std::slice::Iter<'a, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dispatcher, ObjectShape};
    use serde_json::json;

    #[test]
    fn test_generate_actions_keeps_order() {
        let specs = generate_actions(["login", "logout", "fetchUser"]).unwrap();
        assert_eq!(
            specs.names().collect::<Vec<_>>(),
            ["login", "logout", "fetchUser"]
        );
        assert_eq!(specs.get("login").unwrap().completions(), ["success", "error"]);
    }

    #[test]
    fn test_generate_actions_rejects_bad_names() {
        assert_eq!(
            generate_actions(["login", ""]).unwrap_err(),
            InvalidNameError::Empty
        );
        assert_eq!(
            generate_actions(["log in"]).unwrap_err(),
            InvalidNameError::NotIdentifier("log in".into())
        );
        assert_eq!(
            generate_actions(["1login"]).unwrap_err(),
            InvalidNameError::NotIdentifier("1login".into())
        );
        assert_eq!(
            generate_actions(["a", "b", "a"]).unwrap_err(),
            InvalidNameError::Duplicate("a".into())
        );
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("_private").is_ok());
        assert!(validate_name("$ref").is_ok());
        assert!(validate_name("login2").is_ok());
        assert!(validate_name("login.success").is_err());
    }

    #[test]
    fn test_completion_identities_are_distinct() {
        let dispatcher = Dispatcher::new();
        let actions = dispatcher
            .create_actions(generate_actions(["login"]).unwrap())
            .unwrap();
        let login = &actions["login"];

        assert_ne!(login.id(), login.success().id());
        assert_ne!(login.success().id(), login.error().id());
        assert_eq!(login.success().completion_kind(), Some("success"));
        assert!(login.error().is_completion());
        assert!(!login.is_completion());
        assert_eq!(login.error().handler_name(), "onLoginError");
        assert_eq!(login.error().method_name(), "loginError");
    }

    #[test]
    fn test_extra_completion() {
        let dispatcher = Dispatcher::new();
        let specs = ActionSpecs::new().spec(ActionSpec::new("upload").with_completion("progress"));
        let actions = dispatcher.create_actions(specs).unwrap();

        let names: Vec<_> = actions["upload"].completions().map(Action::name).collect();
        assert_eq!(names, ["upload.success", "upload.error", "upload.progress"]);
        assert_eq!(
            actions["upload"].completion("progress").unwrap().handler_name(),
            "onUploadProgress"
        );
    }

    #[test]
    fn test_function_specs_map_payload() {
        let dispatcher = Dispatcher::new();
        let specs = ActionSpecs::new().function("rename", |p| json!({ "name": p }));
        assert!(specs.get("rename").unwrap().has_mapper());

        let actions = dispatcher.create_actions(specs).unwrap();
        // No stores bound: dispatch is a no-op that still succeeds
        actions["rename"].dispatch("bob").unwrap();

        let rename = actions["rename"].clone();
        let store = dispatcher
            .create_store(
                ObjectShape::new("Profile")
                    .method("onRename", |_, store, payload| {
                        store.set_state(json!({ "received": payload }));
                        Ok(())
                    })
                    .constructor(move |_, store| store.bind_action(&rename, None)),
            )
            .unwrap();

        actions["rename"].dispatch("bob").unwrap();
        assert_eq!(store.get("received"), Some(json!({ "name": "bob" })));
    }

    #[test]
    fn test_actions_lookup() {
        let dispatcher = Dispatcher::new();
        let actions = dispatcher
            .create_actions(generate_actions(["login", "logout"]).unwrap())
            .unwrap();

        assert_eq!(actions.len(), 2);
        assert!(actions.contains("logout"));
        assert!(actions.get("missing").is_none());
        assert_eq!(actions.iter().map(Action::name).collect::<Vec<_>>(), ["login", "logout"]);
        assert_eq!(actions["login"].clone(), actions["login"]);
    }
}
