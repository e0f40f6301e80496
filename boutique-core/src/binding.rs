//! Per-store binding table and handler naming convention
//!
//! A binding ties one action identity to one handler name on one store.
//! Bindings live in the store that declared them; the dispatcher only keeps
//! the `action → stores` graph it needs to find dispatch targets.

use crate::action::{Action, ActionId};

/// `on` + capitalized segments: `login` → `onLogin`, `login.success` → `onLoginSuccess`
pub fn conventional_handler(action_name: &str) -> String {
    let mut handler = String::from("on");
    for segment in action_name.split('.') {
        handler.push_str(&capitalize(segment));
    }
    handler
}

/// Bare method name for an action: `login` → `login`, `login.success` → `loginSuccess`
pub fn fallback_method(action_name: &str) -> String {
    let mut segments = action_name.split('.');
    let mut method = segments.next().unwrap_or_default().to_string();
    for segment in segments {
        method.push_str(&capitalize(segment));
    }
    method
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// One (action, handler) pair on a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub action: ActionId,
    pub action_name: String,
    pub handler: String,
}

/// Ordered bindings of a single store
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    entries: Vec<Binding>,
}

impl BindingTable {
    /// Record a binding; returns `false` if the exact pair already exists
    pub fn insert(&mut self, action: &Action, handler: &str) -> bool {
        let exists = self
            .entries
            .iter()
            .any(|b| b.action == action.id() && b.handler == handler);
        if exists {
            return false;
        }
        self.entries.push(Binding {
            action: action.id(),
            action_name: action.name().to_string(),
            handler: handler.to_string(),
        });
        true
    }

    /// Handlers bound to `action`, in binding order
    pub fn handlers_for(&self, action: ActionId) -> Vec<String> {
        self.entries
            .iter()
            .filter(|b| b.action == action)
            .map(|b| b.handler.clone())
            .collect()
    }

    pub fn is_handler_bound(&self, handler: &str) -> bool {
        self.entries.iter().any(|b| b.handler == handler)
    }

    pub fn is_action_bound(&self, action: ActionId) -> bool {
        self.entries.iter().any(|b| b.action == action)
    }

    pub fn entries(&self) -> &[Binding] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Explicit handler → actions map for `Store::bind_listeners`
///
/// ```ignore
/// store.bind_listeners(
///     Listeners::new()
///         .on("onSuccess", [actions["login"].success(), actions["logout"].success()])
///         .on("onLogin", [&actions["login"]]),
/// )?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct Listeners {
    entries: Vec<(String, Vec<Action>)>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind every action in `actions` to `handler`
    pub fn on<'a>(
        mut self,
        handler: impl Into<String>,
        actions: impl IntoIterator<Item = &'a Action>,
    ) -> Self {
        let handler = handler.into();
        let actions = actions.into_iter().cloned();
        match self.entries.iter_mut().find(|(h, _)| *h == handler) {
            Some((_, existing)) => existing.extend(actions),
            None => self.entries.push((handler, actions.collect())),
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Action])> {
        self.entries.iter().map(|(h, a)| (h.as_str(), a.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Listeners {
    type Item = (String, Vec<Action>);
    type IntoIter = std::vec::IntoIter<(String, Vec<Action>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
