//! Dispatch middleware
//!
//! Middleware observes every dispatch: `before` runs ahead of the first
//! handler, `after` once all handlers returned (or the dispatch aborted).
//! Middleware cannot veto or rewrite a dispatch.

use crate::action::{Action, Payload};

/// Hook around every dispatch
pub trait Middleware {
    /// Called before any bound handler runs
    fn before(&mut self, action: &Action, payload: &Payload);

    /// Called after the dispatch finished
    ///
    /// `handled` is the number of stores whose handlers ran, including one
    /// that failed; `succeeded` is false when a handler (or `wait_for`)
    /// aborted the dispatch.
    fn after(&mut self, action: &Action, handled: usize, succeeded: bool);
}

/// A no-op middleware that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMiddleware;

impl Middleware for NoopMiddleware {
    fn before(&mut self, _action: &Action, _payload: &Payload) {}
    fn after(&mut self, _action: &Action, _handled: usize, _succeeded: bool) {}
}

/// Middleware that logs dispatches through `tracing`
#[derive(Debug, Clone, Default)]
pub struct LoggingMiddleware {
    /// Whether to log before dispatch
    pub log_before: bool,
    /// Whether to log after dispatch
    pub log_after: bool,
}

impl LoggingMiddleware {
    /// Log after dispatch only
    pub fn new() -> Self {
        Self {
            log_before: false,
            log_after: true,
        }
    }

    /// Log both before and after
    pub fn verbose() -> Self {
        Self {
            log_before: true,
            log_after: true,
        }
    }
}

impl Middleware for LoggingMiddleware {
    fn before(&mut self, action: &Action, payload: &Payload) {
        if self.log_before {
            tracing::debug!(action = %action.name(), %payload, "Dispatching action");
        }
    }

    fn after(&mut self, action: &Action, handled: usize, succeeded: bool) {
        if self.log_after {
            tracing::debug!(
                action = %action.name(),
                stores = handled,
                succeeded = succeeded,
                "Action processed"
            );
        }
    }
}

/// Compose multiple middleware into a single middleware
#[derive(Default)]
pub struct ComposedMiddleware {
    middlewares: Vec<Box<dyn Middleware>>,
}

impl std::fmt::Debug for ComposedMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComposedMiddleware")
            .field("middlewares_count", &self.middlewares.len())
            .finish()
    }
}

impl ComposedMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the composition
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Box::new(middleware));
    }

    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl Middleware for ComposedMiddleware {
    fn before(&mut self, action: &Action, payload: &Payload) {
        for middleware in &mut self.middlewares {
            middleware.before(action, payload);
        }
    }

    fn after(&mut self, action: &Action, handled: usize, succeeded: bool) {
        // Call in reverse order for proper nesting
        for middleware in self.middlewares.iter_mut().rev() {
            middleware.after(action, handled, succeeded);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{generate_actions, Dispatcher};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct Recording {
        events: Rc<RefCell<Vec<String>>>,
        tag: &'static str,
    }

    impl Middleware for Recording {
        fn before(&mut self, action: &Action, _payload: &Payload) {
            self.events
                .borrow_mut()
                .push(format!("{}:before:{}", self.tag, action.name()));
        }

        fn after(&mut self, action: &Action, handled: usize, succeeded: bool) {
            self.events.borrow_mut().push(format!(
                "{}:after:{}:{}:{}",
                self.tag,
                action.name(),
                handled,
                succeeded
            ));
        }
    }

    #[test]
    fn test_composed_after_runs_in_reverse() {
        let events = Rc::new(RefCell::new(Vec::new()));
        let mut composed = ComposedMiddleware::new();
        composed.add(Recording {
            events: events.clone(),
            tag: "a",
        });
        composed.add(Recording {
            events: events.clone(),
            tag: "b",
        });
        assert_eq!(composed.len(), 2);

        let dispatcher = Dispatcher::new();
        dispatcher.add_middleware(composed);
        let actions = dispatcher
            .create_actions(generate_actions(["login"]).unwrap())
            .unwrap();
        actions["login"].fire().unwrap();

        assert_eq!(
            *events.borrow(),
            [
                "a:before:login",
                "b:before:login",
                "b:after:login:0:true",
                "a:after:login:0:true"
            ]
        );
    }

    #[test]
    fn test_noop_and_logging_are_inert() {
        let dispatcher = Dispatcher::new();
        dispatcher.add_middleware(NoopMiddleware);
        dispatcher.add_middleware(LoggingMiddleware::verbose());
        let actions = dispatcher
            .create_actions(generate_actions(["tick"]).unwrap())
            .unwrap();
        assert!(actions["tick"].dispatch(1).is_ok());
    }
}
