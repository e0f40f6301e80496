//! boutique: Flux-style actions and stores for Rust
//!
//! Actions are named, callable identities; invoking one dispatches its
//! payload synchronously to every store bound to it. Stores hold a JSON
//! object state, notify listeners once per dispatch, and can order
//! themselves against each other with `wait_for`.
//!
//! # Example
//! ```
//! use boutique::prelude::*;
//! use serde_json::json;
//!
//! #[derive(Default)]
//! struct Session {
//!     actions: Actions,
//! }
//!
//! #[store_methods]
//! impl Session {
//!     fn on_login(&mut self, store: &StoreCore, payload: &Payload) {
//!         store.set_state(json!({ "user": payload }));
//!     }
//! }
//!
//! impl StoreShape for Session {
//!     fn construct(&mut self, store: &Store<Self>) -> boutique::Result<()> {
//!         store.bind_actions(&self.actions)
//!     }
//! }
//!
//! let dispatcher = Dispatcher::new();
//! let actions = dispatcher.create_actions(generate_actions(["login"])?)?;
//! let session = dispatcher.create_store(Session { actions: actions.clone() })?;
//!
//! actions["login"].dispatch("ada")?;
//! assert_eq!(session.get("user"), Some(json!("ada")));
//! # Ok::<(), boutique::Error>(())
//! ```

// Re-export everything from core
pub use boutique_core::*;

// Re-export the attribute macro
pub use boutique_macros::store_methods;

/// Prelude for convenient imports
pub mod prelude {
    pub use boutique_core::prelude::*;

    // Attribute macro
    pub use boutique_macros::store_methods;
}
