use boutique::{
    store_methods, Actions, HandlerResult, Listeners, Payload, Store, StoreCore, StoreShape,
};
use serde_json::json;

pub struct SessionStore {
    actions: Actions,
    attempts: u32,
}

impl SessionStore {
    pub fn new(actions: &Actions) -> Self {
        Self {
            actions: actions.clone(),
            attempts: 0,
        }
    }
}

#[store_methods]
impl SessionStore {
    fn on_login(&mut self, store: &StoreCore, payload: &Payload) {
        self.attempts += 1;
        store.set_state(json!({
            "status": "pending",
            "user": payload["user"],
            "attempts": self.attempts,
        }));
    }

    fn on_login_success(&self, store: &StoreCore, payload: &Payload) {
        store.set_state(json!({ "status": "signedIn", "token": payload["token"], "error": null }));
    }

    fn on_login_error(&self, store: &StoreCore, payload: &Payload) {
        store.set_state(json!({ "status": "failed", "error": payload }));
    }

    fn on_logout(&self, store: &StoreCore) {
        store.set_state(json!({ "status": "signedOut", "user": null, "token": null }));
    }
}

impl StoreShape for SessionStore {
    fn construct(&mut self, store: &Store<Self>) -> boutique::Result<()> {
        store.set_state(json!({ "status": "signedOut" }));
        store.bind_actions(&self.actions)
    }
}

/// Derives a greeting from the session; always reacts after it
pub struct ProfileStore {
    session: Store<SessionStore>,
    actions: Actions,
}

impl ProfileStore {
    pub fn new(session: &Store<SessionStore>, actions: &Actions) -> Self {
        Self {
            session: session.clone(),
            actions: actions.clone(),
        }
    }
}

#[store_methods]
impl ProfileStore {
    fn on_login_success(&self, store: &StoreCore) -> HandlerResult {
        store.wait_for(&self.session)?;
        let user = self
            .session
            .get("user")
            .and_then(|u| u.as_str().map(str::to_string))
            .unwrap_or_else(|| "stranger".to_string());
        store.set_state(json!({ "greeting": format!("Welcome back, {user}") }));
        Ok(())
    }

    fn on_logout(&self, store: &StoreCore) -> HandlerResult {
        store.wait_for(&self.session)?;
        store.set_state(json!({ "greeting": null }));
        Ok(())
    }
}

impl StoreShape for ProfileStore {
    fn construct(&mut self, store: &Store<Self>) -> boutique::Result<()> {
        // Nothing to do until the login resolves
        store.bind_listeners(
            Listeners::new()
                .on("onLoginSuccess", [self.actions["login"].success()])
                .on("onLogout", [&self.actions["logout"]]),
        )
    }
}
