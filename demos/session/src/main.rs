//! Session demo - boutique example
//!
//! Walks a login flow through two stores:
//! 1. `login` marks the session pending and starts an async API call
//! 2. The call resolves into `login.success` or `login.error`
//! 3. The profile store waits for the session before building a greeting
//! 4. `logout` clears both stores
//!
//! # Usage
//!
//! ```sh
//! cargo run -p session-demo -- --user ada --password hunter2
//!
//! # Failed login, with the action log printed at the end
//! cargo run -p session-demo -- --user ada --password wrong --debug
//! ```

mod api;
mod stores;

use std::time::Duration;

use boutique::{
    generate_actions, listener, ActionLogConfig, ActionLoggerConfig, ActionLoggerMiddleware,
    Dispatcher, DispatcherConfig, TaskManager,
};
use clap::Parser;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::stores::{ProfileStore, SessionStore};

/// Session demo - boutique example
#[derive(Parser, Debug)]
#[command(name = "session-demo")]
#[command(about = "A login flow demonstrating boutique actions and stores")]
struct Args {
    /// User to sign in as
    #[arg(long, short, default_value = "ada")]
    user: String,

    /// Password ("wrong" or empty fails)
    #[arg(long, short, default_value = "hunter2")]
    password: String,

    /// Simulated API latency in milliseconds
    #[arg(long, default_value = "150")]
    latency_ms: u64,

    /// Dispatcher config as JSON, e.g. '{"warn_direct_handler_calls":false}'
    #[arg(long)]
    config: Option<String>,

    /// Log every dispatch and print the action log on exit
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let fallback = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_target(false)
        .init();

    let config = match &args.config {
        Some(json) => DispatcherConfig::from_json(json)?,
        None => DispatcherConfig::default(),
    };
    let dispatcher = Dispatcher::with_config(config);

    let logger = ActionLoggerMiddleware::with_log(ActionLogConfig::new(
        32,
        ActionLoggerConfig::default(),
    ))
    .active(args.debug);
    dispatcher.add_middleware(logger.clone());

    let actions = dispatcher.create_actions(generate_actions(["login", "logout"])?)?;
    let session = dispatcher.create_store(SessionStore::new(&actions))?;
    let profile = dispatcher.create_store(ProfileStore::new(&session, &actions))?;

    session.listen(listener(|state| {
        println!("session  {}", serde_json::Value::Object(state.clone()));
    }));
    profile.listen(listener(|state| {
        println!("profile  {}", serde_json::Value::Object(state.clone()));
    }));

    // 1. Start the login
    info!(user = %args.user, "signing in");
    actions["login"].dispatch(json!({ "user": args.user }))?;

    // 2. Resolve it asynchronously
    let mut tasks = TaskManager::new();
    tasks.spawn(
        "login",
        &actions["login"],
        api::login(
            args.user.clone(),
            args.password.clone(),
            Duration::from_millis(args.latency_ms),
        ),
    );
    while !tasks.is_empty() {
        let Some(done) = tasks.next().await else {
            break;
        };
        let ok = done.is_success();
        if tasks.complete(done)? {
            info!(ok, "login resolved");
        }
    }

    // 3. Sign out again if we got in
    if session.get("status") == Some(json!("signedIn")) {
        info!("signing out");
        actions["logout"].fire()?;
    } else {
        warn!(status = ?session.get("status"), "login did not complete");
    }

    if let Some(log) = logger.log().filter(|_| args.debug) {
        println!("\naction log:");
        for entry in log.entries() {
            println!(
                "  #{:<3} {}{:<14} stores={} ok={} payload={}",
                entry.sequence,
                "  ".repeat(entry.depth),
                entry.name,
                entry.handled.map_or("-".to_string(), |n| n.to_string()),
                entry.succeeded.map_or("-".to_string(), |ok| ok.to_string()),
                entry.payload,
            );
        }
    }

    Ok(())
}
