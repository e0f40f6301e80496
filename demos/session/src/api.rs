//! Pretend authentication backend

use std::time::Duration;

use boutique::Outcome;
use serde_json::json;

pub async fn login(user: String, password: String, latency: Duration) -> Outcome {
    tokio::time::sleep(latency).await;
    if password.is_empty() || password == "wrong" {
        return Err(json!({ "message": "invalid credentials", "user": user }));
    }
    let token: u64 = user.bytes().map(u64::from).sum::<u64>() * 7919;
    Ok(json!({ "user": user, "token": format!("tok-{token:x}") }))
}
