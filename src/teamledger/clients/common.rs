//! Shared HTTP plumbing for oracle clients.
//!
//! One `reqwest::Client` is kept per base URL so that connections, DNS
//! lookups and TLS sessions are reused across calls and across clients
//! pointing at the same endpoint.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

lazy_static! {
    static ref HTTP_CLIENT_POOL: Mutex<HashMap<String, reqwest::Client>> = Mutex::new(HashMap::new());
}

/// Get or create the shared HTTP client for `base_url`.
pub fn get_shared_http_client(base_url: &str) -> reqwest::Client {
    let mut pool = match HTTP_CLIENT_POOL.lock() {
        Ok(pool) => pool,
        Err(poisoned) => poisoned.into_inner(),
    };

    if let Some(client) = pool.get(base_url) {
        return client.clone();
    }

    let client = match reqwest::ClientBuilder::new()
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            log::warn!("Falling back to a default HTTP client for {}: {}", base_url, e);
            reqwest::Client::new()
        }
    };

    pool.insert(base_url.to_string(), client.clone());
    client
}

/// Keep OpenAI's `name` field within `[a-zA-Z0-9_-]{1,64}`.
pub fn sanitize_participant_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(64)
        .collect();
    cleaned
}
