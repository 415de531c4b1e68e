//! HTTP client pool keeping one persistent `reqwest::Client` per base URL.
//!
//! The Drive client, the web search provider and the Gemini model listing all go
//! through here so that connections, DNS lookups and TLS sessions are reused across the
//! turns of a chat session.

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

lazy_static! {
    static ref HTTP_CLIENT_POOL: Mutex<HashMap<String, reqwest::Client>> =
        Mutex::new(HashMap::new());
}

const USER_AGENT: &str = concat!("piping-assistant/", env!("CARGO_PKG_VERSION"));

/// Get or create a shared HTTP client for the given base URL.
pub fn get_http_client(base_url: &str) -> Result<reqwest::Client, reqwest::Error> {
    // A poisoned lock only means another thread panicked mid-insert; the map is still usable.
    let mut pool = HTTP_CLIENT_POOL
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(client) = pool.get(base_url) {
        return Ok(client.clone());
    }

    let client = reqwest::ClientBuilder::new()
        .user_agent(USER_AGENT)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .pool_max_idle_per_host(10)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .timeout(Duration::from_secs(120))
        .build()?;

    pool.insert(base_url.to_string(), client.clone());
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_base_url_reuses_client() {
        get_http_client("https://pool-test.invalid/").unwrap();
        get_http_client("https://pool-test.invalid/").unwrap();
        let pool = HTTP_CLIENT_POOL.lock().unwrap();
        let matching = pool
            .keys()
            .filter(|k| k.as_str() == "https://pool-test.invalid/")
            .count();
        assert_eq!(matching, 1);
    }
}
