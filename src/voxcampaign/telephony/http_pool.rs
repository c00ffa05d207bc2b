//! Shared HTTP client pool keyed by base URL, so repeated calls to the same
//! telephony provider (or an outbound webhook tool) reuse connections
//! instead of paying a fresh DNS/TLS handshake per request.

use std::time::Duration;

use dashmap::DashMap;
use once_cell::sync::Lazy;

static CLIENT_POOL: Lazy<DashMap<String, reqwest::Client>> = Lazy::new(DashMap::new);

pub fn get_or_create_client(base_url: &str) -> reqwest::Client {
    CLIENT_POOL.entry(base_url.to_string()).or_insert_with(create_pooled_client).clone()
}

fn create_pooled_client() -> reqwest::Client {
    reqwest::ClientBuilder::new()
        .pool_max_idle_per_host(100)
        .pool_idle_timeout(Some(Duration::from_secs(90)))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .connect_timeout(Duration::from_secs(30))
        .build()
        .expect("failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_the_same_pool_entry_for_a_repeated_base_url() {
        let url = "https://api.twilio.com";
        let _c1 = get_or_create_client(url);
        let _c2 = get_or_create_client(url);
        assert!(CLIENT_POOL.contains_key(url));
    }

    #[test]
    fn different_base_urls_get_separate_entries() {
        let _c1 = get_or_create_client("https://ari.example.com");
        let _c2 = get_or_create_client("https://api.vonage.com");
        assert!(CLIENT_POOL.contains_key("https://ari.example.com"));
        assert!(CLIENT_POOL.contains_key("https://api.vonage.com"));
    }
}
