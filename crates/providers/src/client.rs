use reqwest::Client;
use std::time::Duration;
use tracing::warn;

pub const USER_AGENT: &str = concat!("switchyard/", env!("CARGO_PKG_VERSION"));

/// Build the shared HTTP client. Proxy settings follow the standard
/// `HTTPS_PROXY` / `HTTP_PROXY` / `NO_PROXY` environment variables.
pub fn build_http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build HTTP client, using default");
            Client::new()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_http_client() {
        let client = build_http_client(Duration::from_secs(5));
        drop(client);
        assert!(USER_AGENT.starts_with("switchyard/"));
    }
}
