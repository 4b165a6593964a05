//! Page fetching with bounded exponential-backoff retries (spec 4.1
//! "Algorithmic details": "bounded retries with exponential backoff
//! starting at a base delay").

use std::time::Duration;

use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed after retries: {0}")]
    Exhausted(String),
}

/// Fetch `url` as text, retrying transient failures (timeouts, connection
/// errors, 5xx) up to `max_attempts` times with exponential backoff
/// starting at `backoff_base_ms`. Never retries endlessly (spec 4.1).
pub async fn fetch_page(
    client: &reqwest::Client,
    url: &str,
    max_attempts: u32,
    backoff_base_ms: u64,
) -> Result<String, FetchError> {
    let mut attempt = 0;
    loop {
        match client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                return resp
                    .text()
                    .await
                    .map_err(|e| FetchError::Exhausted(e.to_string()));
            }
            Ok(resp) => {
                let status = resp.status();
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(FetchError::Exhausted(format!("status {status}")));
                }
                let delay = Duration::from_millis(backoff_base_ms.saturating_mul(1u64 << attempt.min(6)));
                warn!(%url, %status, attempt, ?delay, "catalog page fetch failed, retrying");
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(FetchError::Exhausted(err.to_string()));
                }
                let delay = Duration::from_millis(backoff_base_ms.saturating_mul(1u64 << attempt.min(6)));
                warn!(%url, error = %err, attempt, ?delay, "catalog page fetch failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_fetch_returns_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/page")
            .with_status(200)
            .with_body("hello")
            .create_async()
            .await;
        let client = reqwest::Client::new();
        let body = fetch_page(&client, &format!("{}/page", server.url()), 3, 1)
            .await
            .unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn exhausts_retries_on_persistent_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/page")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;
        let client = reqwest::Client::new();
        let result = fetch_page(&client, &format!("{}/page", server.url()), 3, 1).await;
        assert!(result.is_err());
    }
}
