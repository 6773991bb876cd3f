//! Companion client that pokes a running server's `/refresh` endpoint.
//!
//! Meant for cron-style schedulers: failures are logged, never returned.
use std::time::Duration;

pub const REFRESH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Refresh request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Refresh timed out after {0:?}")]
    Timeout(Duration),
}

/// Requests a refresh and returns the response text.
pub async fn request_refresh(
    client: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
) -> Result<String, RefreshError> {
    let url = format!("{}/refresh", base_url.trim_end_matches('/'));
    tracing::debug!(url = %url, "Requesting refresh");

    tokio::time::timeout(timeout, async {
        let response = client.get(&url).send().await?;
        response.text().await
    })
    .await
    .map_err(|_| RefreshError::Timeout(timeout))?
    .map_err(RefreshError::from)
}

/// Requests a refresh and logs the outcome.
pub async fn run_refresh(client: &reqwest::Client, base_url: &str, timeout: Duration) {
    match request_refresh(client, base_url, timeout).await {
        Ok(text) => tracing::info!(response = %text, "Refresh response"),
        Err(e) => tracing::error!(base_url = %base_url, error = %e, "Error during refresh"),
    }
}
