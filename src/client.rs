//! Shared outbound HTTP client and size-capped body reads.
use crate::config::FetchConfig;
use futures::TryStreamExt;
use reqwest::redirect::Policy;
use std::time::Duration;
use thiserror::Error;

/// Upstream feeds commonly sit behind one or two redirects (feed proxies,
/// http→https); anything longer is treated as a broken source.
const MAX_REDIRECTS: usize = 5;

/// Builds the single client used for feeds and both content services.
///
/// Per-call deadlines are applied by each caller with `tokio::time::timeout`;
/// the client-wide timeout here is only a backstop.
pub fn build_http_client(config: &FetchConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .redirect(redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(Duration::from_secs(30))
        .tcp_keepalive(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(120))
        .build()
}

/// Failure while reading a body under a size cap.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error(transparent)]
    Network(#[from] reqwest::Error),
    #[error("Response exceeds {0} bytes")]
    TooLarge(usize),
}

/// Reads a response body, giving up as soon as it grows past `limit`.
///
/// A declared `Content-Length` over the limit is rejected before any
/// chunk is pulled.
pub async fn read_capped(response: reqwest::Response, limit: usize) -> Result<Vec<u8>, BodyError> {
    let declared = response.content_length().unwrap_or(0);
    if declared > limit as u64 {
        return Err(BodyError::TooLarge(limit));
    }

    let mut body = Vec::with_capacity(declared as usize);
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.try_next().await? {
        if body.len() + chunk.len() > limit {
            return Err(BodyError::TooLarge(limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= MAX_REDIRECTS {
            return attempt.error(format!("Too many redirects (max {})", MAX_REDIRECTS));
        }

        // Detect loops
        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}
