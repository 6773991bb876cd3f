use crate::client::{read_capped, BodyError};
use crate::config::FetchConfig;
use crate::feed::parser::{parse_feed, ParseResult, RawEntry};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while fetching one source feed.
///
/// None of these escape [`FeedFetcher::fetch`]; they are logged and the
/// source contributes zero entries.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Source answered with status {0}")]
    HttpStatus(u16),
    /// The whole request, body included, outlived the source timeout.
    #[error("Source timed out")]
    Timeout,
    /// Neither RSS nor Atom.
    #[error("Unreadable feed: {0}")]
    Parse(String),
    #[error("Feed larger than {0} bytes")]
    ResponseTooLarge(usize),
}

impl From<BodyError> for FetchError {
    fn from(err: BodyError) -> Self {
        match err {
            BodyError::Network(e) => FetchError::Network(e),
            BodyError::TooLarge(limit) => FetchError::ResponseTooLarge(limit),
        }
    }
}

/// Retrieves and normalizes entries from source feeds.
///
/// One attempt per call, bounded by the configured timeout covering both the
/// request and the body download. Truncation to the per-source cap is the
/// caller's job; this returns everything the feed holds, in document order.
#[derive(Clone)]
pub struct FeedFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl FeedFetcher {
    pub fn new(client: reqwest::Client, config: &FetchConfig) -> Self {
        Self {
            client,
            timeout: Duration::from_secs(config.timeout_secs),
            max_bytes: config.max_feed_bytes,
        }
    }

    /// Fetches a source and returns its entries, or an empty list on any failure.
    pub async fn fetch(&self, url: &str) -> Vec<RawEntry> {
        match self.try_fetch(url).await {
            Ok(entries) => {
                tracing::debug!(feed = %url, entries = entries.len(), "Fetched source feed");
                entries
            }
            Err(e) => {
                tracing::warn!(feed = %url, error = %e, "Source feed failed, skipping");
                Vec::new()
            }
        }
    }

    /// Fetches a source, surfacing the failure reason.
    pub async fn try_fetch(&self, url: &str) -> Result<Vec<RawEntry>, FetchError> {
        let bytes = tokio::time::timeout(self.timeout, self.download(url))
            .await
            .map_err(|_| FetchError::Timeout)??;

        let ParseResult { entries, skipped } =
            parse_feed(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

        if skipped > 0 {
            tracing::warn!(
                feed = %url,
                skipped = skipped,
                "Entries without a usable link skipped"
            );
        }

        Ok(entries)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        Ok(read_capped(response, self.max_bytes).await?)
    }
}
