use crate::client::read_capped;
use crate::config::ImageSearchConfig;
use crate::content::{check_base_url, ServiceError};
use crate::feed::RawEntry;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

const MAX_RESPONSE_SIZE: usize = 2 * 1024 * 1024; // 2MB

#[derive(Debug, Error)]
pub enum ImageSearchError {
    #[error("Image search key not configured")]
    MissingCredential,
    #[error("Empty search query")]
    EmptyQuery,
    #[error("Invalid search URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("No images found")]
    NoResults,
}

/// Which precedence tier produced an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSource {
    /// Media attachment embedded in the entry
    Media,
    /// First entry link typed `image/*`
    TypedLink,
    /// External image search
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub url: String,
    pub source: ImageSource,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Deserialize)]
struct Photo {
    src: PhotoSources,
}

#[derive(Deserialize)]
struct PhotoSources {
    #[serde(default)]
    large: Option<String>,
    #[serde(default)]
    original: Option<String>,
}

/// Picks a representative image per entry.
///
/// Precedence, first match wins: embedded media attachment, first
/// `image/*` typed link, then an image search for the fallback query.
/// A failed search means "no image", never an error.
pub struct ImageResolver {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
    timeout: Duration,
}

impl ImageResolver {
    pub fn new(client: reqwest::Client, config: &ImageSearchConfig) -> Self {
        let api_key = config
            .api_key
            .as_ref()
            .filter(|k| !k.trim().is_empty())
            .map(|k| SecretString::from(k.clone()));

        if api_key.is_none() {
            tracing::info!("No image search key configured, search fallback disabled");
        }

        Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    pub async fn resolve(&self, entry: &RawEntry, fallback_query: &str) -> Option<ResolvedImage> {
        if let Some(url) = entry.media.first() {
            return Some(ResolvedImage {
                url: url.clone(),
                source: ImageSource::Media,
            });
        }

        if let Some(link) = entry
            .typed_links
            .iter()
            .find(|l| l.media_type.starts_with("image"))
        {
            return Some(ResolvedImage {
                url: link.href.clone(),
                source: ImageSource::TypedLink,
            });
        }

        match self.search(fallback_query).await {
            Ok(url) => Some(ResolvedImage {
                url,
                source: ImageSource::Search,
            }),
            Err(ImageSearchError::MissingCredential) => None,
            Err(e @ (ImageSearchError::NoResults | ImageSearchError::EmptyQuery)) => {
                tracing::debug!(query = %fallback_query, reason = %e, "No image for entry");
                None
            }
            Err(e) => {
                tracing::warn!(query = %fallback_query, error = %e, "Image search failed");
                None
            }
        }
    }

    /// Queries the image service and returns the first hit's URL.
    pub async fn search(&self, query: &str) -> Result<String, ImageSearchError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(ImageSearchError::MissingCredential)?;

        let query = query.trim();
        if query.is_empty() {
            return Err(ImageSearchError::EmptyQuery);
        }

        let mut url = Url::parse(&format!("{}/v1/search", self.base_url))?;
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("per_page", "1");

        check_base_url(url.as_str())?;

        let request = self
            .client
            .get(url)
            .header("Authorization", api_key.expose_secret())
            .send();

        let body = tokio::time::timeout(self.timeout, async {
            let response = request.await.map_err(ServiceError::Network)?;
            if !response.status().is_success() {
                return Err(ServiceError::HttpStatus(response.status().as_u16()));
            }
            Ok(read_capped(response, MAX_RESPONSE_SIZE).await?)
        })
        .await
        .map_err(|_| ServiceError::Timeout)??;

        let parsed: SearchResponse =
            serde_json::from_slice(&body).map_err(|e| ImageSearchError::Malformed(e.to_string()))?;

        parsed
            .photos
            .into_iter()
            .next()
            .and_then(|p| p.src.large.or(p.src.original))
            .filter(|u| !u.is_empty())
            .ok_or(ImageSearchError::NoResults)
    }
}
