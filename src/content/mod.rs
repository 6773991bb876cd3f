//! Outbound calls to the external content services.
//!
//! - [`rewriter`] - title/body rewriting through a text-generation API
//! - [`image`] - representative image selection with an image-search fallback
//!
//! Both services degrade instead of failing: their public entry points never
//! return an error, only a value that says whether it was degraded.

mod image;
mod rewriter;

pub use image::{ImageResolver, ImageSearchError, ImageSource, ResolvedImage};
pub use rewriter::{ContentRewriter, RewriteError, RewriteMode, RewriteOutcome};

use crate::client::BodyError;
use thiserror::Error;
use url::{Host, Url};

/// Transport-level failures shared by both services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Insecure base URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

impl From<BodyError> for ServiceError {
    fn from(err: BodyError) -> Self {
        match err {
            BodyError::Network(e) => ServiceError::Network(e),
            BodyError::TooLarge(limit) => ServiceError::ResponseTooLarge(limit),
        }
    }
}

/// Credentials are only ever sent over HTTPS; plain HTTP is allowed for
/// localhost so tests can run against a local mock server. The host must be
/// exactly `localhost` or a loopback address, not merely start with one.
pub(crate) fn check_base_url(url: &str) -> Result<(), ServiceError> {
    let parsed = Url::parse(url).map_err(|_| ServiceError::InsecureBaseUrl)?;
    let allowed = match parsed.scheme() {
        "https" => true,
        "http" => match parsed.host() {
            Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(Host::Ipv4(ip)) => ip.is_loopback(),
            Some(Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        },
        _ => false,
    };
    if !allowed {
        tracing::error!(url = %url, "Rejecting non-HTTPS service URL (HTTPS required except for localhost)");
        return Err(ServiceError::InsecureBaseUrl);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_allowed() {
        assert!(check_base_url("https://api.openai.com/v1/chat/completions").is_ok());
    }

    #[test]
    fn test_localhost_http_allowed() {
        assert!(check_base_url("http://127.0.0.1:4545/v1/search").is_ok());
        assert!(check_base_url("http://localhost:8080/chat/completions").is_ok());
        assert!(check_base_url("http://[::1]:8080/chat/completions").is_ok());
    }

    #[test]
    fn test_remote_http_rejected() {
        assert!(matches!(
            check_base_url("http://evil.com/chat/completions"),
            Err(ServiceError::InsecureBaseUrl)
        ));
    }

    #[test]
    fn test_localhost_lookalike_hosts_rejected() {
        for url in [
            "http://localhost.attacker.net/chat/completions",
            "http://127.0.0.1.nip.io/v1/search",
            "http://localhostevil.com/",
            "http://127.0.0.1@evil.com/",
        ] {
            assert!(
                matches!(check_base_url(url), Err(ServiceError::InsecureBaseUrl)),
                "{} should be rejected",
                url
            );
        }
    }

    #[test]
    fn test_unparsable_url_rejected() {
        assert!(check_base_url("not a url").is_err());
        assert!(check_base_url("ftp://localhost/").is_err());
    }
}
