//! Configuration file parser for `newswire.toml`.
//!
//! The config file is optional: a missing file yields `Config::default()`,
//! which carries a built-in category set. Unknown keys, top-level or inside a
//! section, are ignored by serde and reported as warnings.
//!
//! Secrets may come from the file or from the environment; the environment
//! wins. They are resolved once in [`Config::with_env_overrides`] and never
//! read from the process environment afterwards.
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Environment variable holding the rewrite service token.
pub const REWRITE_API_KEY_ENV: &str = "REWRITE_API_KEY";
/// Environment variable holding the image search key.
pub const IMAGE_SEARCH_API_KEY_ENV: &str = "IMAGE_SEARCH_API_KEY";
/// Environment variable naming the server the refresh companion calls.
pub const BASE_URL_ENV: &str = "BASE_URL";
/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "PORT";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Socket address the HTTP server listens on.
    pub bind: String,

    /// Base address of a running server, used by the refresh companion.
    pub base_url: String,

    /// Default for pretty-printed output when a request does not say.
    pub pretty_print: bool,

    pub feed: FeedConfig,
    pub fetch: FetchConfig,
    pub rewrite: RewriteConfig,
    pub image_search: ImageSearchConfig,
    pub channel: ChannelConfig,

    /// Ordered category list. Order here is the aggregate iteration order.
    pub categories: Vec<CategoryConfig>,
}

/// Assembly limits and item-level formatting.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Maximum entries taken from a single source.
    pub per_source_limit: usize,
    /// Maximum items in the aggregate document.
    pub aggregate_limit: usize,
    /// Length of the short `<description>`, in characters, before `...`.
    pub description_max_chars: usize,
    /// Entries processed concurrently within a request.
    pub max_concurrent_entries: usize,
    /// Sources of a single category fetched concurrently.
    pub max_concurrent_sources: usize,
    /// How the image search query is built when an entry carries no image.
    pub image_query: ImageQueryStyle,
    pub guid_style: GuidStyle,
    /// Appended to the link when `guid_style = "link"`.
    pub guid_suffix: String,
    /// Fixed UTC offset (minutes) applied to publish dates.
    pub utc_offset_minutes: i32,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            per_source_limit: 5,
            aggregate_limit: 20,
            description_max_chars: 500,
            max_concurrent_entries: 4,
            max_concurrent_sources: 10,
            image_query: ImageQueryStyle::CategoryAndTitle,
            guid_style: GuidStyle::Link,
            guid_suffix: "#ai-rewrite".to_string(),
            utc_offset_minutes: 0,
        }
    }
}

/// Image search query composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageQueryStyle {
    /// The rewritten title alone.
    Title,
    /// `"<category> <rewritten title>"`.
    CategoryAndTitle,
}

/// How an item guid is derived from its link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidStyle {
    /// Link followed by `guid_suffix`.
    Link,
    /// Lowercase hex SHA-256 of the link.
    Hash,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    /// Response bodies above this size are treated as a failed fetch.
    pub max_feed_bytes: usize,
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_feed_bytes: 10 * 1024 * 1024,
            user_agent: concat!("newswire/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Rewrite service (OpenAI-compatible chat completions).
///
/// Custom Debug impl masks `api_key` to prevent secret leakage in logs.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Token for the rewrite service. `REWRITE_API_KEY` takes precedence.
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    pub title_max_tokens: u32,
    pub body_max_tokens: u32,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            timeout_secs: 30,
            title_max_tokens: 60,
            body_max_tokens: 900,
        }
    }
}

impl std::fmt::Debug for RewriteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("title_max_tokens", &self.title_max_tokens)
            .field("body_max_tokens", &self.body_max_tokens)
            .finish()
    }
}

/// Image search service (Pexels-style API).
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ImageSearchConfig {
    /// Key for the image service. `IMAGE_SEARCH_API_KEY` takes precedence.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ImageSearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.pexels.com".to_string(),
            timeout_secs: 10,
        }
    }
}

impl std::fmt::Debug for ImageSearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSearchConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Channel-level metadata shared by every generated document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub link: String,
    pub language: String,
    pub copyright: String,
    pub docs: String,
    /// `dc:creator` on every item.
    pub author: String,
    /// Label used in place of a category name for the aggregate document.
    pub aggregate_label: String,
    /// Logo URL; the `<image>` block is omitted when unset.
    pub logo_url: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            link: "https://example.com".to_string(),
            language: "en-us".to_string(),
            copyright: "Copyright Newswire. Original reporting belongs to the linked publishers."
                .to_string(),
            docs: "https://www.rssboard.org/rss-specification".to_string(),
            author: "Newswire Desk".to_string(),
            aggregate_label: "All Topics".to_string(),
            logo_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryConfig {
    pub name: String,
    pub sources: Vec<String>,
}

impl CategoryConfig {
    fn new(name: &str, sources: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            sources: sources.iter().map(|s| s.to_string()).collect(),
        }
    }
}

fn default_categories() -> Vec<CategoryConfig> {
    vec![
        CategoryConfig::new(
            "Technology",
            &[
                "https://feeds.bbci.co.uk/news/technology/rss.xml",
                "https://www.theverge.com/rss/index.xml",
                "https://feeds.arstechnica.com/arstechnica/index",
            ],
        ),
        CategoryConfig::new(
            "Business",
            &[
                "https://feeds.bbci.co.uk/news/business/rss.xml",
                "https://www.cnbc.com/id/10001147/device/rss/rss.html",
            ],
        ),
        CategoryConfig::new(
            "Science",
            &[
                "https://feeds.bbci.co.uk/news/science_and_environment/rss.xml",
                "https://www.sciencedaily.com/rss/top/science.xml",
            ],
        ),
        CategoryConfig::new(
            "Sports",
            &[
                "https://feeds.bbci.co.uk/sport/rss.xml",
                "https://www.espn.com/espn/rss/news",
            ],
        ),
        CategoryConfig::new(
            "World",
            &[
                "https://feeds.bbci.co.uk/news/world/rss.xml",
                "https://rss.nytimes.com/services/xml/rss/nyt/World.xml",
            ],
        ),
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            base_url: "http://127.0.0.1:8000".to_string(),
            pretty_print: true,
            feed: FeedConfig::default(),
            fetch: FetchConfig::default(),
            rewrite: RewriteConfig::default(),
            image_search: ImageSearchConfig::default(),
            channel: ChannelConfig::default(),
            categories: default_categories(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Category name reserved for the aggregate document.
    pub const AGGREGATE_NAME: &'static str = "all";

    /// Loads configuration from a TOML file.
    ///
    /// A missing or blank file yields the defaults. Unknown keys are logged
    /// and ignored; type errors, files over 1 MB and invalid values fail.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = read_bounded(path, Self::MAX_FILE_SIZE)? else {
            tracing::debug!(path = %path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        warn_unknown_keys(&content);

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        tracing::info!(
            path = %path.display(),
            categories = config.categories.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Applies environment overrides for secrets and deployment settings.
    ///
    /// Environment values take precedence over the config file.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(REWRITE_API_KEY_ENV) {
            self.rewrite.api_key = Some(key);
        }
        if let Some(key) = non_empty(IMAGE_SEARCH_API_KEY_ENV) {
            self.image_search.api_key = Some(key);
        }
        if let Some(base) = non_empty(BASE_URL_ENV) {
            self.base_url = base;
        }
        if let Some(port) = non_empty(PORT_ENV) {
            match port.parse::<u16>() {
                Ok(port) => {
                    let host = self.bind.rsplit_once(':').map_or("0.0.0.0", |(h, _)| h);
                    self.bind = format!("{}:{}", host, port);
                }
                Err(_) => tracing::warn!(port = %port, "Ignoring non-numeric PORT"),
            }
        }
        self
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.feed.per_source_limit == 0 {
            return Err(ConfigError::Invalid(
                "feed.per_source_limit must be at least 1".to_string(),
            ));
        }
        if self.feed.aggregate_limit == 0 {
            return Err(ConfigError::Invalid(
                "feed.aggregate_limit must be at least 1".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for category in &self.categories {
            let key = category.name.trim().to_lowercase();
            if key.is_empty() {
                return Err(ConfigError::Invalid("category name is empty".to_string()));
            }
            if key == Self::AGGREGATE_NAME {
                return Err(ConfigError::Invalid(format!(
                    "category name '{}' is reserved for the aggregate feed",
                    category.name
                )));
            }
            if !seen.insert(key) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate category '{}'",
                    category.name
                )));
            }
        }
        Ok(())
    }
}

/// Top-level tables and the keys each one accepts.
const KNOWN_KEYS: &[(&str, &[&str])] = &[
    ("bind", &[]),
    ("base_url", &[]),
    ("pretty_print", &[]),
    (
        "feed",
        &[
            "per_source_limit",
            "aggregate_limit",
            "description_max_chars",
            "max_concurrent_entries",
            "max_concurrent_sources",
            "image_query",
            "guid_style",
            "guid_suffix",
            "utc_offset_minutes",
        ],
    ),
    ("fetch", &["timeout_secs", "max_feed_bytes", "user_agent"]),
    (
        "rewrite",
        &[
            "api_key",
            "base_url",
            "model",
            "temperature",
            "timeout_secs",
            "title_max_tokens",
            "body_max_tokens",
        ],
    ),
    ("image_search", &["api_key", "base_url", "timeout_secs"]),
    (
        "channel",
        &[
            "link",
            "language",
            "copyright",
            "docs",
            "author",
            "aggregate_label",
            "logo_url",
        ],
    ),
    ("categories", &[]),
];

/// Reads a file of at most `max` bytes. `None` when it does not exist.
fn read_bounded(path: &Path, max: u64) -> Result<Option<String>, ConfigError> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut content = String::new();
    file.take(max + 1).read_to_string(&mut content)?;
    if content.len() as u64 > max {
        return Err(ConfigError::TooLarge(format!(
            "{} is over the {} byte limit",
            path.display(),
            max
        )));
    }
    Ok(Some(content))
}

/// Logs keys serde would silently drop, including misspelled section fields.
/// Syntax errors are left for the typed parse to report.
fn warn_unknown_keys(content: &str) {
    let Ok(raw) = content.parse::<toml::Table>() else {
        return;
    };

    for (key, value) in &raw {
        let Some((_, fields)) = KNOWN_KEYS.iter().find(|(name, _)| *name == key.as_str()) else {
            tracing::warn!(key = %key, "Unknown key in config file, ignoring");
            continue;
        };
        let Some(table) = value.as_table().filter(|_| !fields.is_empty()) else {
            continue;
        };
        for field in table.keys() {
            if !fields.contains(&field.as_str()) {
                tracing::warn!(key = %format!("{}.{}", key, field), "Unknown key in config file, ignoring");
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
