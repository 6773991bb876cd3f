//! Source feed retrieval and normalization.
//!
//! - [`parser`] - RSS/Atom parsing via `feed-rs` into the uniform [`RawEntry`] shape
//! - [`fetcher`] - single-attempt HTTP retrieval with timeout and size cap
//!
//! # Example
//!
//! ```ignore
//! use newswire::feed::FeedFetcher;
//!
//! let fetcher = FeedFetcher::new(client, &config.fetch);
//! // Never fails: a broken source yields an empty list
//! let entries = fetcher.fetch("https://feeds.bbci.co.uk/news/rss.xml").await;
//! ```

mod fetcher;
mod parser;

pub use fetcher::{FeedFetcher, FetchError};
pub use parser::{parse_feed, ParseResult, RawEntry, TypedLink};
