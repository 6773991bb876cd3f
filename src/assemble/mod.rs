//! Fetch → rewrite → image → document orchestration.
//!
//! [`FeedAssembler`] turns a category (or the aggregate of all categories)
//! into a [`FeedDocument`]. Sources are consumed in registry order, each
//! capped at `per_source_limit` entries; the aggregate additionally stops
//! fetching once `aggregate_limit` items exist, so no external call is made
//! for entries that would be dropped.
//!
//! A single category fetches all of its sources concurrently. The aggregate
//! walks sources in order and overlaps the next fetch with the current
//! source's rewrites. Entries fan out through an order-preserving pool
//! (`buffered`), and each entry runs its title rewrite (followed by the
//! image lookup, which needs the new title) concurrently with its body
//! rewrite. Output order never depends on completion order.

mod document;

pub use document::{ChannelImage, FeedDocument, RewrittenEntry};

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, FixedOffset, Offset, Utc};
use futures::stream::{self, StreamExt};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::client::build_http_client;
use crate::config::{ChannelConfig, Config, FeedConfig, GuidStyle, ImageQueryStyle};
use crate::content::{ContentRewriter, ImageResolver, RewriteMode};
use crate::feed::{FeedFetcher, RawEntry};
use crate::registry::{CategoryRegistry, RegistryError, SourceRef};
use crate::render::render;
use crate::util::{strip_markup, truncate_chars};

#[derive(Debug, Error)]
pub enum GenerateError {
    /// The only failure a caller of `build`/`generate` can observe for bad input.
    #[error(transparent)]
    UnknownCategory(#[from] RegistryError),
    #[error("Failed to render document: {0}")]
    Render(String),
}

/// What to build: one category, or every category merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedTarget {
    Category(String),
    Aggregate,
}

impl FeedTarget {
    /// Maps a path segment to a target; `all` (any case) selects the aggregate.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case(Config::AGGREGATE_NAME) {
            FeedTarget::Aggregate
        } else {
            FeedTarget::Category(name.to_string())
        }
    }
}

pub struct FeedAssembler {
    registry: Arc<CategoryRegistry>,
    fetcher: FeedFetcher,
    rewriter: ContentRewriter,
    images: ImageResolver,
    feed: FeedConfig,
    channel: ChannelConfig,
    offset: FixedOffset,
}

impl FeedAssembler {
    pub fn new(
        registry: Arc<CategoryRegistry>,
        fetcher: FeedFetcher,
        rewriter: ContentRewriter,
        images: ImageResolver,
        feed: FeedConfig,
        channel: ChannelConfig,
    ) -> Self {
        let offset = FixedOffset::east_opt(feed.utc_offset_minutes.saturating_mul(60))
            .unwrap_or_else(|| {
                tracing::warn!(
                    minutes = feed.utc_offset_minutes,
                    "UTC offset out of range, publishing in UTC"
                );
                Utc.fix()
            });

        Self {
            registry,
            fetcher,
            rewriter,
            images,
            feed,
            channel,
            offset,
        }
    }

    /// Wires every component from a loaded configuration.
    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        let client = build_http_client(&config.fetch)?;
        Ok(Self::new(
            Arc::new(CategoryRegistry::from_config(&config.categories)),
            FeedFetcher::new(client.clone(), &config.fetch),
            ContentRewriter::new(client.clone(), &config.rewrite),
            ImageResolver::new(client, &config.image_search),
            config.feed.clone(),
            config.channel.clone(),
        ))
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Builds and renders a document in one step.
    pub async fn generate(&self, target: &FeedTarget, pretty: bool) -> Result<String, GenerateError> {
        let document = self.build(target).await?;
        render(&document, pretty).map_err(|e| GenerateError::Render(format!("{:#}", e)))
    }

    pub async fn build(&self, target: &FeedTarget) -> Result<FeedDocument, GenerateError> {
        let now = Utc::now().with_timezone(&self.offset);
        self.build_at(target, now).await
    }

    /// Builds a document stamped with `now`; every item shares this timestamp.
    pub async fn build_at(
        &self,
        target: &FeedTarget,
        now: DateTime<FixedOffset>,
    ) -> Result<FeedDocument, GenerateError> {
        let started = Instant::now();

        let (label, sources, total_cap) = match target {
            FeedTarget::Category(name) => {
                let sources = self.registry.sources_for(name).inspect_err(|_| {
                    tracing::info!(category = %name, "Unknown category requested");
                })?;
                let label = self.registry.lookup(name)?.name.clone();
                (label, sources, None)
            }
            FeedTarget::Aggregate => (
                self.channel.aggregate_label.clone(),
                self.registry.all_sources(),
                Some(self.feed.aggregate_limit),
            ),
        };

        let published = now.to_rfc2822();
        let items = self.collect_items(&sources, total_cap, &published).await;

        tracing::info!(
            feed = %label,
            sources = sources.len(),
            items = items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Assembled feed document"
        );

        Ok(self.document(&label, items))
    }

    async fn collect_items(
        &self,
        sources: &[SourceRef],
        total_cap: Option<usize>,
        published: &str,
    ) -> Vec<RewrittenEntry> {
        match total_cap {
            Some(cap) => self.collect_capped(sources, cap, published).await,
            None => self.collect_all(sources, published).await,
        }
    }

    /// Fetches every source at once, then rewrites all taken entries through
    /// one order-preserving pool.
    async fn collect_all(&self, sources: &[SourceRef], published: &str) -> Vec<RewrittenEntry> {
        let per_source = self.feed.per_source_limit;

        let fetches: Vec<_> = sources
            .iter()
            .map(|source| async move { (source, self.fetcher.fetch(&source.url).await) })
            .collect();
        let fetched: Vec<(&SourceRef, Vec<RawEntry>)> = stream::iter(fetches)
            .buffered(self.feed.max_concurrent_sources.max(1))
            .collect()
            .await;

        let taken: Vec<(&SourceRef, RawEntry)> = fetched
            .into_iter()
            .flat_map(|(source, entries)| {
                entries
                    .into_iter()
                    .take(per_source)
                    .map(move |raw| (source, raw))
            })
            .collect();

        let assembles: Vec<_> = taken
            .into_iter()
            .map(|(source, raw)| self.assemble_entry(raw, &source.category, published))
            .collect();
        stream::iter(assembles)
            .buffered(self.feed.max_concurrent_entries.max(1))
            .collect()
            .await
    }

    /// Walks sources in order until `cap` items exist. The next source is
    /// fetched while the current one is rewritten, but only when the current
    /// one cannot fill the cap on its own.
    async fn collect_capped(
        &self,
        sources: &[SourceRef],
        cap: usize,
        published: &str,
    ) -> Vec<RewrittenEntry> {
        let per_source = self.feed.per_source_limit;
        let mut items = Vec::new();
        let mut rest = sources.iter();

        let mut pending = match rest.next() {
            Some(first) => Some((first, self.fetcher.fetch(&first.url).await)),
            None => None,
        };

        while let Some((source, entries)) = pending.take() {
            let remaining = cap.saturating_sub(items.len());
            let taken: Vec<RawEntry> = entries
                .into_iter()
                .take(remaining.min(per_source))
                .collect();

            let next = if remaining > taken.len() { rest.next() } else { None };
            let prefetch = async {
                match next {
                    Some(next) => Some((next, self.fetcher.fetch(&next.url).await)),
                    None => None,
                }
            };

            let (assembled, fetched) = tokio::join!(
                self.assemble_source(taken, &source.category, published),
                prefetch
            );
            items.extend(assembled);
            pending = fetched;
        }

        if rest.len() > 0 {
            tracing::debug!(
                cap = cap,
                skipped_sources = rest.len(),
                "Aggregate cap reached, not fetching further sources"
            );
        }

        items
    }

    async fn assemble_source(
        &self,
        taken: Vec<RawEntry>,
        category: &str,
        published: &str,
    ) -> Vec<RewrittenEntry> {
        stream::iter(taken)
            .map(|raw| self.assemble_entry(raw, category, published))
            .buffered(self.feed.max_concurrent_entries.max(1))
            .collect()
            .await
    }

    async fn assemble_entry(&self, raw: RawEntry, category: &str, published: &str) -> RewrittenEntry {
        let title_and_image = async {
            let title = self
                .rewriter
                .rewrite(&raw.title, RewriteMode::Title)
                .await
                .into_text();
            let query = image_query(self.feed.image_query, category, &title);
            let image = self.images.resolve(&raw, &query).await.map(|i| i.url);
            (title, image)
        };
        let body = self.rewriter.rewrite(raw.richest_body(), RewriteMode::Body);

        let ((title, image), body) = tokio::join!(title_and_image, body);
        let content = body.into_text();
        let summary =
            truncate_chars(&strip_markup(&content), self.feed.description_max_chars).into_owned();

        RewrittenEntry {
            title,
            summary,
            content,
            guid: guid_for(&raw.link, self.feed.guid_style, &self.feed.guid_suffix),
            link: raw.link,
            published: published.to_string(),
            image,
            author: self.channel.author.clone(),
        }
    }

    fn document(&self, label: &str, items: Vec<RewrittenEntry>) -> FeedDocument {
        let title = format!("{} News", label);
        let image = self.channel.logo_url.as_ref().map(|url| ChannelImage {
            url: url.clone(),
            title: title.clone(),
            link: self.channel.link.clone(),
        });

        FeedDocument {
            description: format!("Latest {} stories, rewritten and summarized.", label),
            title,
            link: self.channel.link.clone(),
            language: self.channel.language.clone(),
            copyright: self.channel.copyright.clone(),
            docs: self.channel.docs.clone(),
            image,
            items,
        }
    }
}

/// Search query for entries that carry no image of their own.
pub fn image_query(style: ImageQueryStyle, category: &str, title: &str) -> String {
    match style {
        ImageQueryStyle::Title => title.to_string(),
        ImageQueryStyle::CategoryAndTitle => format!("{} {}", category, title),
    }
}

/// Item guid as a pure function of the link.
pub fn guid_for(link: &str, style: GuidStyle, suffix: &str) -> String {
    match style {
        GuidStyle::Link => format!("{}{}", link, suffix),
        GuidStyle::Hash => format!("{:x}", Sha256::digest(link.as_bytes())),
    }
}
