/// One published item, derived from exactly one upstream entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenEntry {
    pub title: String,
    /// Plain-text summary, truncated to the configured description length.
    pub summary: String,
    /// Full rewritten body, untruncated.
    pub content: String,
    pub link: String,
    /// Pure function of `link`.
    pub guid: String,
    /// RFC 2822 generation timestamp in the configured fixed offset.
    pub published: String,
    pub image: Option<String>,
    /// Attribution label (`dc:creator`).
    pub author: String,
}

/// Channel logo block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelImage {
    pub url: String,
    pub title: String,
    pub link: String,
}

/// A complete syndication document, ready for rendering.
///
/// Item order is source iteration order, then per-source entry order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedDocument {
    pub title: String,
    pub link: String,
    pub description: String,
    pub language: String,
    pub copyright: String,
    pub docs: String,
    pub image: Option<ChannelImage>,
    pub items: Vec<RewrittenEntry>,
}
