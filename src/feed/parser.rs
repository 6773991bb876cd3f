use anyhow::Result;
use feed_rs::model::Entry;
use feed_rs::parser;

/// A link that declares its media type (`<link rel="enclosure" type="image/png">`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedLink {
    pub href: String,
    pub media_type: String,
}

/// Normalized view of one upstream article.
///
/// Optional upstream fields are resolved once here so assembly never has to
/// probe the original feed structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    /// Full body content when the feed carries one (`content:encoded`, Atom `<content>`).
    pub content: Option<String>,
    /// Image attachment URLs in document order.
    pub media: Vec<String>,
    pub typed_links: Vec<TypedLink>,
}

impl RawEntry {
    /// Richest text available: full content, then summary, then the title.
    pub fn richest_body(&self) -> &str {
        self.content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .or_else(|| self.summary.as_deref().filter(|s| !s.trim().is_empty()))
            .unwrap_or(&self.title)
    }
}

pub struct ParseResult {
    pub entries: Vec<RawEntry>,
    /// Entries dropped because no usable link could be found
    pub skipped: usize,
}

/// Parses RSS 0.9x/1.0/2.0, Atom or JSON Feed bytes, keeping document order.
pub fn parse_feed(bytes: &[u8]) -> Result<ParseResult> {
    let feed = parser::parse(bytes)?;

    let total = feed.entries.len();
    let entries: Vec<RawEntry> = feed.entries.into_iter().filter_map(normalize).collect();
    let skipped = total - entries.len();

    Ok(ParseResult { entries, skipped })
}

fn normalize(entry: Entry) -> Option<RawEntry> {
    let link = pick_link(&entry)?;

    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let summary = entry.summary.map(|s| s.content);
    let content = entry.content.and_then(|c| c.body);

    let media = entry
        .media
        .iter()
        .flat_map(|m| {
            let contents = m
                .content
                .iter()
                .filter(|c| {
                    c.content_type
                        .as_ref()
                        .map_or(true, |ct| ct.to_string().starts_with("image"))
                })
                .filter_map(|c| c.url.as_ref().map(|u| u.to_string()));
            let thumbnails = m.thumbnails.iter().map(|t| t.image.uri.clone());
            contents.chain(thumbnails)
        })
        .filter(|u| !u.is_empty())
        .collect();

    let typed_links = entry
        .links
        .iter()
        .filter_map(|l| {
            l.media_type.as_ref().map(|t| TypedLink {
                href: l.href.clone(),
                media_type: t.clone(),
            })
        })
        .collect();

    Some(RawEntry {
        title,
        link,
        summary,
        content,
        media,
        typed_links,
    })
}

/// Article link: the first alternate (or untyped) link, else any link, else
/// an id that is itself an http(s) URL.
fn pick_link(entry: &Entry) -> Option<String> {
    let alternate = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |r| r == "alternate"));

    alternate
        .or_else(|| entry.links.first())
        .map(|l| l.href.trim().to_string())
        .filter(|h| !h.is_empty())
        .or_else(|| {
            let id = entry.id.trim();
            (id.starts_with("http://") || id.starts_with("https://")).then(|| id.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/" xmlns:content="http://purl.org/rss/1.0/modules/content/">
<channel>
  <title>Upstream</title>
  <item>
    <title>First &amp;amp; foremost</title>
    <link>https://news.example/1</link>
    <description>Short summary one</description>
    <content:encoded><![CDATA[<p>Full body one</p>]]></content:encoded>
    <media:content url="https://img.example/1.jpg" medium="image" type="image/jpeg"/>
  </item>
  <item>
    <title>Second</title>
    <link>https://news.example/2</link>
    <description>Summary two</description>
  </item>
  <item>
    <title>No link at all</title>
    <description>dropped</description>
  </item>
</channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Atom upstream</title>
  <id>urn:feed</id>
  <updated>2024-01-01T00:00:00Z</updated>
  <entry>
    <title>Atom entry</title>
    <id>https://atom.example/entry-1</id>
    <updated>2024-01-01T00:00:00Z</updated>
    <link rel="alternate" href="https://atom.example/a"/>
    <link rel="enclosure" type="image/png" href="https://atom.example/pic.png"/>
    <summary>Atom summary</summary>
  </entry>
  <entry>
    <title>Id only</title>
    <id>https://atom.example/entry-2</id>
    <updated>2024-01-01T00:00:00Z</updated>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_in_document_order() {
        let result = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(result.entries.len(), 2);
        assert_eq!(result.skipped, 1);
        assert_eq!(result.entries[0].link, "https://news.example/1");
        assert_eq!(result.entries[1].link, "https://news.example/2");
    }

    #[test]
    fn test_rss_fields_normalized() {
        let result = parse_feed(RSS.as_bytes()).unwrap();
        let first = &result.entries[0];
        assert_eq!(first.summary.as_deref(), Some("Short summary one"));
        assert!(first.content.as_deref().unwrap().contains("Full body one"));
        assert_eq!(first.media, vec!["https://img.example/1.jpg".to_string()]);
        assert_eq!(first.richest_body(), first.content.as_deref().unwrap());

        let second = &result.entries[1];
        assert!(second.content.is_none());
        assert!(second.media.is_empty());
        assert_eq!(second.richest_body(), "Summary two");
    }

    #[test]
    fn test_title_html_entities_left_for_rewriter() {
        let result = parse_feed(RSS.as_bytes()).unwrap();
        assert_eq!(result.entries[0].title, "First &amp; foremost");
    }

    #[test]
    fn test_parse_atom_typed_links() {
        let result = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(result.entries.len(), 2);

        let entry = &result.entries[0];
        assert_eq!(entry.link, "https://atom.example/a");
        assert_eq!(
            entry.typed_links,
            vec![TypedLink {
                href: "https://atom.example/pic.png".into(),
                media_type: "image/png".into(),
            }]
        );
    }

    #[test]
    fn test_atom_id_used_as_link_fallback() {
        let result = parse_feed(ATOM.as_bytes()).unwrap();
        assert_eq!(result.entries[1].link, "https://atom.example/entry-2");
        assert_eq!(result.entries[1].richest_body(), "Id only");
    }

    #[test]
    fn test_missing_title_becomes_untitled() {
        let rss = r#"<rss version="2.0"><channel>
            <item><link>https://x.example/1</link><description>d</description></item>
        </channel></rss>"#;
        let result = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(result.entries[0].title, "Untitled");
    }

    #[test]
    fn test_malformed_feed_is_error() {
        assert!(parse_feed(b"<not valid xml").is_err());
    }

    #[test]
    fn test_empty_channel() {
        let rss = r#"<?xml version="1.0"?><rss version="2.0"><channel></channel></rss>"#;
        let result = parse_feed(rss.as_bytes()).unwrap();
        assert!(result.entries.is_empty());
        assert_eq!(result.skipped, 0);
    }
}
