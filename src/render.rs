//! RSS 2.0 serialization of a [`FeedDocument`].
//!
//! Output shape:
//!
//! ```text
//! <rss version="2.0" xmlns:content=".." xmlns:dc="..">
//!   <channel>
//!     title, link, description, language, copyright, docs, image?
//!     <item>
//!       title, link, guid, pubDate, dc:creator,
//!       description (CDATA), content:encoded (CDATA), enclosure?
//!     </item>
//!   </channel>
//! </rss>
//! ```
//!
//! CDATA content is written verbatim, so callers hand over entity-decoded
//! text. A literal `]]>` inside CDATA text is split across two sections.
use anyhow::{Context, Result};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

use crate::assemble::{ChannelImage, FeedDocument, RewrittenEntry};
use crate::util::strip_xml_invalid_chars;

pub const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";
pub const DC_NS: &str = "http://purl.org/dc/elements/1.1/";

/// MIME type declared on every enclosure.
pub const ENCLOSURE_TYPE: &str = "image/jpeg";

/// Content type for HTTP responses carrying a rendered document.
pub const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Renders a document to an RSS 2.0 string, optionally indented.
pub fn render(doc: &FeedDocument, pretty: bool) -> Result<String> {
    let mut writer = if pretty {
        Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2)
    } else {
        Writer::new(Cursor::new(Vec::new()))
    };

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:content", CONTENT_NS));
    rss.push_attribute(("xmlns:dc", DC_NS));
    writer
        .write_event(Event::Start(rss))
        .context("Failed to write rss element")?;

    start(&mut writer, "channel")?;
    text_element(&mut writer, "title", &doc.title)?;
    text_element(&mut writer, "link", &doc.link)?;
    text_element(&mut writer, "description", &doc.description)?;
    text_element(&mut writer, "language", &doc.language)?;
    text_element(&mut writer, "copyright", &doc.copyright)?;
    text_element(&mut writer, "docs", &doc.docs)?;
    if let Some(image) = &doc.image {
        write_logo(&mut writer, image)?;
    }

    for item in &doc.items {
        write_item(&mut writer, item)?;
    }

    end(&mut writer, "channel")?;
    end(&mut writer, "rss")?;

    let result = writer.into_inner().into_inner();
    String::from_utf8(result).context("Generated document contains invalid UTF-8")
}

fn write_logo(writer: &mut XmlWriter, image: &ChannelImage) -> Result<()> {
    start(writer, "image")?;
    text_element(writer, "url", &image.url)?;
    text_element(writer, "title", &image.title)?;
    text_element(writer, "link", &image.link)?;
    end(writer, "image")
}

fn write_item(writer: &mut XmlWriter, item: &RewrittenEntry) -> Result<()> {
    start(writer, "item")?;
    text_element(writer, "title", &item.title)?;
    text_element(writer, "link", &item.link)?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "false"));
    writer
        .write_event(Event::Start(guid))
        .context("Failed to write guid element")?;
    writer
        .write_event(Event::Text(BytesText::new(&strip_xml_invalid_chars(&item.guid))))
        .context("Failed to write guid text")?;
    end(writer, "guid")?;

    text_element(writer, "pubDate", &item.published)?;
    text_element(writer, "dc:creator", &item.author)?;
    cdata_element(writer, "description", &item.summary)?;
    cdata_element(writer, "content:encoded", &item.content)?;

    if let Some(url) = &item.image {
        let mut enclosure = BytesStart::new("enclosure");
        enclosure.push_attribute(("url", url.as_str()));
        enclosure.push_attribute(("type", ENCLOSURE_TYPE));
        enclosure.push_attribute(("length", "0"));
        writer
            .write_event(Event::Empty(enclosure))
            .context("Failed to write enclosure element")?;
    }

    end(writer, "item")
}

fn start(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(name)))
        .with_context(|| format!("Failed to write {} element", name))
}

fn end(writer: &mut XmlWriter, name: &str) -> Result<()> {
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("Failed to write {} end", name))
}

/// `<name>escaped text</name>`
fn text_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    start(writer, name)?;
    writer
        .write_event(Event::Text(BytesText::new(&strip_xml_invalid_chars(text))))
        .with_context(|| format!("Failed to write {} text", name))?;
    end(writer, name)
}

/// `<name><![CDATA[verbatim text]]></name>`
///
/// The sections go out as one pre-escaped text event so the indenting
/// writer never puts whitespace between or around them.
fn cdata_element(writer: &mut XmlWriter, name: &str, text: &str) -> Result<()> {
    start(writer, name)?;
    let text = strip_xml_invalid_chars(text);
    let wrapped: String = cdata_sections(&text)
        .into_iter()
        .map(|section| format!("<![CDATA[{}]]>", section))
        .collect();
    writer
        .write_event(Event::Text(BytesText::from_escaped(wrapped)))
        .with_context(|| format!("Failed to write {} CDATA", name))?;
    end(writer, name)
}

/// Splits text so no section contains `]]>`: `a]]>b` becomes `a]]` + `>b`.
fn cdata_sections(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut rest = text;
    while let Some(idx) = rest.find("]]>") {
        sections.push(&rest[..idx + 2]);
        rest = &rest[idx + 2..];
    }
    sections.push(rest);
    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use quick_xml::Reader;

    fn item(n: usize, image: Option<&str>) -> RewrittenEntry {
        RewrittenEntry {
            title: format!("Headline {} & more", n),
            summary: format!("Summary {}", n),
            content: format!("<p>Body {}</p>", n),
            link: format!("https://news.example/{}", n),
            guid: format!("https://news.example/{}#ai-rewrite", n),
            published: "Mon, 19 Oct 2026 10:00:00 +0000".to_string(),
            image: image.map(str::to_string),
            author: "Newswire Desk".to_string(),
        }
    }

    fn document(items: Vec<RewrittenEntry>) -> FeedDocument {
        FeedDocument {
            title: "Technology News".into(),
            link: "https://example.com".into(),
            description: "Latest Technology stories".into(),
            language: "en-us".into(),
            copyright: "Copyright".into(),
            docs: "https://www.rssboard.org/rss-specification".into(),
            image: Some(ChannelImage {
                url: "https://example.com/logo.png".into(),
                title: "Technology News".into(),
                link: "https://example.com".into(),
            }),
            items,
        }
    }

    fn is_well_formed(xml: &str) -> bool {
        let mut reader = Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(Event::Eof) => return true,
                Ok(_) => {}
                Err(_) => return false,
            }
        }
    }

    #[test]
    fn test_root_declares_namespaces() {
        let xml = render(&document(vec![]), false).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains(&format!("xmlns:content=\"{}\"", CONTENT_NS)));
        assert!(xml.contains(&format!("xmlns:dc=\"{}\"", DC_NS)));
        assert!(is_well_formed(&xml));
    }

    #[test]
    fn test_channel_field_order() {
        let xml = render(&document(vec![]), false).unwrap();
        let positions: Vec<usize> = [
            "<title>",
            "<link>",
            "<description>",
            "<language>",
            "<copyright>",
            "<docs>",
            "<image>",
        ]
        .iter()
        .map(|tag| xml.find(tag).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_item_fields() {
        let xml = render(&document(vec![item(1, Some("https://img.example/1.jpg"))]), false).unwrap();
        assert!(xml.contains("<title>Headline 1 &amp; more</title>"));
        assert!(xml.contains("<guid isPermaLink=\"false\">https://news.example/1#ai-rewrite</guid>"));
        assert!(xml.contains("<pubDate>Mon, 19 Oct 2026 10:00:00 +0000</pubDate>"));
        assert!(xml.contains("<dc:creator>Newswire Desk</dc:creator>"));
        assert!(xml.contains("<description><![CDATA[Summary 1]]></description>"));
        assert!(xml.contains("<content:encoded><![CDATA[<p>Body 1</p>]]></content:encoded>"));
        assert!(xml.contains(
            "<enclosure url=\"https://img.example/1.jpg\" type=\"image/jpeg\" length=\"0\"/>"
        ));
    }

    #[test]
    fn test_enclosure_omitted_without_image() {
        let xml = render(&document(vec![item(1, None)]), false).unwrap();
        assert!(!xml.contains("<enclosure"));
    }

    #[test]
    fn test_logo_omitted_when_absent() {
        let mut doc = document(vec![]);
        doc.image = None;
        let xml = render(&doc, false).unwrap();
        assert!(!xml.contains("<image>"));
    }

    #[test]
    fn test_cdata_terminator_split() {
        assert_eq!(cdata_sections("plain"), vec!["plain"]);
        assert_eq!(cdata_sections("a]]>b"), vec!["a]]", ">b"]);
        assert_eq!(cdata_sections("]]>]]>"), vec!["]]", ">]]", ">"]);

        let mut it = item(1, None);
        it.content = "x ]]> y".into();
        let xml = render(&document(vec![it]), false).unwrap();
        assert!(xml.contains("<![CDATA[x ]]]]><![CDATA[> y]]>"));
        assert!(is_well_formed(&xml));
    }

    #[test]
    fn test_control_chars_removed() {
        let mut it = item(1, None);
        it.title = "Bad\u{0}title".into();
        it.summary = "bad\u{b}summary".into();
        let xml = render(&document(vec![it]), false).unwrap();
        assert!(xml.contains("<title>Badtitle</title>"));
        assert!(xml.contains("<![CDATA[badsummary]]>"));
    }

    #[test]
    fn test_pretty_and_compact_same_content() {
        let doc = document(vec![item(1, None), item(2, None)]);
        let pretty = render(&doc, true).unwrap();
        let compact = render(&doc, false).unwrap();
        assert!(pretty.contains("\n  <channel>"));
        assert!(pretty.contains("<description><![CDATA[Summary 1]]></description>"));
        assert!(!compact.contains('\n'));
        assert!(is_well_formed(&pretty));
        assert!(is_well_formed(&compact));
    }

    #[test]
    fn test_items_keep_order() {
        let doc = document((1..=5).map(|n| item(n, None)).collect());
        let xml = render(&doc, true).unwrap();
        let positions: Vec<usize> = (1..=5)
            .map(|n| xml.find(&format!("https://news.example/{}#", n)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
