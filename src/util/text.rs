use std::borrow::Cow;

use scraper::{Html, Node};

/// Ellipsis appended when a description is cut short
const ELLIPSIS: &str = "...";

/// Decodes HTML entities (`&amp;`, `&#8217;`, `&nbsp;`, ...) into plain characters.
///
/// Text destined for a CDATA block must go through this first: CDATA content
/// is emitted verbatim, so an entity left encoded here would reach readers as
/// a literal `&amp;`.
///
/// # Examples
///
/// ```
/// use newswire::util::decode_entities;
///
/// assert_eq!(decode_entities("Tom &amp; Jerry"), "Tom & Jerry");
/// assert_eq!(decode_entities("plain"), "plain");
/// ```
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    html_escape::decode_html_entities(s)
}

/// Block-level elements that start a new line of text when rendered.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Reduces an HTML fragment to its visible text.
///
/// Tags are dropped and entities are decoded by the HTML parser. Inline
/// elements join their neighbours directly (`un<em>believ</em>able` stays one
/// word); block elements are separated by a space. Runs of whitespace
/// collapse to a single space. Plain text passes through with only
/// whitespace normalized.
///
/// # Examples
///
/// ```
/// use newswire::util::strip_markup;
///
/// assert_eq!(strip_markup("<p>Hello <b>world</b></p>"), "Hello world");
/// assert_eq!(strip_markup("Fish &amp; chips"), "Fish & chips");
/// ```
pub fn strip_markup(s: &str) -> String {
    // Fast path: nothing that looks like markup or an entity
    if !s.contains('<') && !s.contains('&') {
        return collapse_whitespace(s);
    }

    let fragment = Html::parse_fragment(s);
    let mut text = String::with_capacity(s.len());
    for node in fragment.root_element().descendants() {
        match node.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if BLOCK_ELEMENTS.contains(&e.name()) => text.push(' '),
            _ => {}
        }
    }
    collapse_whitespace(&text)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Truncates to at most `max_chars` characters, appending `...` when cut.
///
/// Counts Unicode scalar values, never bytes, so multi-byte text is never
/// split mid-character. Trailing whitespace before the ellipsis is trimmed.
///
/// - If the string fits, returns `Cow::Borrowed(s)`
/// - If `max_chars == 0`, returns an empty string
///
/// # Examples
///
/// ```
/// use newswire::util::truncate_chars;
///
/// assert_eq!(truncate_chars("Short", 10), "Short");
/// assert_eq!(truncate_chars("Hello World", 6), "Hello...");
/// ```
pub fn truncate_chars(s: &str, max_chars: usize) -> Cow<'_, str> {
    if max_chars == 0 {
        return Cow::Borrowed("");
    }

    match s.char_indices().nth(max_chars) {
        None => Cow::Borrowed(s),
        Some((byte_end, _)) => {
            let mut out = s[..byte_end].trim_end().to_string();
            out.push_str(ELLIPSIS);
            Cow::Owned(out)
        }
    }
}

/// Removes characters that are not allowed anywhere in an XML 1.0 document.
///
/// Upstream feeds and the rewrite service occasionally emit stray C0 control
/// characters; a single one makes the whole published document unparsable.
///
/// Strips: 0x00-0x08, 0x0B-0x0C, 0x0E-0x1F, U+FFFE, U+FFFF.
/// Preserves: tab (0x09), newline (0x0A), carriage return (0x0D).
///
/// Returns `Cow::Borrowed` when the input is already clean (common case).
pub fn strip_xml_invalid_chars(s: &str) -> Cow<'_, str> {
    let needs_strip = s.chars().any(is_xml_invalid);
    if !needs_strip {
        return Cow::Borrowed(s);
    }

    Cow::Owned(s.chars().filter(|&c| !is_xml_invalid(c)).collect())
}

fn is_xml_invalid(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}')
}
