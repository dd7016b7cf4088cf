use super::entry::ParsedEntry;
use super::extract::{attr_value, elements, extract_tag, start_tags, text_content};
use super::format::{detect_format, FeedFormat};
use super::normalize::RawEntry;

/// Parses an RSS 2.0 or Atom 1.0 document into entries, in document order.
///
/// Items lacking a title or link are dropped and an unrecognized document
/// yields an empty list. Never fails.
pub fn parse_feed(xml: &str) -> Vec<ParsedEntry> {
    let (entries, skipped) = match detect_format(xml) {
        FeedFormat::Atom => collect(elements(xml, "entry").map(atom_fields)),
        FeedFormat::Rss => collect(elements(xml, "item").map(rss_fields)),
        FeedFormat::Unknown => {
            tracing::debug!("Document is neither Atom nor RSS, no entries");
            return Vec::new();
        }
    };

    if skipped > 0 {
        tracing::debug!(
            kept = entries.len(),
            skipped = skipped,
            "Feed items without title or link dropped"
        );
    }
    entries
}

fn collect(raw: impl Iterator<Item = RawEntry>) -> (Vec<ParsedEntry>, usize) {
    let mut skipped = 0;
    let entries = raw
        .filter_map(|r| {
            let parsed = r.normalize();
            if parsed.is_none() {
                skipped += 1;
            }
            parsed
        })
        .collect();
    (entries, skipped)
}

fn atom_fields(block: &str) -> RawEntry {
    let published = match extract_tag(block, "published") {
        p if p.is_empty() => extract_tag(block, "updated"),
        p => p,
    };
    let author = elements(block, "author")
        .next()
        .map(|author| extract_tag(author, "name"))
        .unwrap_or_default();

    RawEntry {
        title: extract_tag(block, "title"),
        link: atom_link(block),
        published,
        author,
    }
}

/// `href` of the first `rel="alternate"` link, else of the first link with an href.
///
/// Either attribute may come first in the tag.
fn atom_link(block: &str) -> String {
    start_tags(block, "link")
        .filter(|tag| {
            attr_value(tag, "rel").is_some_and(|r| r.trim().eq_ignore_ascii_case("alternate"))
        })
        .find_map(non_empty_href)
        .or_else(|| start_tags(block, "link").find_map(non_empty_href))
        .map(text_content)
        .unwrap_or_default()
}

fn non_empty_href(tag: &str) -> Option<&str> {
    attr_value(tag, "href").filter(|h| !h.trim().is_empty())
}

fn rss_fields(block: &str) -> RawEntry {
    RawEntry {
        title: extract_tag(block, "title"),
        link: extract_tag(block, "link"),
        published: first_present(block, &["pubDate", "dc:date"]),
        author: first_present(block, &["dc:creator", "author", "itunes:author"]),
    }
}

fn first_present(block: &str, tags: &[&str]) -> String {
    tags.iter()
        .map(|tag| extract_tag(block, tag))
        .find(|v| !v.is_empty())
        .unwrap_or_default()
}
