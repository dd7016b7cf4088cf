//! Reads a published hub feed with quick-xml's event reader.
//!
//! Unlike the core parser this adapter insists on well-formed XML: a hub's own
//! `feed.xml` is machine-written, so a syntax error means the response is not a
//! hub feed at all and the caller falls back to its cache.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::feed::{Entry, ParsedEntry, RawEntry};

/// Feed-level identity of a hub, for navigation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubMeta {
    pub title: String,
    /// The hub URL as configured, not whatever the feed claims.
    pub link: String,
}

/// One hub's feed as the widget caches it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubSnapshot {
    pub meta: HubMeta,
    pub entries: Vec<Entry>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    FeedTitle,
    Title,
    Published,
    Updated,
    AuthorName,
}

#[derive(Default)]
struct PendingEntry {
    title: String,
    published: String,
    updated: String,
    author: String,
    alternate_link: Option<String>,
    first_link: Option<String>,
    category: Option<String>,
}

impl PendingEntry {
    fn finish(self) -> Option<(ParsedEntry, Option<String>)> {
        let published = if self.published.trim().is_empty() {
            self.updated
        } else {
            self.published
        };
        let raw = RawEntry {
            title: self.title,
            link: self.alternate_link.or(self.first_link).unwrap_or_default(),
            published,
            author: self.author,
        };
        raw.normalize().map(|entry| (entry, self.category))
    }
}

/// Parses `xml` into a snapshot for `hub`.
///
/// - `meta.title` is the feed's own `<title>`
/// - an entry's link is its `rel="alternate"` link, else its first link
/// - `published` falls back to `updated`
/// - provenance is the entry's `<category term>`, else `meta.title`
///
/// Entries without a title or link are dropped, as in the core parser.
pub fn read_hub_feed(xml: &str, hub: &str) -> Result<HubSnapshot, quick_xml::Error> {
    let mut reader = Reader::from_str(xml);

    let mut feed_title: Option<String> = None;
    let mut pending: Option<PendingEntry> = None;
    let mut in_author = false;
    let mut capture: Option<Field> = None;
    // Elements opened inside the field being captured; their text is kept.
    let mut nested = 0usize;
    let mut text = String::new();
    let mut parsed = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(_) if capture.is_some() => nested += 1,
            Event::End(_) if nested > 0 => nested -= 1,
            Event::Start(e) => match e.local_name().as_ref() {
                b"entry" => pending = Some(PendingEntry::default()),
                b"author" => in_author = true,
                b"link" | b"category" => {
                    if let Some(entry) = pending.as_mut() {
                        note_link_or_category(entry, &e)?;
                    }
                }
                name => {
                    capture = field_for(name, pending.is_some(), in_author, feed_title.is_some());
                    text.clear();
                }
            },
            Event::Empty(e) => {
                if let Some(entry) = pending.as_mut() {
                    note_link_or_category(entry, &e)?;
                }
            }
            Event::Text(t) if capture.is_some() => text.push_str(&t.unescape()?),
            Event::CData(c) if capture.is_some() => text.push_str(&String::from_utf8_lossy(&c)),
            Event::End(e) => match e.local_name().as_ref() {
                b"entry" => {
                    parsed.extend(pending.take().and_then(PendingEntry::finish));
                    in_author = false;
                }
                b"author" => in_author = false,
                _ => {
                    if let Some(field) = capture.take() {
                        store_field(field, &text, &mut feed_title, pending.as_mut());
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let title = feed_title.unwrap_or_default();
    let entries = parsed
        .into_iter()
        .map(|(entry, category)| {
            let provenance = category.unwrap_or_else(|| title.clone());
            entry.attribute(provenance)
        })
        .collect();

    Ok(HubSnapshot {
        meta: HubMeta {
            title,
            link: hub.to_string(),
        },
        entries,
    })
}

fn field_for(name: &[u8], in_entry: bool, in_author: bool, have_feed_title: bool) -> Option<Field> {
    match (name, in_entry, in_author) {
        (b"name", true, true) => Some(Field::AuthorName),
        (_, true, true) => None,
        (b"title", true, false) => Some(Field::Title),
        (b"published", true, false) => Some(Field::Published),
        (b"updated", true, false) => Some(Field::Updated),
        (b"title", false, false) if !have_feed_title => Some(Field::FeedTitle),
        _ => None,
    }
}

/// First value wins for every field.
fn store_field(
    field: Field,
    text: &str,
    feed_title: &mut Option<String>,
    entry: Option<&mut PendingEntry>,
) {
    let text = text.trim();
    if field == Field::FeedTitle {
        feed_title.get_or_insert_with(|| text.to_string());
        return;
    }
    let Some(entry) = entry else { return };
    let slot = match field {
        Field::Title => &mut entry.title,
        Field::Published => &mut entry.published,
        Field::Updated => &mut entry.updated,
        Field::AuthorName => &mut entry.author,
        Field::FeedTitle => return,
    };
    if slot.is_empty() {
        *slot = text.to_string();
    }
}

fn note_link_or_category(entry: &mut PendingEntry, e: &BytesStart<'_>) -> Result<(), quick_xml::Error> {
    match e.local_name().as_ref() {
        b"link" => {
            let href = attribute(e, b"href")?.unwrap_or_default();
            let is_alternate = attribute(e, b"rel")?.as_deref() == Some("alternate");
            if is_alternate && entry.alternate_link.is_none() {
                entry.alternate_link = Some(href.clone());
            }
            if entry.first_link.is_none() {
                entry.first_link = Some(href);
            }
        }
        b"category" if entry.category.is_none() => {
            entry.category = attribute(e, b"term")?.filter(|t| !t.is_empty());
        }
        _ => {}
    }
    Ok(())
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, quick_xml::Error> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    const HUB: &str = "https://hub.example";

    #[test]
    fn test_reads_meta_and_entries() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Cats &amp; Dogs</title>
  <link rel="self" href="https://hub.example/feed.xml"/>
  <updated>2024-05-01T00:00:00Z</updated>
  <entry>
    <title>First</title>
    <link rel="related" href="https://a.example/related"/>
    <link rel="alternate" href="https://a.example/1"/>
    <id>https://a.example/1</id>
    <updated>2024-04-01T00:00:00Z</updated>
    <author><name>Ann</name></author>
    <category term="Peer Net"/>
  </entry>
  <entry>
    <title><![CDATA[Second <b>bold</b>]]></title>
    <link href="https://b.example/2"/>
    <published>2024-03-01T00:00:00Z</published>
    <updated>2024-03-05T00:00:00Z</updated>
  </entry>
</feed>"#;
        let snapshot = read_hub_feed(xml, HUB).unwrap();

        assert_eq!(
            snapshot.meta,
            HubMeta {
                title: "Cats & Dogs".into(),
                link: HUB.into()
            }
        );
        assert_eq!(
            snapshot.entries,
            vec![
                Entry {
                    title: "First".into(),
                    link: "https://a.example/1".into(),
                    published: Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()),
                    author: Some("Ann".into()),
                    provenance: "Peer Net".into(),
                },
                Entry {
                    title: "Second <b>bold</b>".into(),
                    link: "https://b.example/2".into(),
                    published: Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()),
                    author: None,
                    provenance: "Cats & Dogs".into(),
                },
            ]
        );
    }

    #[test]
    fn test_entry_without_link_dropped() {
        let xml = r#"<feed><title>T</title>
            <entry><title>No link</title></entry>
            <entry><title>Ok</title><link href="https://x/1"/></entry>
        </feed>"#;
        let snapshot = read_hub_feed(xml, HUB).unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.entries[0].title, "Ok");
        assert_eq!(snapshot.entries[0].published, None);
    }

    #[test]
    fn test_markup_inside_title_keeps_text() {
        let xml = r#"<feed><title>Hub</title>
            <entry>
                <title type="xhtml"><div xmlns="http://www.w3.org/1999/xhtml">Rich <b>bold</b> title</div></title>
                <link href="https://x/1"/>
                <updated>2024-01-02T00:00:00Z</updated>
            </entry>
        </feed>"#;
        let snapshot = read_hub_feed(xml, HUB).unwrap();
        assert_eq!(snapshot.entries.len(), 1);
        assert_eq!(snapshot.entries[0].title, "Rich bold title");
        assert_eq!(
            snapshot.entries[0].published,
            Some(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(read_hub_feed("<feed><title>T</feed>", HUB).is_err());
    }

    #[test]
    fn test_author_name_does_not_clobber_title() {
        let xml = r#"<feed><entry><author><name>N</name><title>Not me</title></author>
            <title>Real</title><link href="https://x/1"/></entry></feed>"#;
        let snapshot = read_hub_feed(xml, HUB).unwrap();
        assert_eq!(snapshot.entries[0].title, "Real");
        assert_eq!(snapshot.entries[0].author.as_deref(), Some("N"));
        assert_eq!(snapshot.meta.title, "");
    }
}
