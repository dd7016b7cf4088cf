use std::io::{Cursor, Write};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::entry::Entry;
use super::normalize::format_timestamp;
use crate::manifest::Subnet;

const ATOM_NS: &str = "http://www.w3.org/2005/Atom";

/// Renders the hub's published Atom 1.0 feed.
///
/// This document is what peers federate against and what the widget reads, so it
/// must round-trip through [`parse_feed`](super::parse_feed): each entry carries
/// `<link rel="alternate">`, `<id>` equal to the link, `<updated>` (the entry's own
/// timestamp, or `now` when it has none), an optional `<author><name>`, and a
/// `<category term>` holding the entry's provenance.
///
/// Text and attribute values are escaped by the writer.
pub fn render_feed(subnet: &Subnet, entries: &[Entry], now: DateTime<Utc>) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    let now_iso = format_timestamp(&now);
    let hub = subnet.hub.as_str();

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut feed = BytesStart::new("feed");
    feed.push_attribute(("xmlns", ATOM_NS));
    writer
        .write_event(Event::Start(feed))
        .context("Failed to write feed element")?;

    text_element(&mut writer, "title", subnet.display_name())?;
    if let Some(description) = subnet.description.as_deref().filter(|d| !d.is_empty()) {
        text_element(&mut writer, "subtitle", description)?;
    }
    link_element(&mut writer, &format!("{hub}/feed.xml"), "self")?;
    link_element(&mut writer, hub, "alternate")?;
    text_element(&mut writer, "id", hub)?;
    text_element(&mut writer, "updated", &now_iso)?;

    for entry in entries {
        write_entry(&mut writer, entry, &now_iso)
            .with_context(|| format!("Failed to write entry {}", entry.link))?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("feed")))
        .context("Failed to write feed end")?;

    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).context("Generated feed contains invalid UTF-8")
}

fn write_entry<W: Write>(writer: &mut Writer<W>, entry: &Entry, now_iso: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("entry")))?;

    text_element(writer, "title", &entry.title)?;
    link_element(writer, &entry.link, "alternate")?;
    text_element(writer, "id", &entry.link)?;
    let updated = entry
        .published
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_else(|| now_iso.to_owned());
    text_element(writer, "updated", &updated)?;

    if let Some(author) = entry.author.as_deref() {
        writer.write_event(Event::Start(BytesStart::new("author")))?;
        text_element(writer, "name", author)?;
        writer.write_event(Event::End(BytesEnd::new("author")))?;
    }

    let mut category = BytesStart::new("category");
    category.push_attribute(("term", entry.provenance.as_str()));
    writer.write_event(Event::Empty(category))?;

    writer.write_event(Event::End(BytesEnd::new("entry")))?;
    Ok(())
}

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn link_element<W: Write>(writer: &mut Writer<W>, href: &str, rel: &str) -> Result<()> {
    let mut link = BytesStart::new("link");
    link.push_attribute(("href", href));
    link.push_attribute(("rel", rel));
    writer.write_event(Event::Empty(link))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::{extract_tag, parse_feed};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn subnet() -> Subnet {
        Subnet {
            hub: "https://hub.example".into(),
            title: Some("Hub & Friends".into()),
            description: Some("Small web".into()),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 3, 4, 5, 6).unwrap()
    }

    #[test]
    fn test_feed_header() {
        let xml = render_feed(&subnet(), &[], now()).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains(r#"<feed xmlns="http://www.w3.org/2005/Atom">"#));
        assert!(xml.contains("<title>Hub &amp; Friends</title>"));
        assert!(xml.contains("<subtitle>Small web</subtitle>"));
        assert!(xml.contains(r#"<link href="https://hub.example/feed.xml" rel="self"/>"#));
        assert!(xml.contains("<updated>2025-02-03T04:05:06Z</updated>"));
    }

    #[test]
    fn test_title_falls_back_to_hub() {
        let s = Subnet {
            title: None,
            description: None,
            ..subnet()
        };
        let xml = render_feed(&s, &[], now()).unwrap();
        assert_eq!(extract_tag(&xml, "title"), "https://hub.example");
        assert!(!xml.contains("<subtitle>"));
    }

    #[test]
    fn test_entries_round_trip_through_parser() {
        let entries = vec![
            Entry {
                title: "Tom & Jerry <3".into(),
                link: "https://a.example/1?x=1&y=2".into(),
                published: Some(Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()),
                author: Some("Ann".into()),
                provenance: "https://hub.example".into(),
            },
            Entry {
                title: "Undated".into(),
                link: "https://b.example/2".into(),
                published: None,
                author: None,
                provenance: "Peer".into(),
            },
        ];
        let xml = render_feed(&subnet(), &entries, now()).unwrap();
        let parsed = parse_feed(&xml);

        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].title, "Tom & Jerry <3");
        assert_eq!(parsed[0].link, "https://a.example/1?x=1&y=2");
        assert_eq!(parsed[0].published, entries[0].published);
        assert_eq!(parsed[0].author.as_deref(), Some("Ann"));
        // Undated entries are published with the build time.
        assert_eq!(parsed[1].published, Some(now()));
        assert_eq!(parsed[1].author, None);
        assert!(xml.contains(r#"<category term="Peer"/>"#));
    }
}
