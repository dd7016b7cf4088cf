use std::io::Cursor;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::manifest::{Node, Subnet};

/// Exports the subnet's member directory as an OPML 2.0 XML string.
///
/// Only verified-active nodes should be passed in: the directory is the public
/// membership list. Each node becomes an `<outline type="rss">` with `text`,
/// `title`, `xmlUrl` and `htmlUrl`, nested under one outline named after the hub.
///
/// # Arguments
///
/// * `subnet` - Hub identity, used for the head title and the parent outline
/// * `nodes` - Active member nodes
/// * `now` - Build time, written as `dateCreated`
pub fn export_directory(subnet: &Subnet, nodes: &[Node], now: DateTime<Utc>) -> Result<String> {
    let title = subnet.display_name();
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
        .context("Failed to write XML declaration")?;

    // <opml version="2.0">
    let mut opml = BytesStart::new("opml");
    opml.push_attribute(("version", "2.0"));
    writer
        .write_event(Event::Start(opml))
        .context("Failed to write opml element")?;

    // <head>
    writer
        .write_event(Event::Start(BytesStart::new("head")))
        .context("Failed to write head element")?;
    for (name, text) in [
        ("title", title.to_owned()),
        ("dateCreated", now.format("%a, %d %b %Y %H:%M:%S GMT").to_string()),
    ] {
        writer
            .write_event(Event::Start(BytesStart::new(name)))
            .and_then(|_| writer.write_event(Event::Text(BytesText::new(&text))))
            .and_then(|_| writer.write_event(Event::End(BytesEnd::new(name))))
            .with_context(|| format!("Failed to write {name} element"))?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("head")))
        .context("Failed to write head end")?;

    // <body><outline text=hub>
    writer
        .write_event(Event::Start(BytesStart::new("body")))
        .context("Failed to write body element")?;
    let mut group = BytesStart::new("outline");
    group.push_attribute(("text", title));
    group.push_attribute(("title", title));
    writer
        .write_event(Event::Start(group))
        .context("Failed to write group outline")?;

    for node in nodes {
        let mut outline = BytesStart::new("outline");
        outline.push_attribute(("type", "rss"));
        outline.push_attribute(("text", node.name.as_str()));
        outline.push_attribute(("title", node.name.as_str()));
        outline.push_attribute(("xmlUrl", node.feed.as_str()));
        outline.push_attribute(("htmlUrl", node.url.as_str()));
        writer
            .write_event(Event::Empty(outline))
            .context("Failed to write outline element")?;
    }

    writer
        .write_event(Event::End(BytesEnd::new("outline")))
        .context("Failed to write group outline end")?;
    writer
        .write_event(Event::End(BytesEnd::new("body")))
        .context("Failed to write body end")?;
    writer
        .write_event(Event::End(BytesEnd::new("opml")))
        .context("Failed to write opml end")?;

    let mut result = writer.into_inner().into_inner();
    result.push(b'\n');
    String::from_utf8(result).context("Generated OPML contains invalid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quick_xml::Reader;

    fn node(name: &str) -> Node {
        Node {
            name: name.to_string(),
            url: format!("https://{name}.example"),
            feed: format!("https://{name}.example/feed.xml"),
        }
    }

    /// Collects `(title, xmlUrl)` of every feed outline with a real XML reader.
    fn feed_outlines(opml: &str) -> Vec<(String, String)> {
        let mut reader = Reader::from_str(opml);
        let mut out = Vec::new();
        loop {
            match reader.read_event().expect("generated OPML must be well-formed") {
                Event::Empty(e) if e.name().as_ref() == b"outline" => {
                    let mut title = String::new();
                    let mut xml_url = String::new();
                    for attr in e.attributes() {
                        let attr = attr.unwrap();
                        let value = attr.unescape_value().unwrap().to_string();
                        match attr.key.as_ref() {
                            b"title" => title = value,
                            b"xmlUrl" => xml_url = value,
                            _ => {}
                        }
                    }
                    out.push((title, xml_url));
                }
                Event::Eof => break,
                _ => {}
            }
        }
        out
    }

    #[test]
    fn test_export_directory_lists_nodes() {
        let subnet = Subnet {
            hub: "https://hub.example".into(),
            title: Some("Cats & Dogs".into()),
            description: None,
        };
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let opml = export_directory(&subnet, &[node("a"), node("b")], now).unwrap();

        assert!(opml.contains(r#"<opml version="2.0">"#));
        assert!(opml.contains("<title>Cats &amp; Dogs</title>"));
        assert!(opml.contains("<dateCreated>Mon, 01 Jan 2024 00:00:00 GMT</dateCreated>"));
        assert_eq!(
            feed_outlines(&opml),
            vec![
                ("a".to_string(), "https://a.example/feed.xml".to_string()),
                ("b".to_string(), "https://b.example/feed.xml".to_string()),
            ]
        );
    }

    #[test]
    fn test_export_directory_empty() {
        let subnet = Subnet {
            hub: "https://hub.example".into(),
            title: None,
            description: None,
        };
        let opml = export_directory(&subnet, &[], Utc::now()).unwrap();
        assert!(feed_outlines(&opml).is_empty());
        assert!(opml.contains(r#"<outline text="https://hub.example" title="https://hub.example">"#));
    }
}
