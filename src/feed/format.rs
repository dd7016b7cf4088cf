/// Syndication format of a raw document, decided by shallow sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Atom,
    Rss,
    Unknown,
}

/// Classifies a document as Atom, RSS, or unknown.
///
/// Atom wins when a `<feed>` element is present; otherwise `<rss>` or `<channel>`
/// means RSS. Anything else is [`FeedFormat::Unknown`], which parsers treat as
/// "no entries" rather than an error.
pub fn detect_format(xml: &str) -> FeedFormat {
    let lower = xml.to_ascii_lowercase();
    if has_element(&lower, "feed") {
        FeedFormat::Atom
    } else if has_element(&lower, "rss") || has_element(&lower, "channel") {
        FeedFormat::Rss
    } else {
        FeedFormat::Unknown
    }
}

/// `<name` followed by whitespace or `>`.
fn has_element(lower: &str, name: &str) -> bool {
    let needle = format!("<{name}");
    lower.match_indices(&needle).any(|(i, _)| {
        lower
            .as_bytes()
            .get(i + needle.len())
            .is_some_and(|b| b.is_ascii_whitespace() || *b == b'>')
    })
}
