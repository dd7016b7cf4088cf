use std::cmp::Reverse;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A feed item as produced by a parser, before the engine attributes it to a source.
///
/// Parsers never know which subnet an entry belongs to; see [`ParsedEntry::attribute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub author: Option<String>,
}

impl ParsedEntry {
    /// Stamps the entry with the display identity of the subnet it is published under.
    pub fn attribute(self, provenance: impl Into<String>) -> Entry {
        Entry {
            title: self.title,
            link: self.link,
            published: self.published,
            author: self.author,
            provenance: provenance.into(),
        }
    }
}

/// An aggregated entry.
///
/// Entries have no identity beyond `link`, and the same link reported by two
/// sources is kept twice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub title: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
    pub author: Option<String>,
    /// Hub URL for local entries, the peer's display name for federated ones.
    pub provenance: String,
}

/// Sort key for the merged ordering: epoch milliseconds, `None` counted as epoch.
pub fn sort_key(published: Option<DateTime<Utc>>) -> i64 {
    published.map_or(0, |dt| dt.timestamp_millis())
}

/// Sorts newest first. Stable, so equal keys keep their input order.
pub fn sort_newest_first(entries: &mut [Entry]) {
    entries.sort_by_key(|e| Reverse(sort_key(e.published)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn entry(link: &str, published: Option<i64>) -> Entry {
        Entry {
            title: link.to_uppercase(),
            link: link.to_string(),
            published: published.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            author: None,
            provenance: "https://hub.example".to_string(),
        }
    }

    #[test]
    fn test_undated_entries_sort_last() {
        let mut entries = vec![
            entry("a", None),
            entry("b", Some(1_700_000_000)),
            entry("c", Some(1_600_000_000)),
        ];
        sort_newest_first(&mut entries);
        let links: Vec<_> = entries.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(links, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_pre_epoch_sorts_after_undated() {
        let mut entries = vec![entry("old", Some(-86_400)), entry("none", None)];
        sort_newest_first(&mut entries);
        assert_eq!(entries[0].link, "none");
    }

    #[test]
    fn test_sort_is_stable_for_ties() {
        let mut entries = vec![
            entry("first", Some(10)),
            entry("second", Some(10)),
            entry("third", None),
            entry("fourth", None),
        ];
        sort_newest_first(&mut entries);
        let links: Vec<_> = entries.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(links, vec!["first", "second", "third", "fourth"]);
    }

    #[test]
    fn test_attribute_keeps_fields() {
        let parsed = ParsedEntry {
            title: "T".into(),
            link: "https://a/1".into(),
            published: None,
            author: Some("Ada".into()),
        };
        let e = parsed.attribute("Peer Net");
        assert_eq!(e.provenance, "Peer Net");
        assert_eq!(e.author.as_deref(), Some("Ada"));
    }

    proptest! {
        #[test]
        fn sorted_output_is_non_increasing(stamps in proptest::collection::vec(proptest::option::of(-1_000_000i64..2_000_000_000), 0..40)) {
            let mut entries: Vec<_> = stamps
                .iter()
                .enumerate()
                .map(|(i, s)| entry(&i.to_string(), *s))
                .collect();
            sort_newest_first(&mut entries);
            for pair in entries.windows(2) {
                prop_assert!(sort_key(pair[0].published) >= sort_key(pair[1].published));
            }
        }
    }
}
