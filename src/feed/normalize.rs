//! Normalization shared by every entry-producing adapter.
//!
//! The hand-rolled core parser and the widget's XML-reader adapter both funnel their
//! raw fields through [`RawEntry::normalize`], so the acceptance rule, the timestamp
//! handling and the fallback fields cannot drift apart.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

use super::entry::ParsedEntry;

/// Naive layouts seen in the wild; interpreted as UTC.
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%B %d, %Y %H:%M:%S",
];

/// Layouts carrying a numeric offset that RFC 3339 rejects (`+0000` without colon),
/// plus `Date#toString` output once its weekday and zone note are removed.
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%b %d %Y %H:%M:%S GMT%z",
];

/// Date-only layouts, taken as midnight UTC. Slashed dates are month first.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%B %d, %Y", "%d %B %Y", "%b %d %Y", "%m/%d/%Y"];

const WEEKDAYS: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Raw field values as extracted from one feed item, before any validation.
#[derive(Debug, Default, Clone)]
pub struct RawEntry {
    pub title: String,
    pub link: String,
    pub published: String,
    pub author: String,
}

impl RawEntry {
    /// Applies the acceptance rule and normalizes fields.
    ///
    /// Returns `None` unless both title and link are non-empty. The timestamp is
    /// parsed permissively and becomes `None` when unparseable; an empty author
    /// becomes `None`.
    pub fn normalize(self) -> Option<ParsedEntry> {
        let title = clean_text(&self.title);
        let link = clean_text(&self.link);
        if title.is_empty() || link.is_empty() {
            return None;
        }

        let author = clean_text(&self.author);
        Some(ParsedEntry {
            title: title.into_owned(),
            link: link.into_owned(),
            published: parse_timestamp(&self.published),
            author: (!author.is_empty()).then(|| author.into_owned()),
        })
    }
}

/// Parses a feed date permissively.
///
/// Accepts RFC 3339 (Atom), RFC 2822 (RSS `pubDate`, including `GMT`/`UT` and US
/// zone names), RFC 2822 with a trailing `UTC`/`Z`, ISO 8601 with a colon-less
/// offset, JavaScript `Date#toString` output, and naive ISO, slashed and
/// month-name layouts that are taken as UTC. A leading weekday name is ignored,
/// so `Mon, 02 Jan 2024` still parses although that day was a Tuesday. Empty or
/// unparseable input yields `None`; this never panics.
///
/// # Examples
///
/// ```
/// use subnet_hub::feed::parse_timestamp;
///
/// let a = parse_timestamp("Mon, 01 Jan 2024 00:00:00 GMT").unwrap();
/// let b = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(parse_timestamp("January 1, 2024"), Some(b));
/// assert!(parse_timestamp("yesterday").is_none());
/// ```
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Weekday names carry no information and are often wrong in hand-written feeds.
    let dated = strip_weekday(s);
    if let Some(dt) = parse_rfc2822_lenient(s).or_else(|| parse_rfc2822_lenient(dated)) {
        return Some(dt);
    }

    let dated = strip_zone_note(dated);
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(dated, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(dated, fmt) {
            return Some(naive.and_utc());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(dated, fmt).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// RFC 2822, also with `UTC` or `Z` in place of a numeric zone.
fn parse_rfc2822_lenient(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let stem = s.strip_suffix("UTC").or_else(|| s.strip_suffix('Z'))?;
    DateTime::parse_from_rfc2822(&format!("{} +0000", stem.trim_end()))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Drops a leading `Mon,` / `Tuesday ` style weekday.
fn strip_weekday(s: &str) -> &str {
    let end = s.find(|c: char| !c.is_ascii_alphabetic()).unwrap_or(s.len());
    let word = s[..end].to_ascii_lowercase();
    if end < 3 || !WEEKDAYS.iter().any(|day| word.starts_with(day)) {
        return s;
    }
    s[end..].trim_start_matches(|c: char| c == ',' || c.is_whitespace())
}

/// Drops a trailing `(Central European Summer Time)` note.
fn strip_zone_note(s: &str) -> &str {
    match s.rfind(" (") {
        Some(i) if s.ends_with(')') => s[..i].trim_end(),
        _ => s,
    }
}

/// ISO 8601 form used in published feeds (`2024-01-01T00:00:00Z`).
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Trims and drops characters that XML 1.0 cannot carry.
///
/// Feed text ends up in the published Atom document; a stray control byte from an
/// upstream feed would otherwise make the whole hub feed unparseable for peers.
pub(crate) fn clean_text(s: &str) -> Cow<'_, str> {
    let trimmed = s.trim();
    if trimmed.chars().all(is_xml_char) {
        return Cow::Borrowed(trimmed);
    }
    Cow::Owned(
        trimmed
            .chars()
            .filter(|c| is_xml_char(*c))
            .collect::<String>()
            .trim()
            .to_owned(),
    )
}

fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}
