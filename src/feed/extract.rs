//! Tolerant extraction of a handful of known tags from feed and HTML markup.
//!
//! This is deliberately not an XML parser. It scans for `<tag ...>...</tag>` spans
//! with case-insensitive tag names and never fails: a missing element or attribute
//! is reported as an empty string, which callers treat as "field absent".
//!
//! Tag names and attribute delimiters are ASCII, so searching a lowercased copy made
//! with [`str::to_ascii_lowercase`] keeps byte offsets aligned with the original text.

use std::borrow::Cow;

const CDATA_OPEN: &str = "<![CDATA[";
const CDATA_CLOSE: &str = "]]>";

/// Returns the trimmed text content of the first `<tag>` element in `text`.
///
/// If the content is wholly wrapped in a single CDATA section it is unwrapped once,
/// re-trimmed and returned verbatim. Otherwise the predefined XML entities and
/// character references are decoded.
///
/// Returns an empty string when no such element exists.
///
/// # Examples
///
/// ```
/// use subnet_hub::feed::extract_tag;
///
/// assert_eq!(extract_tag("<item><title> Hi </title></item>", "title"), "Hi");
/// assert_eq!(extract_tag("<title><![CDATA[ a < b ]]></title>", "TITLE"), "a < b");
/// assert_eq!(extract_tag("<item></item>", "title"), "");
/// ```
pub fn extract_tag(text: &str, tag: &str) -> String {
    match elements(text, tag).next() {
        Some(inner) => text_content(inner),
        None => String::new(),
    }
}

/// Returns the value of `attr` on the first `<tag ...>` start tag that carries it.
///
/// Attribute order inside the tag is irrelevant. Empty values are skipped, so a
/// later tag with a non-empty value wins over an earlier `attr=""`.
///
/// # Examples
///
/// ```
/// use subnet_hub::feed::extract_attr;
///
/// let a = r#"<link href="X" rel="alternate">"#;
/// let b = r#"<link rel="alternate" href="X">"#;
/// assert_eq!(extract_attr(a, "link", "href"), "X");
/// assert_eq!(extract_attr(b, "link", "href"), "X");
/// ```
pub fn extract_attr(text: &str, tag: &str, attr: &str) -> String {
    start_tags(text, tag)
        .find_map(|start| attr_value(start, attr).filter(|v| !v.is_empty()))
        .map(decode_entities)
        .unwrap_or_default()
}

/// Unwraps a single CDATA section or decodes entities, then trims.
pub(crate) fn text_content(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some(inner) = trimmed
        .strip_prefix(CDATA_OPEN)
        .and_then(|rest| rest.strip_suffix(CDATA_CLOSE))
    {
        return inner.trim().to_owned();
    }
    decode_entities(trimmed).trim().to_owned()
}

/// Decodes `&amp;`-style predefined entities and numeric character references.
///
/// Text containing an entity outside that set (HTML's `&nbsp;`, say) is returned
/// unchanged rather than partially decoded.
pub(crate) fn decode_entities(raw: &str) -> String {
    match quick_xml::escape::unescape(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_owned(),
    }
}

// ============================================================================
// Element iteration
// ============================================================================

/// Iterator over the raw inner content of every `<tag>...</tag>` element.
///
/// Matching is non-greedy: each element ends at the first following close tag.
/// A self-closing `<tag/>` yields an empty string. Iteration stops at the first
/// element that is never closed.
pub struct Elements<'a> {
    text: &'a str,
    lower: String,
    tag: String,
    pos: usize,
}

/// Iterates the raw inner content of every `tag` element in `text`.
pub fn elements<'a>(text: &'a str, tag: &str) -> Elements<'a> {
    Elements {
        text,
        lower: text.to_ascii_lowercase(),
        tag: tag.to_ascii_lowercase(),
        pos: 0,
    }
}

impl<'a> Iterator for Elements<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let open = find_open(&self.lower, &self.tag, self.pos)?;
        let open_end = open + self.lower[open..].find('>')? + 1;

        if self.lower[..open_end].ends_with("/>") {
            self.pos = open_end;
            return Some("");
        }

        let (close, after_close) = find_close(&self.lower, &self.tag, open_end)?;
        self.pos = after_close;
        Some(&self.text[open_end..close])
    }
}

/// Iterator over every `<tag ...>` start tag, including the angle brackets.
pub struct StartTags<'a> {
    text: &'a str,
    lower: String,
    tag: String,
    pos: usize,
}

/// Iterates every `<tag ...>` start tag in `text`, in document order.
pub fn start_tags<'a>(text: &'a str, tag: &str) -> StartTags<'a> {
    StartTags {
        text,
        lower: text.to_ascii_lowercase(),
        tag: tag.to_ascii_lowercase(),
        pos: 0,
    }
}

impl<'a> Iterator for StartTags<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let open = find_open(&self.lower, &self.tag, self.pos)?;
        let end = open + self.lower[open..].find('>')? + 1;
        self.pos = end;
        Some(&self.text[open..end])
    }
}

/// Finds `<tag` at or after `from` where the name is followed by whitespace, `>` or `/`.
fn find_open(lower: &str, tag: &str, from: usize) -> Option<usize> {
    let needle = format!("<{tag}");
    let mut pos = from;

    loop {
        let start = pos + lower.get(pos..)?.find(&needle)?;
        let after = start + needle.len();
        match lower.as_bytes().get(after) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(start),
            Some(_) => pos = after,
            None => return None,
        }
    }
}

/// Finds `</tag>` (whitespace allowed before `>`) at or after `from`.
///
/// Returns the offset of `<` and the offset just past `>`.
fn find_close(lower: &str, tag: &str, from: usize) -> Option<(usize, usize)> {
    let needle = format!("</{tag}");
    let mut pos = from;

    loop {
        let start = pos + lower.get(pos..)?.find(&needle)?;
        let rest = &lower[start + needle.len()..];
        let trimmed = rest.trim_start();
        if trimmed.starts_with('>') {
            let gt = start + needle.len() + (rest.len() - trimmed.len());
            return Some((start, gt + 1));
        }
        pos = start + needle.len();
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// Iterator over `(name, value)` pairs of a start tag.
///
/// Accepts double-quoted, single-quoted and unquoted values. A bare attribute
/// (`<script async>`) yields an empty value. Values are raw (entities undecoded).
pub struct Attributes<'a> {
    tag: &'a str,
    pos: usize,
}

/// Iterates the attributes of a start tag such as `<link rel="subnet" href="...">`.
pub fn attributes(start_tag: &str) -> Attributes<'_> {
    let bytes = start_tag.as_bytes();
    let mut pos = usize::from(bytes.first() == Some(&b'<'));
    while pos < bytes.len() && !is_name_delimiter(bytes[pos]) {
        pos += 1;
    }
    Attributes { tag: start_tag, pos }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<(&'a str, &'a str)> {
        let bytes = self.tag.as_bytes();

        loop {
            while self.pos < bytes.len()
                && (bytes[self.pos].is_ascii_whitespace() || bytes[self.pos] == b'/')
            {
                self.pos += 1;
            }
            if self.pos >= bytes.len() || bytes[self.pos] == b'>' {
                return None;
            }

            let name_start = self.pos;
            while self.pos < bytes.len() && !is_name_delimiter(bytes[self.pos]) {
                self.pos += 1;
            }
            if self.pos == name_start {
                // Stray quote or `=`; step over it.
                self.pos += 1;
                continue;
            }
            let name = &self.tag[name_start..self.pos];

            let mut cursor = self.pos;
            while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }
            if bytes.get(cursor) != Some(&b'=') {
                return Some((name, ""));
            }
            cursor += 1;
            while cursor < bytes.len() && bytes[cursor].is_ascii_whitespace() {
                cursor += 1;
            }

            let value = match bytes.get(cursor) {
                Some(&quote) if quote == b'"' || quote == b'\'' => {
                    let value_start = cursor + 1;
                    let value_end = self.tag[value_start..]
                        .find(quote as char)
                        .map(|i| value_start + i)
                        .unwrap_or(bytes.len());
                    self.pos = (value_end + 1).min(bytes.len());
                    &self.tag[value_start..value_end]
                }
                Some(_) => {
                    let value_start = cursor;
                    let mut value_end = cursor;
                    while value_end < bytes.len()
                        && !bytes[value_end].is_ascii_whitespace()
                        && bytes[value_end] != b'>'
                    {
                        value_end += 1;
                    }
                    self.pos = value_end;
                    &self.tag[value_start..value_end]
                }
                None => {
                    self.pos = bytes.len();
                    ""
                }
            };

            return Some((name, value));
        }
    }
}

fn is_name_delimiter(b: u8) -> bool {
    b.is_ascii_whitespace() || matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'')
}

/// Returns the raw value of `attr` (case-insensitive name) within one start tag.
pub fn attr_value<'a>(start_tag: &'a str, attr: &str) -> Option<&'a str> {
    attributes(start_tag)
        .find(|(name, _)| name.eq_ignore_ascii_case(attr))
        .map(|(_, value)| value)
}

/// Returns `raw` with entities decoded, borrowing when nothing needs decoding.
pub(crate) fn decoded(raw: &str) -> Cow<'_, str> {
    if raw.contains('&') {
        Cow::Owned(decode_entities(raw))
    } else {
        Cow::Borrowed(raw)
    }
}
