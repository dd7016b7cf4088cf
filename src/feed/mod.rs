//! Feed handling: tolerant extraction, parsing, and publishing.
//!
//! This module provides the document-level pieces of the hub:
//!
//! - **Extraction**: pattern-based lookup of known tags and attributes, no XML stack
//! - **Parsing**: RSS 2.0 and Atom 1.0 documents into normalized entries
//! - **Publishing**: the hub's Atom feed and its OPML member directory
//!
//! # Architecture
//!
//! - [`extract`] - tag/attribute extraction shared by the parser and the back-link verifier
//! - [`format`] - shallow Atom/RSS sniffing
//! - [`normalize`] - timestamp parsing and the entry acceptance rule, shared with
//!   the widget adapter
//! - [`parser`] - per-format field rules
//! - [`atom`] / [`opml`] - writers built on `quick-xml`
//!
//! # Example
//!
//! ```ignore
//! use crate::feed::{parse_feed, render_feed};
//!
//! let entries = parse_feed(&body);
//! let xml = render_feed(&manifest.subnet, &merged, Utc::now())?;
//! ```

mod atom;
mod entry;
pub mod extract;
mod format;
mod normalize;
mod opml;
mod parser;

pub use atom::render_feed;
pub use entry::{sort_key, sort_newest_first, Entry, ParsedEntry};
pub use extract::{extract_attr, extract_tag};
pub use format::{detect_format, FeedFormat};
pub use normalize::{format_timestamp, parse_timestamp, RawEntry};
pub use opml::export_directory;
pub use parser::parse_feed;
