//! subnet-hub: a federated feed hub.
//!
//! A hub verifies that each member site ("node") links back to it, merges the
//! nodes' RSS/Atom feeds with the published feeds of peer hubs, and writes the
//! result as an Atom feed, an OPML directory and a copy of its manifest.

pub mod aggregate;
pub mod config;
pub mod feed;
pub mod fetch;
pub mod manifest;
pub mod peer;
pub mod site;
pub mod storage;
pub mod util;
pub mod verify;
pub mod widget;
