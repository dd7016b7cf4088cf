//! Data path of the embeddable widget.
//!
//! The widget reads published hub feeds (the hub's own `feed.xml`, not member
//! feeds), caches one snapshot per hub for 30 minutes and shows the newest few
//! entries across all configured hubs. Presentation is left to the embedder;
//! the CLI's `widget` command prints the view.

mod client;
mod reader;

pub use client::{cache_key, HubClient, WidgetView, CACHE_TTL_SECS, DEFAULT_COUNT};
pub use reader::{read_hub_feed, HubMeta, HubSnapshot};
