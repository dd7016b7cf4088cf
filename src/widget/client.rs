use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use thiserror::Error;

use crate::feed::{sort_newest_first, Entry};
use crate::fetch::{Fetcher, SourceError};
use crate::storage::Database;
use crate::util::{host_of, join_hub};

use super::reader::{read_hub_feed, HubMeta, HubSnapshot};

/// Cached snapshots younger than this are served without a request.
pub const CACHE_TTL_SECS: i64 = 30 * 60;

/// How many entries the widget shows when no count is given.
pub const DEFAULT_COUNT: usize = 5;

/// Why a live load failed. Never surfaced: the client falls back to its cache.
#[derive(Debug, Error)]
enum LoadError {
    #[error(transparent)]
    Fetch(#[from] SourceError),
    #[error("invalid hub feed: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// What the widget renders: merged entries plus the hubs that answered.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WidgetView {
    pub hubs: Vec<HubMeta>,
    pub entries: Vec<Entry>,
}

/// Loads hub feeds through a per-hub cache.
///
/// The cache is optional; without one every load goes to the network and a
/// failed load yields nothing.
#[derive(Clone, Debug)]
pub struct HubClient {
    fetcher: Fetcher,
    cache: Option<Database>,
}

/// Cache key for a hub, exactly as configured.
pub fn cache_key(hub: &str) -> String {
    format!("subnet:{hub}")
}

impl HubClient {
    pub fn new(fetcher: Fetcher, cache: Option<Database>) -> Self {
        Self { fetcher, cache }
    }

    /// Returns the hub's snapshot.
    ///
    /// A fresh cached snapshot is returned without touching the network.
    /// Otherwise the feed is fetched, stored and returned. If that fails the
    /// last cached snapshot is returned regardless of age, or `None` when the
    /// hub was never cached.
    pub async fn load_hub(&self, hub: &str, now: DateTime<Utc>) -> Option<HubSnapshot> {
        let key = cache_key(hub);
        let now_secs = now.timestamp();
        let cached = self.cached(&key, now_secs).await;

        if let Some((snapshot, true)) = &cached {
            tracing::debug!(hub = %hub, "Hub cache hit");
            return Some(snapshot.clone());
        }

        match self.fetch_live(hub).await {
            Ok(snapshot) => {
                self.store(&key, &snapshot, now_secs).await;
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!(hub = %hub, error = %e, stale = cached.is_some(), "Hub feed unavailable");
                cached.map(|(snapshot, _)| snapshot)
            }
        }
    }

    /// Loads every hub, merges their entries newest first, drops entries hosted
    /// on `exclude_host` and keeps the first `count`.
    ///
    /// Hubs that yield nothing are left out of `hubs`.
    pub async fn collect_hubs(
        &self,
        hubs: &[String],
        count: usize,
        exclude_host: Option<&str>,
        now: DateTime<Utc>,
    ) -> WidgetView {
        let snapshots: Vec<Option<HubSnapshot>> = stream::iter(hubs)
            .map(|hub| self.load_hub(hub, now))
            .buffered(hubs.len().max(1))
            .collect()
            .await;

        let mut view = WidgetView::default();
        for snapshot in snapshots.into_iter().flatten() {
            view.entries.extend(snapshot.entries);
            view.hubs.push(snapshot.meta);
        }

        sort_newest_first(&mut view.entries);
        if let Some(exclude) = exclude_host {
            // Links without a parseable host are kept.
            view.entries
                .retain(|e| host_of(&e.link).as_deref() != Some(exclude));
        }
        view.entries.truncate(count);
        view
    }

    async fn fetch_live(&self, hub: &str) -> Result<HubSnapshot, LoadError> {
        let body = self.fetcher.get_feed(&join_hub(hub, "feed.xml")).await?;
        Ok(read_hub_feed(&body, hub)?)
    }

    /// The cached snapshot and whether it is still fresh.
    ///
    /// Cache reads never fail the load; a broken row counts as a miss.
    async fn cached(&self, key: &str, now_secs: i64) -> Option<(HubSnapshot, bool)> {
        let db = self.cache.as_ref()?;
        let row = match db.load_payload(key).await {
            Ok(row) => row?,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Hub cache read failed");
                return None;
            }
        };
        match serde_json::from_str(&row.payload) {
            Ok(snapshot) => Some((snapshot, row.is_fresh(now_secs, CACHE_TTL_SECS))),
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Discarding unreadable cache row");
                None
            }
        }
    }

    async fn store(&self, key: &str, snapshot: &HubSnapshot, now_secs: i64) {
        let Some(db) = self.cache.as_ref() else {
            return;
        };
        let payload = match serde_json::to_string(snapshot) {
            Ok(p) => p,
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "Hub cache encode failed");
                return;
            }
        };
        if let Err(e) = db.store_payload(key, &payload, now_secs).await {
            tracing::debug!(key = %key, error = %e, "Hub cache write failed");
        }
    }
}
