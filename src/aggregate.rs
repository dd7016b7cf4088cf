//! The aggregation engine.
//!
//! One build runs in three phases:
//!
//! 1. **Verify** every node's back-link. The active/inactive partition only exists
//!    once all verifications have settled.
//! 2. **Fetch** every active node's feed and every peer's manifest and feed. These
//!    sources are independent and run concurrently, bounded by the configured limit.
//! 3. **Merge**: concatenate results in manifest order (nodes, then peers) and sort
//!    once, newest first.
//!
//! A failing source contributes zero entries (or fallback peer metadata) and a
//! [`SourceReport`] saying why. It never affects other sources.

use futures::stream::{self, StreamExt};

use crate::feed::{parse_feed, sort_newest_first, Entry, ParsedEntry};
use crate::fetch::{Fetcher, SourceError};
use crate::manifest::{HubManifest, Node, PeerRef};
use crate::peer::{fetch_peer_feed, fetch_peer_meta, peer_feed_url, PeerMeta};
use crate::verify::{verify_backlink, VerificationResult};

/// Which side of the federation a source sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Node,
    Peer,
}

/// Outcome of fetching one source's feed.
#[derive(Debug)]
pub struct SourceReport {
    pub kind: SourceKind,
    /// Node name, or the peer's resolved display name.
    pub name: String,
    /// The feed URL that was fetched.
    pub url: String,
    /// Number of entries contributed, or why there are none.
    pub outcome: Result<usize, SourceError>,
}

/// A node that failed verification and is left out of the feed and the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InactiveNode {
    pub node: Node,
    pub reason: String,
}

/// Everything one build produces for the writers.
#[derive(Debug, Default)]
pub struct Aggregate {
    /// Verified nodes, in manifest order.
    pub active_nodes: Vec<Node>,
    pub inactive_nodes: Vec<InactiveNode>,
    /// One entry per configured peer, in manifest order, reachable or not.
    pub peers: Vec<PeerMeta>,
    /// Merged entries, newest first. Duplicate links are kept.
    pub entries: Vec<Entry>,
    /// One report per fetched feed, in manifest order.
    pub reports: Vec<SourceReport>,
}

enum Source<'a> {
    Node(&'a Node),
    Peer(&'a PeerRef),
}

struct SourceResult {
    report: SourceReport,
    entries: Vec<Entry>,
    peer: Option<PeerMeta>,
}

/// Runs builds against a manifest.
#[derive(Clone, Debug)]
pub struct Aggregator {
    fetcher: Fetcher,
    concurrency: usize,
}

impl Aggregator {
    /// `concurrency` bounds simultaneous source fetches; 1 reproduces a strictly
    /// sequential build.
    pub fn new(fetcher: Fetcher, concurrency: usize) -> Self {
        Self {
            fetcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Verifies, fetches and merges everything the manifest names.
    pub async fn run(&self, manifest: &HubManifest) -> Aggregate {
        let hub = manifest.subnet.hub.as_str();
        tracing::info!(
            hub = %hub,
            nodes = manifest.nodes.len(),
            peers = manifest.peers.len(),
            "Building hub"
        );

        let verdicts = self.verify_nodes(&manifest.nodes, hub).await;
        let (active_nodes, inactive_nodes) = partition(verdicts);
        if !manifest.nodes.is_empty() {
            tracing::info!(
                active = active_nodes.len(),
                total = manifest.nodes.len(),
                "Node verification complete"
            );
        }

        let sources = active_nodes
            .iter()
            .map(Source::Node)
            .chain(manifest.peers.iter().map(Source::Peer));

        let results: Vec<SourceResult> = stream::iter(sources)
            .map(|source| self.fetch_source(source, hub))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut aggregate = Aggregate {
            active_nodes,
            inactive_nodes,
            ..Aggregate::default()
        };
        for result in results {
            aggregate.entries.extend(result.entries);
            aggregate.peers.extend(result.peer);
            aggregate.reports.push(result.report);
        }

        // Every source has reported; this is the only authoritative ordering.
        sort_newest_first(&mut aggregate.entries);
        tracing::info!(entries = aggregate.entries.len(), "Merged entries");
        aggregate
    }

    /// Checks every node's back-link. Results come back in manifest order once
    /// all checks have settled.
    pub async fn verify_nodes<'a>(
        &self,
        nodes: &'a [Node],
        hub: &str,
    ) -> Vec<(&'a Node, VerificationResult)> {
        stream::iter(nodes)
            .map(|node| async move {
                let verdict = verify_backlink(&self.fetcher, &node.url, hub).await;
                (node, verdict)
            })
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn fetch_source(&self, source: Source<'_>, hub: &str) -> SourceResult {
        match source {
            Source::Node(node) => self.fetch_node(node, hub).await,
            Source::Peer(peer) => self.fetch_peer(peer).await,
        }
    }

    /// Local entries speak for this hub: provenance is the hub identity and a
    /// missing author becomes the node's name.
    async fn fetch_node(&self, node: &Node, hub: &str) -> SourceResult {
        let fetched = fetch_entries(&self.fetcher, &node.feed).await;
        let (entries, outcome) = settle(fetched, |parsed| {
            let mut entry = parsed.attribute(hub);
            entry.author.get_or_insert_with(|| node.name.clone());
            entry
        });
        log_outcome(SourceKind::Node, &node.feed, &outcome);

        SourceResult {
            report: SourceReport {
                kind: SourceKind::Node,
                name: node.name.clone(),
                url: node.feed.clone(),
                outcome,
            },
            entries,
            peer: None,
        }
    }

    /// Peer entries are attributed to the peer's resolved display name. The
    /// manifest is read first because that name comes from it.
    async fn fetch_peer(&self, peer: &PeerRef) -> SourceResult {
        let meta = fetch_peer_meta(&self.fetcher, peer).await;
        match meta.node_count {
            Some(count) => tracing::info!(peer = %peer.hub, nodes = count, "Peer manifest read"),
            None => tracing::info!(peer = %peer.hub, "Peer manifest unavailable, fallback to local data"),
        }

        let url = peer_feed_url(peer);
        let fetched = fetch_peer_feed(&self.fetcher, peer).await;
        let (entries, outcome) = settle(fetched, |parsed| parsed.attribute(meta.name.as_str()));
        log_outcome(SourceKind::Peer, &url, &outcome);

        SourceResult {
            report: SourceReport {
                kind: SourceKind::Peer,
                name: meta.name.clone(),
                url,
                outcome,
            },
            entries,
            peer: Some(meta),
        }
    }
}

/// Splits verdicts into active and inactive nodes, preserving order.
fn partition(verdicts: Vec<(&Node, VerificationResult)>) -> (Vec<Node>, Vec<InactiveNode>) {
    let mut active = Vec::new();
    let mut inactive = Vec::new();
    for (node, verdict) in verdicts {
        if verdict.ok {
            tracing::info!(node = %node.url, "Back-link ok");
            active.push(node.clone());
        } else {
            let reason = verdict
                .reason
                .unwrap_or_else(|| "verification failed".to_string());
            tracing::warn!(node = %node.url, reason = %reason, "Back-link missing, skipping node");
            inactive.push(InactiveNode {
                node: node.clone(),
                reason,
            });
        }
    }
    (active, inactive)
}

/// Fetches and parses one feed URL.
pub async fn fetch_entries(fetcher: &Fetcher, url: &str) -> Result<Vec<ParsedEntry>, SourceError> {
    let body = fetcher.get_feed(url).await?;
    Ok(parse_feed(&body))
}

/// Degrades a fetch result to its safe default: entries on success, none on failure.
fn settle(
    fetched: Result<Vec<ParsedEntry>, SourceError>,
    attribute: impl FnMut(ParsedEntry) -> Entry,
) -> (Vec<Entry>, Result<usize, SourceError>) {
    match fetched {
        Ok(parsed) => {
            let entries: Vec<Entry> = parsed.into_iter().map(attribute).collect();
            let count = entries.len();
            (entries, Ok(count))
        }
        Err(e) => (Vec::new(), Err(e)),
    }
}

fn log_outcome(kind: SourceKind, url: &str, outcome: &Result<usize, SourceError>) {
    match outcome {
        Ok(count) => tracing::info!(?kind, feed = %url, entries = count, "Fetched feed"),
        Err(e) => tracing::warn!(
            ?kind,
            feed = %url,
            failure = ?e.kind(),
            error = %e,
            "Feed unavailable, 0 entries"
        ),
    }
}
