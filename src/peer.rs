//! Peer federation client.
//!
//! Peers are other hubs. From each we read two published documents, its
//! `subnet.json` manifest (for display identity) and its `feed.xml`. Federation
//! is one hop: a peer's own `peers` list is ignored.

use serde::{Deserialize, Serialize};

use crate::feed::{parse_feed, ParsedEntry};
use crate::fetch::{Fetcher, SourceError};
use crate::manifest::PeerRef;
use crate::util::join_hub;

/// What the directory knows about a peer hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMeta {
    pub name: String,
    pub hub: String,
    pub description: Option<String>,
    /// `None` means the peer's manifest could not be read.
    pub node_count: Option<usize>,
}

impl PeerMeta {
    /// Locally configured identity, used when the peer is unreachable.
    pub fn fallback(peer: &PeerRef) -> Self {
        Self {
            name: peer.name.clone(),
            hub: peer.hub.clone(),
            description: None,
            node_count: None,
        }
    }
}

/// The subset of a remote manifest the client reads. Everything is optional;
/// the `nodes` field is only counted, never interpreted.
#[derive(Debug, Deserialize)]
struct RemoteManifest {
    #[serde(default)]
    subnet: Option<RemoteSubnet>,
    #[serde(default)]
    nodes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RemoteSubnet {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// `<hub>/subnet.json`
pub fn peer_manifest_url(peer: &PeerRef) -> String {
    join_hub(&peer.hub, "subnet.json")
}

/// `<hub>/feed.xml`
pub fn peer_feed_url(peer: &PeerRef) -> String {
    join_hub(&peer.hub, "feed.xml")
}

/// Fetches a peer's manifest, falling back to [`PeerMeta::fallback`] on any failure.
pub async fn fetch_peer_meta(fetcher: &Fetcher, peer: &PeerRef) -> PeerMeta {
    match try_fetch_peer_meta(fetcher, peer).await {
        Ok(meta) => meta,
        Err(e) => {
            tracing::warn!(peer = %peer.hub, error = %e, "Peer manifest unavailable, using local data");
            PeerMeta::fallback(peer)
        }
    }
}

/// Fetches and interprets a peer's manifest.
///
/// The peer's own non-empty title wins over the locally configured name. The node
/// count is the length of `nodes` when it is an array, otherwise 0.
pub async fn try_fetch_peer_meta(
    fetcher: &Fetcher,
    peer: &PeerRef,
) -> Result<PeerMeta, SourceError> {
    let body = fetcher.get_page(&peer_manifest_url(peer)).await?;
    let remote: RemoteManifest =
        serde_json::from_str(&body).map_err(|e| SourceError::Parse(e.to_string()))?;

    let (title, description) = match remote.subnet {
        Some(s) => (non_empty(s.title), non_empty(s.description)),
        None => (None, None),
    };

    Ok(PeerMeta {
        name: title.unwrap_or_else(|| peer.name.clone()),
        hub: peer.hub.clone(),
        description,
        node_count: Some(remote.nodes.as_array().map_or(0, Vec::len)),
    })
}

/// Fetches and parses a peer's published feed.
pub async fn fetch_peer_feed(
    fetcher: &Fetcher,
    peer: &PeerRef,
) -> Result<Vec<ParsedEntry>, SourceError> {
    let body = fetcher.get_feed(&peer_feed_url(peer)).await?;
    Ok(parse_feed(&body))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn peer(hub: &str) -> PeerRef {
        PeerRef {
            name: "Local Name".into(),
            hub: hub.into(),
        }
    }

    fn fetcher() -> Fetcher {
        Fetcher::new(&Config::default()).unwrap()
    }

    #[test]
    fn test_peer_urls_strip_trailing_slash() {
        let p = peer("https://peer.example/");
        assert_eq!(peer_feed_url(&p), "https://peer.example/feed.xml");
        assert_eq!(peer_manifest_url(&p), "https://peer.example/subnet.json");
    }

    #[tokio::test]
    async fn test_meta_prefers_peer_title() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subnet.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"subnet": {"hub": "x", "title": "Remote Title", "description": "About"},
                    "nodes": [{}, {}, {}],
                    "peers": [{"name": "deeper", "hub": "https://never.example"}]}"#,
            ))
            .mount(&mock_server)
            .await;

        let p = peer(&mock_server.uri());
        let meta = fetch_peer_meta(&fetcher(), &p).await;
        assert_eq!(
            meta,
            PeerMeta {
                name: "Remote Title".into(),
                hub: mock_server.uri(),
                description: Some("About".into()),
                node_count: Some(3),
            }
        );
    }

    #[tokio::test]
    async fn test_meta_empty_title_uses_local_name() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/subnet.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"{"subnet": {"title": "", "description": ""}, "nodes": "oops"}"#),
            )
            .mount(&mock_server)
            .await;

        let meta = fetch_peer_meta(&fetcher(), &peer(&mock_server.uri())).await;
        assert_eq!(meta.name, "Local Name");
        assert_eq!(meta.description, None);
        assert_eq!(meta.node_count, Some(0));
    }

    #[tokio::test]
    async fn test_meta_falls_back_on_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let p = peer(&mock_server.uri());
        assert_eq!(fetch_peer_meta(&fetcher(), &p).await, PeerMeta::fallback(&p));
    }

    #[tokio::test]
    async fn test_meta_falls_back_on_malformed_json() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&mock_server)
            .await;

        let p = peer(&mock_server.uri());
        let err = try_fetch_peer_meta(&fetcher(), &p).await.unwrap_err();
        assert!(matches!(err, SourceError::Parse(_)));
        let meta = fetch_peer_meta(&fetcher(), &p).await;
        assert_eq!(meta.node_count, None);
        assert_eq!(meta.name, "Local Name");
    }
}
