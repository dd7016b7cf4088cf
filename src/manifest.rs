//! The hub manifest (`subnet.json`).
//!
//! The manifest is operator-owned and read-only to the engine. It is also
//! re-published verbatim next to the build output so that peers can federate
//! against it, which is why the loader keeps the raw bytes around.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{normalize_hub_url, UrlValidationError};

/// Errors that can occur while loading a manifest. These are the only fatal
/// configuration errors of a build.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Failed to read manifest: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid hub URL in manifest: {0}")]
    InvalidHub(#[from] UrlValidationError),
}

/// Identity of the aggregating hub.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    /// Absolute hub URL without trailing slash (after [`HubManifest::from_json`]).
    pub hub: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Subnet {
    /// The title when set and non-empty, otherwise the hub URL.
    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.hub)
    }
}

/// A member site contributing one feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub url: String,
    pub feed: String,
}

/// Reference to another hub. Federation is one hop: a peer's own peers are never read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRef {
    pub name: String,
    pub hub: String,
}

/// Parsed `subnet.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubManifest {
    pub subnet: Subnet,
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub peers: Vec<PeerRef>,
}

impl HubManifest {
    /// Parses manifest JSON and normalizes the hub URL.
    ///
    /// # Errors
    ///
    /// - [`ManifestError::Json`] for malformed JSON or a missing `subnet.hub`
    /// - [`ManifestError::InvalidHub`] when the hub is not an absolute http(s) URL
    pub fn from_json(json: &str) -> Result<Self, ManifestError> {
        let mut manifest: HubManifest = serde_json::from_str(json)?;
        manifest.subnet.hub = normalize_hub_url(&manifest.subnet.hub)?;
        Ok(manifest)
    }

    /// Reads and parses a manifest file, returning it with the raw file content.
    pub fn load(path: &Path) -> Result<(Self, String), ManifestError> {
        let raw = std::fs::read_to_string(path)?;
        let manifest = Self::from_json(&raw)?;
        tracing::debug!(
            path = %path.display(),
            hub = %manifest.subnet.hub,
            nodes = manifest.nodes.len(),
            peers = manifest.peers.len(),
            "Loaded manifest"
        );
        Ok((manifest, raw))
    }

    /// Label for progress output: the title, or the hub URL.
    pub fn label(&self) -> &str {
        self.subnet.display_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_full() {
        let json = r#"{
            "subnet": {"hub": "https://hub.example/", "title": "Hub", "description": "d"},
            "nodes": [{"name": "A", "url": "https://a.example", "feed": "https://a.example/feed"}],
            "peers": [{"name": "P", "hub": "https://peer.example"}]
        }"#;
        let m = HubManifest::from_json(json).unwrap();
        assert_eq!(m.subnet.hub, "https://hub.example");
        assert_eq!(m.label(), "Hub");
        assert_eq!(m.nodes.len(), 1);
        assert_eq!(m.peers[0].name, "P");
    }

    #[test]
    fn test_nodes_and_peers_default_empty() {
        let m = HubManifest::from_json(r#"{"subnet": {"hub": "https://h.example"}}"#).unwrap();
        assert!(m.nodes.is_empty());
        assert!(m.peers.is_empty());
        assert_eq!(m.label(), "https://h.example");
    }

    #[test]
    fn test_empty_title_uses_hub() {
        let m =
            HubManifest::from_json(r#"{"subnet": {"hub": "https://h.example", "title": ""}}"#)
                .unwrap();
        assert_eq!(m.subnet.display_name(), "https://h.example");
    }

    #[test]
    fn test_relative_hub_rejected() {
        let err = HubManifest::from_json(r#"{"subnet": {"hub": "hub.example"}}"#).unwrap_err();
        assert!(matches!(err, ManifestError::InvalidHub(_)));
    }

    #[test]
    fn test_missing_subnet_rejected() {
        let err = HubManifest::from_json(r#"{"nodes": []}"#).unwrap_err();
        assert!(matches!(err, ManifestError::Json(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = HubManifest::load(Path::new("/nonexistent/subnet.json")).unwrap_err();
        assert!(matches!(err, ManifestError::Io(_)));
    }
}
