//! Back-link verification: proof that a node belongs to this hub.
//!
//! A member site must expose `<link rel="subnet" href="HUB_URL">` somewhere in its
//! HTML. Attribute order is free, `rel` is compared case-insensitively and trailing
//! slashes on either URL are ignored.

use crate::feed::extract::{attr_value, decoded, start_tags};
use crate::fetch::{Fetcher, SourceError};
use crate::util::trim_trailing_slashes;

/// Outcome of checking one node. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub ok: bool,
    pub reason: Option<String>,
}

impl VerificationResult {
    fn passed() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    fn failed(err: &SourceError) -> Self {
        Self {
            ok: false,
            reason: Some(err.to_string()),
        }
    }
}

/// Fetches `site_url` and checks it for a back-link to `hub_url`.
///
/// Never fails: network errors, timeouts and non-2xx statuses come back as
/// `ok: false` with the reason (`"HTTP 404"`, `"request timed out"`, ...).
pub async fn verify_backlink(
    fetcher: &Fetcher,
    site_url: &str,
    hub_url: &str,
) -> VerificationResult {
    match check_backlink(fetcher, site_url, hub_url).await {
        Ok(()) => VerificationResult::passed(),
        Err(e) => {
            tracing::debug!(site = %site_url, reason = %e, "Back-link verification failed");
            VerificationResult::failed(&e)
        }
    }
}

/// Like [`verify_backlink`] but keeps the typed error.
pub async fn check_backlink(
    fetcher: &Fetcher,
    site_url: &str,
    hub_url: &str,
) -> Result<(), SourceError> {
    let html = fetcher.get_page(site_url).await?;
    if has_backlink(&html, hub_url) {
        Ok(())
    } else {
        Err(SourceError::Verification("link tag not found".to_string()))
    }
}

/// Scans every `<link>` in `html` for `rel="subnet"` pointing at `hub_url`.
///
/// All occurrences are considered, not just the first `<link>`.
pub fn has_backlink(html: &str, hub_url: &str) -> bool {
    let hub = trim_trailing_slashes(hub_url.trim());

    start_tags(html, "link").any(|tag| {
        let is_subnet =
            attr_value(tag, "rel").is_some_and(|rel| rel.trim().eq_ignore_ascii_case("subnet"));
        is_subnet
            && attr_value(tag, "href")
                .is_some_and(|href| trim_trailing_slashes(decoded(href.trim()).as_ref()) == hub)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_href_first_with_trailing_slash() {
        let html = r#"<head><link href="https://hub/" rel="subnet"></head>"#;
        assert!(has_backlink(html, "https://hub"));
    }

    #[test]
    fn test_rel_first_hub_with_trailing_slash() {
        let html = r#"<link rel="subnet" href="https://h.example">"#;
        assert!(has_backlink(html, "https://h.example/"));
    }

    #[test]
    fn test_rel_case_insensitive_and_single_quotes() {
        let html = "<LINK REL='Subnet' HREF='https://h.example'/>";
        assert!(has_backlink(html, "https://h.example"));
    }

    #[test]
    fn test_not_first_link_in_document() {
        let html = r#"
            <link rel="stylesheet" href="/style.css">
            <link rel="subnet" href="https://other.example">
            <link rel="alternate" type="application/rss+xml" href="/feed.xml">
            <link href="https://h.example" rel="subnet">
        "#;
        assert!(has_backlink(html, "https://h.example"));
    }

    #[test]
    fn test_wrong_hub_or_rel_rejected() {
        assert!(!has_backlink(
            r#"<link rel="subnet" href="https://other.example">"#,
            "https://h.example"
        ));
        assert!(!has_backlink(
            r#"<link rel="me" href="https://h.example">"#,
            "https://h.example"
        ));
        assert!(!has_backlink(
            r#"<a rel="subnet" href="https://h.example">"#,
            "https://h.example"
        ));
        assert!(!has_backlink("", "https://h.example"));
    }

    #[test]
    fn test_path_differences_matter() {
        assert!(!has_backlink(
            r#"<link rel="subnet" href="https://h.example/net">"#,
            "https://h.example"
        ));
    }

    #[tokio::test]
    async fn test_verify_backlink_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><link href="https://hub.example/" rel="subnet"></head></html>"#,
            ))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(&Config::default()).unwrap();
        let result =
            verify_backlink(&fetcher, &format!("{}/", mock_server.uri()), "https://hub.example")
                .await;
        assert_eq!(result, VerificationResult::passed());
    }

    #[tokio::test]
    async fn test_verify_backlink_missing_tag() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(&Config::default()).unwrap();
        let result = verify_backlink(&fetcher, &mock_server.uri(), "https://hub.example").await;
        assert!(!result.ok);
        assert_eq!(result.reason.as_deref(), Some("link tag not found"));
    }

    #[tokio::test]
    async fn test_verify_backlink_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let fetcher = Fetcher::new(&Config::default()).unwrap();
        let result = verify_backlink(&fetcher, &mock_server.uri(), "https://hub.example").await;
        assert!(!result.ok);
        assert_eq!(result.reason.as_deref(), Some("HTTP 404"));
    }
}
