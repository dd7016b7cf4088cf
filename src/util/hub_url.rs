use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a hub URL.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed as an absolute URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
}

/// Strips every trailing `/`.
///
/// Hub URLs are compared and joined in this form: `https://h.example/` and
/// `https://h.example` name the same hub.
///
/// # Examples
///
/// ```
/// use subnet_hub::util::trim_trailing_slashes;
///
/// assert_eq!(trim_trailing_slashes("https://h.example//"), "https://h.example");
/// assert_eq!(trim_trailing_slashes("https://h.example/a"), "https://h.example/a");
/// ```
pub fn trim_trailing_slashes(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Validates that `url_str` is an absolute http(s) URL and returns it without
/// trailing slashes.
///
/// The original spelling is kept (no re-serialization by the `url` crate), so
/// the hub identity written into feeds matches what operators typed.
pub fn normalize_hub_url(url_str: &str) -> Result<String, UrlValidationError> {
    let trimmed = trim_trailing_slashes(url_str.trim());
    let url = Url::parse(trimmed)?;

    match url.scheme() {
        "http" | "https" => Ok(trimmed.to_owned()),
        scheme => Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }
}

/// Joins a path onto a hub URL: `join_hub("https://h/", "feed.xml")` is `https://h/feed.xml`.
pub fn join_hub(hub: &str, path: &str) -> String {
    format!("{}/{}", trim_trailing_slashes(hub), path.trim_start_matches('/'))
}

/// Host of an absolute URL, if it has one.
pub fn host_of(url_str: &str) -> Option<String> {
    Url::parse(url_str)
        .ok()
        .and_then(|u| u.host_str().map(str::to_owned))
}
