//! Utility functions for hub URL handling.
//!
//! Hub identities are compared, joined and published without trailing slashes;
//! everything that touches a hub URL goes through these helpers.
//!
//! # Examples
//!
//! ```
//! use subnet_hub::util::{join_hub, normalize_hub_url};
//!
//! let hub = normalize_hub_url("https://hub.example/").unwrap();
//! assert_eq!(join_hub(&hub, "feed.xml"), "https://hub.example/feed.xml");
//! ```

mod hub_url;

pub use hub_url::{host_of, join_hub, normalize_hub_url, trim_trailing_slashes, UrlValidationError};
