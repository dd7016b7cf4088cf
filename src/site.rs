//! Writes a build's published artifacts.
//!
//! | File          | Contents                                      |
//! |---------------|-----------------------------------------------|
//! | `feed.xml`    | merged Atom feed, newest first                |
//! | `subnet.opml` | directory of active nodes                     |
//! | `subnet.json` | the manifest, byte-for-byte, for federation   |
//!
//! Each file is written to a temporary sibling and renamed into place, so a
//! reader never observes a half-written document.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use crate::aggregate::Aggregate;
use crate::feed::{export_directory, render_feed};
use crate::manifest::Subnet;

pub const FEED_FILE: &str = "feed.xml";
pub const DIRECTORY_FILE: &str = "subnet.opml";
pub const MANIFEST_FILE: &str = "subnet.json";

/// Paths of everything [`write_site`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteFiles {
    pub feed: PathBuf,
    pub directory: PathBuf,
    pub manifest: PathBuf,
}

/// Renders and writes the three artifacts into `out_dir`, creating it if needed.
///
/// `manifest_raw` is republished unchanged so peers read exactly what the
/// operator wrote.
pub fn write_site(
    out_dir: &Path,
    subnet: &Subnet,
    manifest_raw: &str,
    aggregate: &Aggregate,
    now: DateTime<Utc>,
) -> Result<SiteFiles> {
    std::fs::create_dir_all(out_dir).with_context(|| {
        format!(
            "Failed to create output directory '{}'",
            out_dir.display()
        )
    })?;

    let feed = render_feed(subnet, &aggregate.entries, now)?;
    let directory = export_directory(subnet, &aggregate.active_nodes, now)?;

    let files = SiteFiles {
        feed: out_dir.join(FEED_FILE),
        directory: out_dir.join(DIRECTORY_FILE),
        manifest: out_dir.join(MANIFEST_FILE),
    };
    write_atomic(&files.feed, feed.as_bytes())?;
    write_atomic(&files.directory, directory.as_bytes())?;
    write_atomic(&files.manifest, manifest_raw.as_bytes())?;

    tracing::info!(
        dir = %out_dir.display(),
        entries = aggregate.entries.len(),
        nodes = aggregate.active_nodes.len(),
        "Wrote site"
    );
    Ok(files)
}

/// Writes `content` to `path` via a uniquely named temp file, fsync and rename.
pub fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let temp_path = path.with_extension(format!("tmp.{:016x}", suffix));

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)
        .with_context(|| {
            format!(
                "Failed to create temporary file '{}': check directory permissions",
                temp_path.display()
            )
        })?;

    let written = file
        .write_all(content)
        .and_then(|()| file.sync_all())
        .with_context(|| format!("Failed to write '{}'", temp_path.display()));
    drop(file);
    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    // Windows refuses to rename over an existing file.
    #[cfg(windows)]
    if path.exists() {
        std::fs::remove_file(path).with_context(|| {
            let _ = std::fs::remove_file(&temp_path);
            format!("Failed to remove existing '{}'", path.display())
        })?;
    }

    std::fs::rename(&temp_path, path).with_context(|| {
        let _ = std::fs::remove_file(&temp_path);
        format!(
            "Failed to rename '{}' to '{}'",
            temp_path.display(),
            path.display()
        )
    })?;

    Ok(())
}
