use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};

use subnet_hub::aggregate::{Aggregate, Aggregator, SourceKind};
use subnet_hub::config::Config;
use subnet_hub::fetch::Fetcher;
use subnet_hub::manifest::HubManifest;
use subnet_hub::site::write_site;
use subnet_hub::storage::Database;
use subnet_hub::widget::{HubClient, DEFAULT_COUNT};

#[derive(Parser, Debug)]
#[command(
    name = "subnet-hub",
    version,
    about = "Federated feed hub: verify members, merge their feeds, publish"
)]
struct Args {
    /// Settings file (optional; defaults apply when missing)
    #[arg(long, global = true, value_name = "FILE", default_value = "subnet-hub.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Verify nodes, merge feeds and write feed.xml, subnet.opml and subnet.json
    Build {
        /// Hub manifest
        #[arg(long, value_name = "FILE", default_value = "subnet.json")]
        manifest: PathBuf,

        /// Output directory (overrides `output_dir` from the config file)
        #[arg(long, value_name = "DIR")]
        out: Option<PathBuf>,
    },

    /// Check every node's back-link; exits non-zero if any node fails
    Verify {
        /// Hub manifest
        #[arg(long, value_name = "FILE", default_value = "subnet.json")]
        manifest: PathBuf,
    },

    /// Print the newest entries across published hub feeds
    Widget {
        /// Hub URL (repeatable)
        #[arg(long = "hub", value_name = "URL", required = true)]
        hubs: Vec<String>,

        /// Number of entries to show
        #[arg(long, default_value_t = DEFAULT_COUNT)]
        count: usize,

        /// Hide entries whose link is on this host
        #[arg(long, value_name = "HOST")]
        exclude_host: Option<String>,

        /// Skip the on-disk hub cache
        #[arg(long)]
        no_cache: bool,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so stdout stays the progress report.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config '{}'", args.config.display()))?;
    let fetcher = Fetcher::new(&config).context("Failed to build HTTP client")?;

    match args.command {
        Command::Build { manifest, out } => {
            let out_dir = out.unwrap_or_else(|| config.output_dir.clone());
            build(&config, fetcher, &manifest, &out_dir).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify { manifest } => verify(&config, fetcher, &manifest).await,
        Command::Widget {
            hubs,
            count,
            exclude_host,
            no_cache,
        } => {
            let cache = if no_cache {
                None
            } else {
                open_cache(&config.cache_path).await
            };
            let client = HubClient::new(fetcher, cache);
            let view = client
                .collect_hubs(&hubs, count, exclude_host.as_deref(), Utc::now())
                .await;

            if view.entries.is_empty() && view.hubs.is_empty() {
                println!("Nothing to show.");
                return Ok(ExitCode::SUCCESS);
            }
            for entry in &view.entries {
                let date = entry
                    .published
                    .map(|d| d.format("%b %e, %Y").to_string())
                    .unwrap_or_default();
                let mut meta: Vec<&str> = Vec::new();
                if let Some(author) = entry.author.as_deref() {
                    meta.push(author);
                }
                meta.push(&entry.provenance);
                if !date.is_empty() {
                    meta.push(&date);
                }
                println!("{}\n  {}\n  {}", entry.title, entry.link, meta.join(" · "));
            }
            let hubs: Vec<String> = view
                .hubs
                .iter()
                .map(|h| format!("{} <{}>", h.title, h.link))
                .collect();
            println!("\nSubnets: {}", hubs.join(", "));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_manifest(path: &Path) -> Result<(HubManifest, String)> {
    HubManifest::load(path).with_context(|| format!("Failed to load manifest '{}'", path.display()))
}

async fn build(config: &Config, fetcher: Fetcher, manifest_path: &Path, out_dir: &Path) -> Result<()> {
    let (manifest, raw) = load_manifest(manifest_path)?;
    println!("Building {}", manifest.label());

    let aggregator = Aggregator::new(fetcher, config.max_concurrent_fetches);
    let aggregate = aggregator.run(&manifest).await;
    print_report(&manifest, &aggregate);

    let files = write_site(out_dir, &manifest.subnet, &raw, &aggregate, Utc::now())
        .context("Failed to write site")?;
    println!(
        "Wrote {} entries from {} node(s) and {} peer(s) to {}",
        aggregate.entries.len(),
        aggregate.active_nodes.len(),
        aggregate.peers.len(),
        files.feed.parent().unwrap_or(out_dir).display()
    );
    Ok(())
}

fn print_report(manifest: &HubManifest, aggregate: &Aggregate) {
    for node in &manifest.nodes {
        match aggregate.inactive_nodes.iter().find(|i| &i.node == node) {
            Some(inactive) => println!("Checking {} ... FAIL: {}", node.url, inactive.reason),
            None => println!("Checking {} ... ok", node.url),
        }
    }
    for report in &aggregate.reports {
        let kind = match report.kind {
            SourceKind::Node => "node",
            SourceKind::Peer => "peer",
        };
        match &report.outcome {
            Ok(count) => println!("Fetched {kind} {} ({}) ... {count} entries", report.name, report.url),
            Err(e) => println!("Fetched {kind} {} ({}) ... failed: {e}", report.name, report.url),
        }
    }
    for peer in &aggregate.peers {
        match peer.node_count {
            Some(n) => println!("Peer {} <{}>: {n} node(s)", peer.name, peer.hub),
            None => println!("Peer {} <{}>: unreachable", peer.name, peer.hub),
        }
    }
}

async fn verify(config: &Config, fetcher: Fetcher, manifest_path: &Path) -> Result<ExitCode> {
    let (manifest, _) = load_manifest(manifest_path)?;
    if manifest.nodes.is_empty() {
        println!("No nodes to verify.");
        return Ok(ExitCode::SUCCESS);
    }

    let aggregator = Aggregator::new(fetcher, config.max_concurrent_fetches);
    let verdicts = aggregator
        .verify_nodes(&manifest.nodes, &manifest.subnet.hub)
        .await;

    let mut failed = 0usize;
    for (node, verdict) in &verdicts {
        if verdict.ok {
            println!("Checking {} ... ok", node.url);
        } else {
            failed += 1;
            let reason = verdict.reason.as_deref().unwrap_or("verification failed");
            println!("Checking {} ... FAIL: {}", node.url, reason);
        }
    }

    if failed > 0 {
        println!("\n{failed} of {} node(s) failed verification.", verdicts.len());
        Ok(ExitCode::FAILURE)
    } else {
        println!("\nAll {} node(s) verified.", verdicts.len());
        Ok(ExitCode::SUCCESS)
    }
}

/// The widget runs without a cache rather than failing when the file is unusable.
async fn open_cache(path: &Path) -> Option<Database> {
    match Database::open(&path.to_string_lossy()).await {
        Ok(db) => Some(db),
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "Hub cache unavailable");
            None
        }
    }
}
