//! mirrorcache - headless host for the local mirror cache.
//!
//! Runs reconciliations against the configured manifest and pushes request
//! URLs through the interceptor, the same way an embedding browser view
//! would.

use std::io;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mirrorcache_core::cache::derive_filename;
use mirrorcache_core::utils::{format_bytes, format_duration_ms, truncate_string};
use mirrorcache_core::{MirrorCache, MirrorConfig, MirrorView};

/// Widest URL printed by `--list` before truncation
const MAX_URL_WIDTH: usize = 72;

const USAGE: &str = "\
Usage: mirrorcache <command>

Commands:
  --sync                           Reconcile the mirror against the manifest
  --resolve <url>...               Show how each request URL would be served
  --list                           Print the tracked manifest
  --time-load <page> <url>...      Load a page, intercept its resources, report the load time

Environment:
  MIRRORCACHE_MANIFEST_URL, MIRRORCACHE_CACHE_DIR, MIRRORCACHE_MEMORY_CACHE,
  MIRRORCACHE_LOG_DIR, RUST_LOG";

/// Initialize the tracing subscriber for logging.
///
/// Returns the file appender guard when `MIRRORCACHE_LOG_DIR` is set; it
/// must stay alive until exit so buffered lines are flushed.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match std::env::var("MIRRORCACHE_LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "mirrorcache.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };

    let config = MirrorConfig::load().context("Failed to load configuration")?;
    info!(cache_root = %config.cache_root().display(), "mirrorcache starting");

    match command.as_str() {
        "--sync" => sync(&config).await,
        "--resolve" => resolve(&config, &args[1..]),
        "--list" => list(&config),
        "--time-load" => time_load(&config, &args[1..]),
        _ => {
            eprintln!("{}", USAGE);
            Ok(())
        }
    }
}

/// Run one reconciliation and print its report
async fn sync(config: &MirrorConfig) -> Result<()> {
    let view = MirrorView::from_config(config)?;
    let handle = view.check_for_updates()?;
    let report = handle.wait().await?;

    println!("{}", report);
    for url in &report.downloaded {
        println!("  + {}", url);
    }
    for failure in &report.failures {
        println!("  ! {} ({})", failure.url, failure.reason);
    }
    if report.is_partial() {
        anyhow::bail!("{} of {} entries failed", report.failures.len(), report.remote_entries);
    }
    Ok(())
}

/// Show how each URL would be served
fn resolve(config: &MirrorConfig, urls: &[String]) -> Result<()> {
    if urls.is_empty() {
        anyhow::bail!("--resolve needs at least one URL");
    }
    let cache = MirrorCache::open(config)?;
    for url in urls {
        match cache.intercept(url) {
            Some(hit) => println!(
                "{} -> {} [{}, {}, {:?}]",
                url,
                hit.filename,
                hit.content_type,
                format_bytes(hit.bytes.len() as u64),
                hit.source
            ),
            None => println!("{} -> pass-through", url),
        }
    }
    Ok(())
}

/// Print the tracked manifest
fn list(config: &MirrorConfig) -> Result<()> {
    let cache = MirrorCache::open(config)?;
    let manifest = cache.manifest();
    println!("{} entries in {}", manifest.len(), cache.root().display());
    for entry in manifest.iter() {
        let on_disk = cache.mirror().contains(&derive_filename(&entry.canonical_url));
        println!(
            "{} {}  {}",
            if on_disk { "*" } else { " " },
            truncate_string(&entry.canonical_url, MAX_URL_WIDTH),
            entry.content_hash
        );
        for alias in &entry.aliases {
            println!("      alias {}", truncate_string(alias, MAX_URL_WIDTH));
        }
    }
    Ok(())
}

/// Simulate a page load: every resource goes through the interceptor
fn time_load(config: &MirrorConfig, args: &[String]) -> Result<()> {
    let Some((page, resources)) = args.split_first() else {
        anyhow::bail!("--time-load needs a page URL");
    };

    let mut view = MirrorView::from_config(config)?;
    let mut served = 0;
    view.set_on_page_load_time_callback(|ms| {
        println!("Page load time: {}", format_duration_ms(ms));
    });

    view.load(page.clone());
    for url in resources {
        if let Some(hit) = view.intercept(url) {
            served += 1;
            println!("  local   {} ({})", url, format_bytes(hit.bytes.len() as u64));
        } else {
            println!("  network {}", url);
        }
    }
    view.page_finished();
    println!(
        "{} of {} resources served locally",
        served,
        resources.len()
    );
    Ok(())
}
