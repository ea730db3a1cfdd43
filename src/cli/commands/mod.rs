//! CLI command implementations

pub mod cache;
pub mod check;
pub mod compress;
pub mod drvs;
pub mod fetch;
pub mod get;
pub mod nixcopy;
pub mod orphans;

pub use cache::execute as cache;
pub use check::execute as check;
pub use compress::execute as compress;
pub use drvs::execute as drvs;
pub use fetch::execute as fetch;
pub use get::execute as get;
pub use nixcopy::execute as nixcopy;
pub use orphans::execute as orphans;

use crate::config::Config;
use crate::error::{NarkeepError, NarkeepResult};
use crate::remote::{CacheClient, Endpoint};
use crate::store::closure::{self, Closure};
use crate::store::hash::StoreHash;
use crate::store::local::NarStore;
use indicatif::ProgressBar;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Resolve the closure of `hash`, or snapshot the whole store
pub(crate) fn closure_or_store(
    store: &NarStore,
    hash: Option<&str>,
) -> NarkeepResult<Closure> {
    match hash {
        Some(hash) => Ok(closure::resolve(StoreHash::new(hash)?, store)),
        None => Ok(store.enumerate()?.by_hash),
    }
}

/// Cache client from `--caches` or the configured endpoints
pub(crate) fn cache_client(cli_caches: &[String], config: &Config) -> CacheClient {
    let sources: &[String] = if cli_caches.is_empty() {
        &config.remote.caches
    } else {
        cli_caches
    };
    let endpoints = sources.iter().map(|s| Endpoint::parse(s)).collect();
    CacheClient::new(endpoints, Duration::from_secs(config.remote.timeout_secs))
}

/// Read a newline-delimited hash list from a file or stdin
///
/// Blank lines are skipped; lines that do not yield a store hash are
/// warned about and dropped.
pub(crate) async fn read_hash_list(input: Option<&Path>) -> NarkeepResult<Vec<StoreHash>> {
    let text = match input {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| NarkeepError::io(format!("reading {}", path.display()), e))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| NarkeepError::io("reading hashes from stdin", e))?;
            buf
        }
    };

    let mut hashes = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match StoreHash::from_name(line) {
            Ok(hash) => hashes.push(hash),
            Err(err) => warn!("skipping input line: {err}"),
        }
    }
    Ok(hashes)
}

/// Spinner shown around a long-running batch
///
/// Renders only when stderr is a terminal; finished and cleared by the
/// caller once the batch returns.
pub(crate) fn batch_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

/// Format bytes as human-readable size (e.g., "1.5 GB")
pub(crate) fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
