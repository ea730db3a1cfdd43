//! Fetch command - pull records and payloads from remote caches

use crate::cli::args::FetchArgs;
use crate::cli::commands::{batch_spinner, cache_client, read_hash_list};
use crate::config::Config;
use crate::error::NarkeepResult;
use crate::store::local::NarStore;
use console::style;

/// Execute the fetch command
pub async fn execute(store: &NarStore, args: FetchArgs, config: &Config) -> NarkeepResult<()> {
    let hashes = read_hash_list(args.input.as_deref()).await?;
    if hashes.is_empty() {
        println!("Nothing to fetch.");
        return Ok(());
    }

    let client = cache_client(&args.caches, config);
    let spinner = batch_spinner(format!("Fetching {} path(s)...", hashes.len()));
    let summary = client.fetch(&hashes, store);
    spinner.finish_and_clear();

    println!(
        "{} fetched {} of {} path(s)",
        style("✓").green(),
        summary.fetched.len(),
        hashes.len()
    );
    if !summary.missing.is_empty() {
        println!(
            "{} {} path(s) not found in any cache",
            style("!").yellow(),
            summary.missing.len()
        );
    }

    Ok(())
}
