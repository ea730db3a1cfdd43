//! Cache command - check remote caches for availability

use crate::cli::args::CacheArgs;
use crate::cli::commands::{batch_spinner, cache_client, closure_or_store};
use crate::config::Config;
use crate::error::NarkeepResult;
use crate::store::local::NarStore;

/// Execute the cache command
pub async fn execute(store: &NarStore, args: CacheArgs, config: &Config) -> NarkeepResult<()> {
    let client = cache_client(&args.caches, config);
    let closure = closure_or_store(store, args.hash.as_deref())?;

    let spinner = batch_spinner(format!(
        "Probing {} endpoint(s) for {} path(s)...",
        client.endpoints().len(),
        closure.len()
    ));
    let available = if args.checkrefs {
        client.probe_missing_refs(&closure)
    } else {
        let hashes: Vec<_> = closure.hashes().cloned().collect();
        client.probe(&hashes)
    };
    spinner.finish_and_clear();

    for hash in available {
        println!("{hash}");
    }

    Ok(())
}
