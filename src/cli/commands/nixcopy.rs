//! Nixcopy command - copy a closure from the local nix installation

use crate::cli::args::NixcopyArgs;
use crate::cli::commands::{batch_spinner, cache_client};
use crate::config::Config;
use crate::error::{NarkeepError, NarkeepResult};
use crate::ingest;
use crate::services::codec::StreamCodec;
use crate::services::hasher::Sha256Hasher;
use crate::services::nix::NixCli;
use crate::store::hash::StoreHash;
use crate::store::local::NarStore;
use crate::store::narinfo::CompressionFormat;
use console::style;
use std::collections::HashSet;
use std::fmt::Write as _;

/// Execute the nixcopy command
pub async fn execute(store: &NarStore, args: NixcopyArgs, config: &Config) -> NarkeepResult<()> {
    let target = CompressionFormat::from_tag(
        args.compression.as_deref().unwrap_or(&config.compression.default),
    )?;
    let source = NixCli;

    let spinner = batch_spinner(format!("Resolving closure of {}...", args.path));
    let closure = ingest::closure_from_source(&source, &args.path)?;
    spinner.finish_and_clear();
    println!("Closure has {} path(s)", closure.len());

    let skip: HashSet<StoreHash> = if args.skipcached {
        let client = cache_client(&args.caches, config);
        let spinner = batch_spinner(format!(
            "Probing {} endpoint(s) for cached paths...",
            client.endpoints().len()
        ));
        let hashes: Vec<_> = closure.hashes().cloned().collect();
        let cached = client.probe(&hashes);
        spinner.finish_and_clear();
        cached.into_iter().collect()
    } else {
        HashSet::new()
    };

    let codec = StreamCodec {
        xz_level: config.compression.xz_level,
        zstd_level: config.compression.zstd_level,
    };

    let spinner = batch_spinner(format!("Copying into {}...", store.root().display()));
    let summary = ingest::copy_closure(
        store,
        &source,
        &closure,
        target,
        &codec,
        &Sha256Hasher,
        &config.store.nar_dir,
        &skip,
    );
    spinner.finish_and_clear();

    if let Some(ref output) = args.output {
        let mut text = String::new();
        for hash in &summary.copied_hashes {
            let _ = writeln!(text, "{hash}");
        }
        tokio::fs::write(output, text)
            .await
            .map_err(|e| NarkeepError::io(format!("writing {}", output.display()), e))?;
    }

    println!(
        "{} copied {} path(s), skipped {}",
        style("✓").green(),
        summary.copied,
        summary.skipped
    );
    if summary.failed > 0 {
        println!("{} {} path(s) failed", style("!").yellow(), summary.failed);
    }

    Ok(())
}
