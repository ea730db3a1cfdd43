//! Compress command - re-encode payloads and update their records
//!
//! Original payload files are renamed, never deleted: a payload whose
//! name does not change is overwritten in place by the rename.

use crate::cli::args::CompressArgs;
use crate::cli::commands::{batch_spinner, format_bytes, read_hash_list};
use crate::compress::recompress_batch;
use crate::config::Config;
use crate::error::NarkeepResult;
use crate::services::codec::StreamCodec;
use crate::services::hasher::Sha256Hasher;
use crate::store::local::NarStore;
use crate::store::narinfo::CompressionFormat;
use console::style;

/// Execute the compress command
pub async fn execute(store: &NarStore, args: CompressArgs, config: &Config) -> NarkeepResult<()> {
    // An unsupported target tag is fatal before any payload is touched
    let target = CompressionFormat::from_tag(
        args.compression.as_deref().unwrap_or(&config.compression.default),
    )?;

    let hashes = read_hash_list(args.input.as_deref()).await?;
    if hashes.is_empty() {
        println!("Nothing to compress.");
        return Ok(());
    }

    let codec = StreamCodec {
        xz_level: config.compression.xz_level,
        zstd_level: config.compression.zstd_level,
    };

    let spinner = batch_spinner(format!(
        "Recompressing {} path(s) to {target}...",
        hashes.len()
    ));
    let summary = recompress_batch(
        store,
        &hashes,
        target,
        &codec,
        &Sha256Hasher,
        &config.store.nar_dir,
    );
    spinner.finish_and_clear();

    println!("Old size: {}", format_bytes(summary.old_bytes));
    println!(
        "New size: {} ({:.1}% saved)",
        format_bytes(summary.new_bytes),
        summary.percent_saved()
    );
    if !summary.failed.is_empty() {
        println!(
            "{} {} path(s) failed",
            style("!").yellow(),
            summary.failed.len()
        );
    }

    Ok(())
}
