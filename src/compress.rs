//! Payload recompression
//!
//! Swaps the compression of payload files and rewrites the owning
//! records. Each identifier is processed to completion or not at all;
//! the batch carries on past individual failures.

use crate::error::{NarkeepError, NarkeepResult};
use crate::services::codec::NarCodec;
use crate::services::hasher::ContentHasher;
use crate::store::hash::StoreHash;
use crate::store::local::NarStore;
use crate::store::narinfo::{CompressionFormat, NarInfo};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Aggregate outcome of a recompression batch
#[derive(Debug, Default)]
pub struct RecompressSummary {
    pub old_bytes: u64,
    pub new_bytes: u64,
    pub recompressed: usize,
    pub failed: Vec<(StoreHash, String)>,
}

impl RecompressSummary {
    /// Percent saved relative to the old total
    pub fn percent_saved(&self) -> f64 {
        if self.old_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.new_bytes as f64 / self.old_bytes as f64) * 100.0
    }
}

/// Transport size when present, content size otherwise
fn accounted_size(info: &NarInfo) -> u64 {
    info.file_size.unwrap_or(info.nar_size)
}

/// Recompress `hashes` to `target`
///
/// Per-identifier atomic, batch best-effort: a failing identifier is
/// warned about and recorded in the summary, the rest of the batch
/// proceeds, and earlier successes are never rolled back.
pub fn recompress_batch(
    store: &NarStore,
    hashes: &[StoreHash],
    target: CompressionFormat,
    codec: &dyn NarCodec,
    hasher: &dyn ContentHasher,
    nar_dir: &str,
) -> RecompressSummary {
    let mut summary = RecompressSummary::default();

    for hash in hashes {
        match recompress_one(store, hash, target, codec, hasher, nar_dir) {
            Ok((old, new)) => {
                debug!("{hash}: {old} -> {new} bytes");
                summary.old_bytes += old;
                summary.new_bytes += new;
                summary.recompressed += 1;
            }
            Err(err) => {
                warn!("recompressing {hash} failed: {err}");
                summary.failed.push((hash.clone(), err.to_string()));
            }
        }
    }

    summary
}

/// Recompress one payload and update its record
///
/// Returns the (old, new) accounted sizes. The re-encoded payload is
/// staged in a temporary file inside the payload subdirectory and only
/// renamed into its final name once hashed and measured.
fn recompress_one(
    store: &NarStore,
    hash: &StoreHash,
    target: CompressionFormat,
    codec: &dyn NarCodec,
    hasher: &dyn ContentHasher,
    nar_dir: &str,
) -> NarkeepResult<(u64, u64)> {
    let mut info = store.read_narinfo(hash)?;
    let current = CompressionFormat::from_tag(&info.compression)?;
    let old_size = accounted_size(&info);

    let nar_path = store.root().join(nar_dir);
    fs::create_dir_all(&nar_path)
        .map_err(|e| NarkeepError::io(format!("creating {}", nar_path.display()), e))?;
    let tmp_path = nar_path.join(format!(".{hash}.tmp"));

    if let Err(err) = reencode(codec, current, target, &store.payload_path(&info.url), &tmp_path)
    {
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    let (url, file_hash, file_size) =
        place_payload(store, &tmp_path, target, hasher, nar_dir, &info.nar_hash)?;

    info.url = url;
    info.compression = target.tag().to_string();
    info.file_hash = file_hash;
    info.file_size = file_size;
    store.write_narinfo(hash, &info)?;

    Ok((old_size, accounted_size(&info)))
}

/// Pipe a payload through decompress(current) → compress(target)
fn reencode(
    codec: &dyn NarCodec,
    current: CompressionFormat,
    target: CompressionFormat,
    src: &Path,
    dst: &Path,
) -> NarkeepResult<()> {
    let src_file = fs::File::open(src)
        .map_err(|e| NarkeepError::io(format!("opening {}", src.display()), e))?;
    let mut decoded = codec.decode(current, Box::new(src_file))?;
    let mut out = fs::File::create(dst)
        .map_err(|e| NarkeepError::io(format!("creating {}", dst.display()), e))?;
    codec.encode(target, &mut *decoded, &mut out)?;
    Ok(())
}

/// Move a staged payload into its content-addressed final name
///
/// For compressed targets the staged file is hashed and measured and the
/// transport fields come back filled; for `none` the payload's identity
/// is the content hash already on the record. Returns the new relative
/// URL plus the transport hash/size fields. The staged file is consumed:
/// renamed on success, removed on failure.
pub(crate) fn place_payload(
    store: &NarStore,
    staged: &Path,
    target: CompressionFormat,
    hasher: &dyn ContentHasher,
    nar_dir: &str,
    nar_hash: &str,
) -> NarkeepResult<(String, Option<String>, Option<u64>)> {
    let result = (|| -> NarkeepResult<(String, Option<String>, Option<u64>)> {
        let (digest, file_hash, file_size) = if target == CompressionFormat::None {
            let digest = nar_hash.split(':').next_back().unwrap_or(nar_hash);
            (digest.to_string(), None, None)
        } else {
            let digest = hasher.hash_file(staged)?;
            let size = fs::metadata(staged)
                .map_err(|e| NarkeepError::io(format!("sizing {}", staged.display()), e))?
                .len();
            let tagged = format!("{}:{digest}", hasher.algo());
            (digest, Some(tagged), Some(size))
        };

        let url = format!("{nar_dir}/{digest}.nar{}", target.extension());
        let final_path = store.payload_path(&url);
        fs::rename(staged, &final_path).map_err(|e| {
            NarkeepError::io(format!("renaming into {}", final_path.display()), e)
        })?;
        Ok((url, file_hash, file_size))
    })();

    if result.is_err() {
        let _ = fs::remove_file(staged);
    }
    result
}
