//! Ingest from the build source
//!
//! Pulls a closure out of the external build system and copies its
//! payloads and records into a local store. Copying is idempotent:
//! records already in the store are skipped, so re-running the same
//! closure copies nothing further.

use crate::compress::place_payload;
use crate::error::{NarkeepError, NarkeepResult};
use crate::services::codec::NarCodec;
use crate::services::hasher::ContentHasher;
use crate::services::nix::BuildSource;
use crate::store::closure::{self, Closure, NarInfoSource};
use crate::store::hash::StoreHash;
use crate::store::local::NarStore;
use crate::store::narinfo::{CompressionFormat, NarInfo};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use tracing::{debug, warn};

/// Outcome of a copy batch
#[derive(Debug, Default)]
pub struct CopySummary {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    pub copied_hashes: Vec<StoreHash>,
}

/// Record source over a [`BuildSource`]
///
/// The build source is queried by store path name, while closure
/// resolution works on hashes; the resolver remembers the name every
/// reference was first seen under.
struct SourceResolver<'a> {
    source: &'a dyn BuildSource,
    names: RefCell<HashMap<StoreHash, String>>,
}

impl NarInfoSource for SourceResolver<'_> {
    fn load(&self, hash: &StoreHash) -> NarkeepResult<NarInfo> {
        let name = self
            .names
            .borrow()
            .get(hash)
            .cloned()
            .ok_or_else(|| NarkeepError::SourceQuery {
                path: hash.to_string(),
                reason: "no known store path for hash".to_string(),
            })?;
        let info = self.source.query(&name)?;

        let mut names = self.names.borrow_mut();
        for reference in &info.references {
            if let Ok(hash) = StoreHash::from_name(reference) {
                names.entry(hash).or_insert_with(|| reference.clone());
            }
        }
        Ok(info)
    }
}

/// Resolve the closure of `target` against the build source
pub fn closure_from_source(source: &dyn BuildSource, target: &str) -> NarkeepResult<Closure> {
    let root_info = source.query(target)?;
    let root = StoreHash::from_name(&root_info.store_path)?;
    let resolver = SourceResolver {
        source,
        names: RefCell::new(HashMap::from([(root.clone(), root_info.store_path)])),
    };
    Ok(closure::resolve(root, &resolver))
}

/// Copy `closure` members into `store`
///
/// Members already present (by record file) and members of `skip` are
/// counted as skipped. Each copied member streams its raw payload from
/// the source, applies `target` compression, and lands record and
/// payload atomically. Failures are warnings and counted.
#[allow(clippy::too_many_arguments)]
pub fn copy_closure(
    store: &NarStore,
    source: &dyn BuildSource,
    closure: &Closure,
    target: CompressionFormat,
    codec: &dyn NarCodec,
    hasher: &dyn ContentHasher,
    nar_dir: &str,
    skip: &HashSet<StoreHash>,
) -> CopySummary {
    let mut summary = CopySummary::default();

    for (hash, info) in closure.iter() {
        if store.narinfo_path(hash).is_file() {
            debug!("{hash} already in store");
            summary.skipped += 1;
            continue;
        }
        if skip.contains(hash) {
            debug!("{hash} available in a remote cache");
            summary.skipped += 1;
            continue;
        }
        match copy_one(store, source, hash, info, target, codec, hasher, nar_dir) {
            Ok(()) => {
                summary.copied += 1;
                summary.copied_hashes.push(hash.clone());
            }
            Err(err) => {
                warn!("copying {hash} failed: {err}");
                summary.failed += 1;
            }
        }
    }

    summary
}

#[allow(clippy::too_many_arguments)]
fn copy_one(
    store: &NarStore,
    source: &dyn BuildSource,
    hash: &StoreHash,
    info: &NarInfo,
    target: CompressionFormat,
    codec: &dyn NarCodec,
    hasher: &dyn ContentHasher,
    nar_dir: &str,
) -> NarkeepResult<()> {
    let nar_path = store.root().join(nar_dir);
    fs::create_dir_all(&nar_path)
        .map_err(|e| NarkeepError::io(format!("creating {}", nar_path.display()), e))?;

    // Stage the raw payload first; the source always hands it over
    // uncompressed.
    let raw_path = nar_path.join(format!(".{hash}.raw.tmp"));
    let dumped = (|| {
        let mut out = fs::File::create(&raw_path)
            .map_err(|e| NarkeepError::io(format!("creating {}", raw_path.display()), e))?;
        source.dump(&info.store_path, &mut out)
    })();
    if let Err(err) = dumped {
        let _ = fs::remove_file(&raw_path);
        return Err(err);
    }

    let mut info = info.clone();

    let staged = if target == CompressionFormat::None {
        raw_path
    } else {
        let enc_path = nar_path.join(format!(".{hash}.tmp"));
        let encoded = (|| {
            let mut src = fs::File::open(&raw_path)
                .map_err(|e| NarkeepError::io(format!("opening {}", raw_path.display()), e))?;
            let mut dst = fs::File::create(&enc_path)
                .map_err(|e| NarkeepError::io(format!("creating {}", enc_path.display()), e))?;
            codec.encode(target, &mut src, &mut dst)
        })();
        let _ = fs::remove_file(&raw_path);
        if let Err(err) = encoded {
            let _ = fs::remove_file(&enc_path);
            return Err(err);
        }
        enc_path
    };

    let (url, file_hash, file_size) =
        place_payload(store, &staged, target, hasher, nar_dir, &info.nar_hash)?;

    info.url = url;
    info.compression = target.tag().to_string();
    info.file_hash = file_hash;
    info.file_size = file_size;
    store.write_narinfo(hash, &info)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::codec::StreamCodec;
    use crate::services::hasher::Sha256Hasher;
    use crate::store::local::DEFAULT_NAR_DIR;
    use std::io::Write;
    use tempfile::TempDir;

    const A: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    const C: &str = "cccccccccccccccccccccccccccccccc";

    fn h(s: &str) -> StoreHash {
        StoreHash::new(s).unwrap()
    }

    fn name(hash: &str) -> String {
        format!("/nix/store/{hash}-pkg")
    }

    /// In-memory build source: store path name → (record, payload bytes)
    struct FakeSource(HashMap<String, (NarInfo, Vec<u8>)>);

    impl FakeSource {
        fn new(entries: &[(&str, &[&str], &[u8])]) -> Self {
            let mut map = HashMap::new();
            for (hash, refs, payload) in entries {
                let info = NarInfo {
                    store_path: name(hash),
                    nar_hash: format!("sha256:{hash}"),
                    nar_size: payload.len() as u64,
                    compression: "none".to_string(),
                    references: refs.iter().map(|r| name(r)).collect(),
                    ..NarInfo::default()
                };
                map.insert(name(hash), (info, payload.to_vec()));
            }
            Self(map)
        }
    }

    impl BuildSource for FakeSource {
        fn query(&self, store_path: &str) -> NarkeepResult<NarInfo> {
            self.0
                .get(store_path)
                .map(|(info, _)| info.clone())
                .ok_or_else(|| NarkeepError::SourceQuery {
                    path: store_path.to_string(),
                    reason: "unknown path".to_string(),
                })
        }

        fn dump(&self, store_path: &str, dst: &mut dyn Write) -> NarkeepResult<u64> {
            let (_, payload) =
                self.0
                    .get(store_path)
                    .ok_or_else(|| NarkeepError::SourceQuery {
                        path: store_path.to_string(),
                        reason: "unknown path".to_string(),
                    })?;
            dst.write_all(payload)
                .map_err(|e| NarkeepError::io("writing payload", e))?;
            Ok(payload.len() as u64)
        }
    }

    fn copy(
        store: &NarStore,
        source: &FakeSource,
        closure: &Closure,
        target: CompressionFormat,
        skip: &HashSet<StoreHash>,
    ) -> CopySummary {
        copy_closure(
            store,
            source,
            closure,
            target,
            &StreamCodec::default(),
            &Sha256Hasher,
            DEFAULT_NAR_DIR,
            skip,
        )
    }

    #[test]
    fn resolves_closure_from_source() {
        let source = FakeSource::new(&[
            (A, &[B], b"payload a"),
            (B, &[C], b"payload b"),
            (C, &[], b"payload c"),
        ]);
        let closure = closure_from_source(&source, &name(A)).unwrap();
        assert_eq!(closure.len(), 3);
        assert_eq!(closure.hashes().next().unwrap(), &h(A));
    }

    #[test]
    fn unknown_root_is_fatal() {
        let source = FakeSource::new(&[]);
        assert!(closure_from_source(&source, &name(A)).is_err());
    }

    #[test]
    fn copies_whole_closure_uncompressed() {
        let source = FakeSource::new(&[(A, &[B], b"payload a"), (B, &[], b"payload b")]);
        let closure = closure_from_source(&source, &name(A)).unwrap();

        let dir = TempDir::new().unwrap();
        let store = NarStore::open(dir.path()).unwrap();
        let summary = copy(
            &store,
            &source,
            &closure,
            CompressionFormat::None,
            &HashSet::new(),
        );
        assert_eq!(summary.copied, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.failed, 0);

        let info = store.read_narinfo(&h(A)).unwrap();
        assert_eq!(info.compression, "none");
        assert!(info.file_hash.is_none());
        assert_eq!(
            fs::read(store.payload_path(&info.url)).unwrap(),
            b"payload a"
        );
    }

    #[test]
    fn copies_with_compression() {
        let source = FakeSource::new(&[(A, &[], b"payload a payload a payload a")]);
        let closure = closure_from_source(&source, &name(A)).unwrap();

        let dir = TempDir::new().unwrap();
        let store = NarStore::open(dir.path()).unwrap();
        copy(
            &store,
            &source,
            &closure,
            CompressionFormat::Zstd,
            &HashSet::new(),
        );

        let info = store.read_narinfo(&h(A)).unwrap();
        assert_eq!(info.compression, "zstd");
        assert!(info.url.ends_with(".nar.zstd"));
        assert!(info.file_hash.is_some());
        let on_disk = fs::metadata(store.payload_path(&info.url)).unwrap().len();
        assert_eq!(info.file_size, Some(on_disk));
    }

    #[test]
    fn second_copy_is_a_no_op() {
        let source = FakeSource::new(&[(A, &[B], b"a"), (B, &[], b"b")]);
        let closure = closure_from_source(&source, &name(A)).unwrap();

        let dir = TempDir::new().unwrap();
        let store = NarStore::open(dir.path()).unwrap();
        let first = copy(
            &store,
            &source,
            &closure,
            CompressionFormat::None,
            &HashSet::new(),
        );
        assert_eq!(first.copied, 2);

        let second = copy(
            &store,
            &source,
            &closure,
            CompressionFormat::None,
            &HashSet::new(),
        );
        assert_eq!(second.copied, 0);
        assert_eq!(second.skipped, 2);
    }

    #[test]
    fn skip_set_suppresses_copies() {
        let source = FakeSource::new(&[(A, &[B], b"a"), (B, &[], b"b")]);
        let closure = closure_from_source(&source, &name(A)).unwrap();

        let dir = TempDir::new().unwrap();
        let store = NarStore::open(dir.path()).unwrap();
        let summary = copy(
            &store,
            &source,
            &closure,
            CompressionFormat::None,
            &HashSet::from([h(B)]),
        );
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.copied_hashes, [h(A)]);
        assert!(store.read_narinfo(&h(B)).is_err());
    }

    #[test]
    fn failed_dump_is_isolated() {
        let mut source = FakeSource::new(&[(A, &[B], b"a"), (B, &[], b"b")]);
        // B's record resolves but its payload is gone from the source
        let b_info = source.0.get(&name(B)).unwrap().0.clone();
        source.0.remove(&name(B));
        let mut closure = Closure::new();
        closure.insert(h(A), source.0.get(&name(A)).unwrap().0.clone());
        closure.insert(h(B), b_info);

        let dir = TempDir::new().unwrap();
        let store = NarStore::open(dir.path()).unwrap();
        let summary = copy(
            &store,
            &source,
            &closure,
            CompressionFormat::None,
            &HashSet::new(),
        );
        assert_eq!(summary.copied, 1);
        assert_eq!(summary.failed, 1);
        assert!(store.read_narinfo(&h(A)).is_ok());
        assert!(store.read_narinfo(&h(B)).is_err());
    }
}
