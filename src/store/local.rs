//! The on-disk NAR store
//!
//! A store directory holds one `<hash>.narinfo` per artifact next to a
//! payload subdirectory of NAR files.

use crate::error::{NarkeepError, NarkeepResult};
use crate::store::closure::{Closure, NarInfoSource};
use crate::store::hash::StoreHash;
use crate::store::narinfo::NarInfo;
use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File extension of record files
pub const NARINFO_EXT: &str = "narinfo";

/// Default payload subdirectory
pub const DEFAULT_NAR_DIR: &str = "nar";

/// Snapshot of every record in a store
///
/// `by_url` is the reverse index from payload path to the hashes whose
/// records point at it. A snapshot is not refreshed by later writes;
/// re-enumerate when freshness matters.
#[derive(Debug, Default)]
pub struct StoreIndex {
    pub by_hash: Closure,
    pub by_url: HashMap<String, BTreeSet<StoreHash>>,
}

/// A directory-based NAR store
#[derive(Debug, Clone)]
pub struct NarStore {
    root: PathBuf,
}

impl NarStore {
    /// Open an existing store directory
    pub fn open(root: impl Into<PathBuf>) -> NarkeepResult<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(NarkeepError::StoreDirInvalid(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record file for `hash`
    pub fn narinfo_path(&self, hash: &StoreHash) -> PathBuf {
        self.root.join(format!("{hash}.{NARINFO_EXT}"))
    }

    /// Absolute path of a store-relative payload path
    pub fn payload_path(&self, url: &str) -> PathBuf {
        self.root.join(url)
    }

    /// Read and parse the record for `hash`
    pub fn read_narinfo(&self, hash: &StoreHash) -> NarkeepResult<NarInfo> {
        let path = self.narinfo_path(hash);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(NarkeepError::NarInfoNotFound {
                    hash: hash.to_string(),
                })
            }
            Err(err) => {
                return Err(NarkeepError::io(format!("reading {}", path.display()), err))
            }
        };
        Ok(NarInfo::parse(&text))
    }

    /// Serialize and write the record for `hash`
    pub fn write_narinfo(&self, hash: &StoreHash, info: &NarInfo) -> NarkeepResult<()> {
        self.write_narinfo_text(hash, &info.to_text())
    }

    /// Write record text atomically
    ///
    /// The text lands in a temporary file in the store root and is renamed
    /// over the final name, so concurrent readers never see a partial
    /// record.
    pub fn write_narinfo_text(&self, hash: &StoreHash, text: &str) -> NarkeepResult<()> {
        let final_path = self.narinfo_path(hash);
        let tmp_path = self.root.join(format!(".{hash}.{NARINFO_EXT}.tmp"));
        fs::write(&tmp_path, text)
            .map_err(|e| NarkeepError::io(format!("writing {}", tmp_path.display()), e))?;
        fs::rename(&tmp_path, &final_path).map_err(|e| {
            NarkeepError::io(format!("renaming into {}", final_path.display()), e)
        })?;
        Ok(())
    }

    /// Read every record in the store and build the reverse index
    pub fn enumerate(&self) -> NarkeepResult<StoreIndex> {
        let mut index = StoreIndex::default();

        let entries = fs::read_dir(&self.root)
            .map_err(|e| NarkeepError::io(format!("listing {}", self.root.display()), e))?;
        for entry in entries {
            let entry = entry
                .map_err(|e| NarkeepError::io(format!("listing {}", self.root.display()), e))?;
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(NARINFO_EXT)
            {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let hash = match StoreHash::from_name(name) {
                Ok(hash) => hash,
                Err(err) => {
                    warn!("ignoring {}: {err}", path.display());
                    continue;
                }
            };
            match self.read_narinfo(&hash) {
                Ok(info) => {
                    index
                        .by_url
                        .entry(info.url.clone())
                        .or_default()
                        .insert(hash.clone());
                    index.by_hash.insert(hash, info);
                }
                Err(err) => warn!("ignoring {}: {err}", path.display()),
            }
        }

        Ok(index)
    }

    /// Payload files under `nar_dir` that no record points at
    pub fn find_orphaned_nars(
        &self,
        index: &StoreIndex,
        nar_dir: &str,
    ) -> NarkeepResult<Vec<PathBuf>> {
        let nar_path = self.root.join(nar_dir);
        if !nar_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut orphans = Vec::new();
        let entries = fs::read_dir(&nar_path)
            .map_err(|e| NarkeepError::io(format!("listing {}", nar_path.display()), e))?;
        for entry in entries {
            let entry = entry
                .map_err(|e| NarkeepError::io(format!("listing {}", nar_path.display()), e))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let url = format!("{nar_dir}/{name}");
            if !index.by_url.contains_key(&url) {
                orphans.push(path);
            }
        }
        orphans.sort();

        Ok(orphans)
    }

    /// Record files whose payload does not exist on disk
    ///
    /// The converse of [`NarStore::find_orphaned_nars`]: records pointing
    /// at nothing instead of payloads with no pointer.
    pub fn find_orphaned_narinfos(&self, closure: &Closure) -> Vec<PathBuf> {
        let mut orphans = Vec::new();
        for (hash, info) in closure.iter() {
            if !self.payload_path(&info.url).is_file() {
                orphans.push(self.narinfo_path(hash));
            }
        }
        orphans
    }

    /// Check that every member's payload file exists
    ///
    /// Presence only; sizes are not compared.
    pub fn verify(&self, closure: &Closure) -> bool {
        let mut complete = true;
        for (_, info) in closure.iter() {
            if !self.payload_path(&info.url).is_file() {
                warn!("{} is missing", info.url);
                complete = false;
            }
        }
        complete
    }

    /// Record and payload paths of every member, in closure order
    ///
    /// The manifest used to hand a closure to an external transfer tool.
    pub fn closure_files(&self, closure: &Closure, relative: bool) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for (hash, info) in closure.iter() {
            if relative {
                files.push(PathBuf::from(format!("{hash}.{NARINFO_EXT}")));
                files.push(PathBuf::from(&info.url));
            } else {
                files.push(self.narinfo_path(hash));
                files.push(self.payload_path(&info.url));
            }
        }
        files
    }
}

impl NarInfoSource for NarStore {
    fn load(&self, hash: &StoreHash) -> NarkeepResult<NarInfo> {
        self.read_narinfo(hash)
    }
}
