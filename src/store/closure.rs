//! Closures of narinfo records
//!
//! A closure is an insertion-ordered map from store hash to record.
//! Membership is whatever the caller put in; completing it transitively
//! is [`resolve`].

use crate::error::NarkeepResult;
use crate::store::hash::StoreHash;
use crate::store::narinfo::NarInfo;
use indexmap::IndexMap;
use tracing::{debug, warn};

/// Anything that can produce the record for a store hash
///
/// Implemented by the local store and by the build-source resolver, so
/// closure resolution runs unchanged against either.
pub trait NarInfoSource {
    fn load(&self, hash: &StoreHash) -> NarkeepResult<NarInfo>;
}

/// An insertion-ordered set of records keyed by store hash
///
/// Keys are valid by construction ([`StoreHash`] validates on creation),
/// so every member of a closure is a well-formed entry.
#[derive(Debug, Clone, Default)]
pub struct Closure {
    members: IndexMap<StoreHash, NarInfo>,
}

impl Closure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, hash: StoreHash, info: NarInfo) -> Option<NarInfo> {
        self.members.insert(hash, info)
    }

    pub fn get(&self, hash: &StoreHash) -> Option<&NarInfo> {
        self.members.get(hash)
    }

    pub fn contains(&self, hash: &StoreHash) -> bool {
        self.members.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&StoreHash, &NarInfo)> {
        self.members.iter()
    }

    /// Member hashes in insertion order
    pub fn hashes(&self) -> impl Iterator<Item = &StoreHash> {
        self.members.keys()
    }

    /// Hashes referenced by members but not themselves members
    ///
    /// A non-empty result means the closure was not fully resolved, or
    /// that records were filtered out of it.
    pub fn missing_references(&self) -> Vec<StoreHash> {
        let mut missing = Vec::new();
        for (_, info) in self.iter() {
            for name in &info.references {
                match StoreHash::from_name(name) {
                    Ok(hash) => {
                        if !self.contains(&hash) && !missing.contains(&hash) {
                            missing.push(hash);
                        }
                    }
                    Err(err) => warn!("unusable reference {name}: {err}"),
                }
            }
        }
        missing
    }
}

/// Resolve the closure of `root` by following references
///
/// Worklist traversal with the accumulating closure as the visited set:
/// cycles terminate, self references are ignored, and a record that
/// cannot be read is skipped rather than failing the resolution.
pub fn resolve(root: StoreHash, source: &dyn NarInfoSource) -> Closure {
    let mut closure = Closure::new();
    let mut work = vec![root];

    while let Some(hash) = work.pop() {
        if closure.contains(&hash) {
            continue;
        }
        let info = match source.load(&hash) {
            Ok(info) => info,
            Err(err) => {
                debug!("skipping {hash}: {err}");
                continue;
            }
        };
        for name in &info.references {
            match StoreHash::from_name(name) {
                Ok(reference) => {
                    if reference != hash && !closure.contains(&reference) {
                        work.push(reference);
                    }
                }
                Err(err) => warn!("skipping reference {name} of {hash}: {err}"),
            }
        }
        closure.insert(hash, info);
    }

    closure
}

/// Read exactly the given hashes, without following references
///
/// Hashes whose record cannot be read are dropped with a warning.
pub fn from_hashes(hashes: &[StoreHash], source: &dyn NarInfoSource) -> Closure {
    let mut closure = Closure::new();
    for hash in hashes {
        match source.load(hash) {
            Ok(info) => {
                closure.insert(hash.clone(), info);
            }
            Err(err) => warn!("{hash} not found in nar store: {err}"),
        }
    }
    closure
}
