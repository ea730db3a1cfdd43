//! Store path hashes
//!
//! Every artifact is identified by the 32-character base-32 token that
//! prefixes its store path name.

use crate::error::{NarkeepError, NarkeepResult};
use std::fmt;
use std::str::FromStr;

/// Length of the hash part of a store path name
pub const HASH_LEN: usize = 32;

/// Alphabet of store path hashes (base-32 without e, o, t, u)
const HASH_ALPHABET: &[u8] = b"0123456789abcdfghijklmnpqrsvwxyz";

/// A validated store path hash
///
/// Construction goes through [`StoreHash::new`] or
/// [`StoreHash::from_name`], so any value of this type is a well-formed
/// map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StoreHash(String);

impl StoreHash {
    /// Validate `s` as a bare store path hash
    pub fn new(s: &str) -> NarkeepResult<Self> {
        if s.len() == HASH_LEN && s.bytes().all(|b| HASH_ALPHABET.contains(&b)) {
            Ok(Self(s.to_string()))
        } else {
            Err(NarkeepError::InvalidStoreHash(s.to_string()))
        }
    }

    /// Derive the hash from a store path name
    ///
    /// Takes the last path segment and truncates it to the hash length, so
    /// `/nix/store/<hash>-pkg-1.0`, `<hash>-pkg-1.0` and `<hash>.narinfo`
    /// all resolve to the same hash.
    pub fn from_name(name: &str) -> NarkeepResult<Self> {
        let base = name.rsplit('/').next().unwrap_or(name);
        let token = base
            .get(..HASH_LEN)
            .ok_or_else(|| NarkeepError::InvalidStoreHash(base.to_string()))?;
        Self::new(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StoreHash {
    type Err = NarkeepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
