//! Content hashing
//!
//! Payload digests are SHA-256 rendered in the Nix base-32 alphabet, the
//! encoding record hash fields and payload file names carry.

use crate::error::{NarkeepError, NarkeepResult};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Digest provider for payload files
pub trait ContentHasher: Send + Sync {
    /// Algorithm tag carried in record hash fields
    fn algo(&self) -> &'static str;

    /// Base-32 digest of the file contents
    fn hash_file(&self, path: &Path) -> NarkeepResult<String>;
}

/// Streaming SHA-256 hasher
pub struct Sha256Hasher;

impl ContentHasher for Sha256Hasher {
    fn algo(&self) -> &'static str {
        "sha256"
    }

    fn hash_file(&self, path: &Path) -> NarkeepResult<String> {
        let mut file = File::open(path)
            .map_err(|e| NarkeepError::io(format!("opening {}", path.display()), e))?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];
        loop {
            let read = file
                .read(&mut buf)
                .map_err(|e| NarkeepError::io(format!("reading {}", path.display()), e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }
        Ok(to_nix_base32(&hasher.finalize()))
    }
}

/// Alphabet of the Nix base-32 encoding (no e, o, t, u)
const BASE32_CHARS: &[u8] = b"0123456789abcdfghijklmnpqrsvwxyz";

/// Encode bytes the way Nix prints hashes: base-32, lowest bits first
pub fn to_nix_base32(bytes: &[u8]) -> String {
    let len = (bytes.len() * 8).div_ceil(5);
    let mut out = String::with_capacity(len);
    for n in (0..len).rev() {
        let bit = n * 5;
        let i = bit / 8;
        let j = bit % 8;
        let mut c = (bytes[i] as u16) >> j;
        if i + 1 < bytes.len() {
            c |= (bytes[i + 1] as u16) << (8 - j);
        }
        out.push(BASE32_CHARS[(c & 0x1f) as usize] as char);
    }
    out
}
