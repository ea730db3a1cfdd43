//! The nix build source
//!
//! Wraps the local nix installation: metadata through
//! `nix path-info --json`, raw NAR bytes through `nix-store --dump`.

use crate::error::{NarkeepError, NarkeepResult};
use crate::services::hasher::to_nix_base32;
use crate::store::narinfo::NarInfo;
use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde_json::Value;
use std::io::{self, Write};
use std::process::{Command, Stdio};
use tracing::debug;

/// Metadata and payload access to the system that built the artifacts
pub trait BuildSource: Send + Sync {
    /// Query the record for a store path name
    fn query(&self, store_path: &str) -> NarkeepResult<NarInfo>;

    /// Stream the raw uncompressed payload into `dst`, returning its size
    fn dump(&self, store_path: &str, dst: &mut dyn Write) -> NarkeepResult<u64>;
}

/// Build source backed by the local nix installation
pub struct NixCli;

impl NixCli {
    fn source_err(path: &str, reason: impl Into<String>) -> NarkeepError {
        NarkeepError::SourceQuery {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl BuildSource for NixCli {
    fn query(&self, store_path: &str) -> NarkeepResult<NarInfo> {
        debug!("querying nix path-info for {store_path}");
        let output = Command::new("nix")
            .args(["path-info", "--json", store_path])
            .output()
            .map_err(|e| Self::source_err(store_path, format!("running nix path-info: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::source_err(
                store_path,
                format!("nix path-info failed: {}", stderr.trim()),
            ));
        }

        let value: Value = serde_json::from_slice(&output.stdout)?;
        let entry = path_info_entry(&value, store_path)
            .ok_or_else(|| Self::source_err(store_path, "no path info in nix output"))?;
        parse_path_info(store_path, entry)
    }

    fn dump(&self, store_path: &str, dst: &mut dyn Write) -> NarkeepResult<u64> {
        debug!("dumping {store_path}");
        let mut child = Command::new("nix-store")
            .args(["--dump", store_path])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Self::source_err(store_path, format!("running nix-store --dump: {e}")))?;
        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Self::source_err(store_path, "no stdout from nix-store"))?;

        let copied = io::copy(&mut stdout, dst)
            .map_err(|e| NarkeepError::io(format!("streaming payload of {store_path}"), e))?;

        let status = child
            .wait()
            .map_err(|e| Self::source_err(store_path, format!("waiting for nix-store: {e}")))?;
        if !status.success() {
            return Err(Self::source_err(
                store_path,
                format!("nix-store --dump exited with {status}"),
            ));
        }
        Ok(copied)
    }
}

/// Locate the entry for `store_path` in either JSON shape nix emits: an
/// array of objects with a `path` field, or a map keyed by store path.
fn path_info_entry<'a>(value: &'a Value, store_path: &str) -> Option<&'a Value> {
    match value {
        Value::Array(items) => items
            .iter()
            .find(|item| item.get("path").and_then(Value::as_str) == Some(store_path))
            .or_else(|| items.first()),
        Value::Object(map) => map.get(store_path).or_else(|| map.values().next()),
        _ => None,
    }
}

fn parse_path_info(store_path: &str, entry: &Value) -> NarkeepResult<NarInfo> {
    let nar_hash = entry
        .get("narHash")
        .and_then(Value::as_str)
        .ok_or_else(|| NixCli::source_err(store_path, "missing narHash"))?;
    let path = entry
        .get("path")
        .and_then(Value::as_str)
        .unwrap_or(store_path);

    Ok(NarInfo {
        store_path: path.to_string(),
        // Assigned once the payload lands in a store
        url: String::new(),
        nar_hash: normalize_hash(nar_hash),
        nar_size: entry.get("narSize").and_then(Value::as_u64).unwrap_or(0),
        compression: "none".to_string(),
        file_hash: None,
        file_size: None,
        sigs: string_list(entry.get("signatures")),
        references: string_list(entry.get("references")),
        deriver: entry.get("deriver").and_then(Value::as_str).map(str::to_string),
        system: None,
        ca: entry.get("ca").and_then(Value::as_str).map(str::to_string),
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Convert an SRI `sha256-<base64>` hash to the `sha256:<base32>` form
/// records carry; already-tagged hashes pass through unchanged.
fn normalize_hash(hash: &str) -> String {
    if hash.contains(':') {
        return hash.to_string();
    }
    if let Some((algo, b64)) = hash.split_once('-') {
        if let Ok(bytes) = BASE64_STANDARD.decode(b64) {
            return format!("{algo}:{}", to_nix_base32(&bytes));
        }
    }
    hash.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PATH: &str = "/nix/store/aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa-hello-2.12.1";

    #[test]
    fn entry_from_array_shape() {
        let value = json!([{"path": PATH, "narHash": "sha256:abcd", "narSize": 7}]);
        let entry = path_info_entry(&value, PATH).unwrap();
        assert_eq!(entry.get("narSize").unwrap(), 7);
    }

    #[test]
    fn entry_from_object_shape() {
        let value = json!({PATH: {"narHash": "sha256:abcd", "narSize": 7}});
        let entry = path_info_entry(&value, PATH).unwrap();
        assert_eq!(entry.get("narSize").unwrap(), 7);
    }

    #[test]
    fn entry_missing() {
        assert!(path_info_entry(&json!(null), PATH).is_none());
        assert!(path_info_entry(&json!([]), PATH).is_none());
    }

    #[test]
    fn parses_full_entry() {
        let entry = json!({
            "path": PATH,
            "narHash": "sha256:1p55yzpddhkxkadadvrbhl1qqfcgzv9fcfcdxnc39m2mgbd7cf8c",
            "narSize": 226560,
            "references": ["/nix/store/bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb-glibc-2.38"],
            "signatures": ["cache.example.org-1:sig"],
            "deriver": "/nix/store/cccccccccccccccccccccccccccccccc-hello.drv",
        });
        let info = parse_path_info(PATH, &entry).unwrap();
        assert_eq!(info.store_path, PATH);
        assert_eq!(info.nar_size, 226560);
        assert_eq!(info.compression, "none");
        assert_eq!(info.references.len(), 1);
        assert_eq!(info.sigs.len(), 1);
        assert!(info.deriver.is_some());
        assert!(info.url.is_empty());
        assert!(info.file_hash.is_none());
    }

    #[test]
    fn missing_nar_hash_is_an_error() {
        assert!(parse_path_info(PATH, &json!({"narSize": 1})).is_err());
    }

    #[test]
    fn normalizes_sri_hashes() {
        // base64 "/w==" decodes to [0xff], which is "7z" in nix base-32
        assert_eq!(normalize_hash("sha256-/w=="), "sha256:7z");
    }

    #[test]
    fn tagged_hashes_pass_through() {
        assert_eq!(normalize_hash("sha256:abcd"), "sha256:abcd");
    }
}
