//! The .narinfo record format
//!
//! One record per artifact: payload location, hashes, sizes, compression,
//! signatures and dependency references. The text encoding is
//! line-oriented `Key: Value`.

use crate::error::{NarkeepError, NarkeepResult};
use std::fmt;

/// Metadata record for one artifact
///
/// The store hash is not part of the record body; it is the file name of
/// the record and the key under which the record lives in a closure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NarInfo {
    /// Canonical store path, informational only
    pub store_path: String,
    /// Payload path relative to the store root; changes on recompression
    pub url: String,
    /// Tagged hash of the uncompressed payload, immutable once ingested
    pub nar_hash: String,
    /// Uncompressed payload size in bytes, immutable once ingested
    pub nar_size: u64,
    /// Compression tag; unknown tags survive parsing and fail at the
    /// codec boundary
    pub compression: String,
    /// Tagged hash of the compressed payload; absent when uncompressed
    pub file_hash: Option<String>,
    /// Compressed payload size in bytes; absent when uncompressed
    pub file_size: Option<u64>,
    /// Signatures, in input order
    pub sigs: Vec<String>,
    /// Reference names of the dependencies
    pub references: Vec<String>,
    /// Name of the derivation that produced this artifact
    pub deriver: Option<String>,
    /// Platform tag
    pub system: Option<String>,
    /// Content-addressing tag
    pub ca: Option<String>,
}

impl NarInfo {
    /// Parse narinfo text
    ///
    /// Lines that do not split into `Key: Value` are skipped and unknown
    /// keys are ignored, so records from newer producers stay readable.
    pub fn parse(text: &str) -> Self {
        let mut info = Self::default();

        for line in text.lines() {
            let Some((key, value)) = line.split_once(": ") else {
                continue;
            };
            let value = value.trim();

            match key {
                "StorePath" => info.store_path = value.to_string(),
                "URL" => info.url = value.to_string(),
                "NarHash" => info.nar_hash = value.to_string(),
                "NarSize" => {
                    if let Ok(size) = value.parse() {
                        info.nar_size = size;
                    }
                }
                "Compression" => info.compression = value.to_string(),
                "FileHash" => info.file_hash = Some(value.to_string()),
                "FileSize" => {
                    if let Ok(size) = value.parse() {
                        info.file_size = Some(size);
                    }
                }
                "Sig" => info.sigs.push(value.to_string()),
                "References" => {
                    let mut refs: Vec<String> =
                        value.split(' ').map(str::to_string).collect();
                    // A trailing space leaves one empty token behind
                    if refs.last().is_some_and(String::is_empty) {
                        refs.pop();
                    }
                    info.references = refs;
                }
                "Deriver" => info.deriver = Some(value.to_string()),
                "System" => info.system = Some(value.to_string()),
                "CA" => info.ca = Some(value.to_string()),
                _ => {}
            }
        }

        info
    }

    /// Serialize in the canonical field order
    ///
    /// Empty and absent fields are omitted entirely; signatures get one
    /// line each, references a single space-joined line.
    pub fn to_text(&self) -> String {
        let mut out = String::new();

        push_field(&mut out, "StorePath", &self.store_path);
        push_field(&mut out, "URL", &self.url);
        push_field(&mut out, "NarHash", &self.nar_hash);
        if self.nar_size > 0 {
            out.push_str(&format!("NarSize: {}\n", self.nar_size));
        }
        push_field(&mut out, "Compression", &self.compression);
        if let Some(ref file_hash) = self.file_hash {
            push_field(&mut out, "FileHash", file_hash);
        }
        if let Some(file_size) = self.file_size {
            out.push_str(&format!("FileSize: {file_size}\n"));
        }
        if let Some(ref deriver) = self.deriver {
            push_field(&mut out, "Deriver", deriver);
        }
        if let Some(ref system) = self.system {
            push_field(&mut out, "System", system);
        }
        if let Some(ref ca) = self.ca {
            push_field(&mut out, "CA", ca);
        }
        for sig in &self.sigs {
            push_field(&mut out, "Sig", sig);
        }
        if !self.references.is_empty() {
            out.push_str(&format!("References: {}\n", self.references.join(" ")));
        }

        out
    }

    /// Whether this record is a fixed-output leaf of the dependency graph
    pub fn is_fixed_output(&self) -> bool {
        self.references.is_empty() && self.deriver.is_none()
    }
}

fn push_field(out: &mut String, key: &str, value: &str) {
    if !value.is_empty() {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(value);
        out.push('\n');
    }
}

/// Supported payload compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    None,
    Xz,
    Zstd,
}

impl CompressionFormat {
    /// Parse a record or command-line compression tag
    pub fn from_tag(tag: &str) -> NarkeepResult<Self> {
        match tag {
            "" | "none" => Ok(Self::None),
            "xz" => Ok(Self::Xz),
            "zstd" => Ok(Self::Zstd),
            other => Err(NarkeepError::UnsupportedCompression(other.to_string())),
        }
    }

    /// Tag carried in the record's Compression field
    pub fn tag(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }

    /// File name suffix appended after `.nar`
    pub fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            Self::Xz => ".xz",
            Self::Zstd => ".zstd",
        }
    }
}

impl fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NarInfo {
        NarInfo {
            store_path: "/nix/store/s66mzxpvicwk07gjbjfw9izjfa797vsw-hello-2.12.1".to_string(),
            url: "nar/1bn7c3bf8vzqjy190ydwlg9vjd9ypjp2vgsm2mnmsqdk40g20hl7.nar.xz".to_string(),
            nar_hash: "sha256:1p55yzpddhkxkadadvrbhl1qqfcgzv9fcfcdxnc39m2mgbd7cf8c".to_string(),
            nar_size: 226560,
            compression: "xz".to_string(),
            file_hash: Some(
                "sha256:1bn7c3bf8vzqjy190ydwlg9vjd9ypjp2vgsm2mnmsqdk40g20hl7".to_string(),
            ),
            file_size: Some(50160),
            sigs: vec![
                "cache.nixos.org-1:nhnC8yWSKgAljmcNBoEcUhx3gLJZ3EC9wRcJNvtCCAs=".to_string(),
            ],
            references: vec![
                "j5p0j1w27aqdzncpw73k95byvhh5prw2-glibc-2.38".to_string(),
                "s66mzxpvicwk07gjbjfw9izjfa797vsw-hello-2.12.1".to_string(),
            ],
            deriver: Some("iw7vnckm5wl1vs9cv18qbw02282rkbnk-hello-2.12.1.drv".to_string()),
            system: Some("x86_64-linux".to_string()),
            ca: None,
        }
    }

    #[test]
    fn round_trip() {
        let info = sample();
        assert_eq!(NarInfo::parse(&info.to_text()), info);
    }

    #[test]
    fn round_trip_minimal() {
        let info = NarInfo {
            store_path: "/nix/store/aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa-a".to_string(),
            url: "nar/a.nar".to_string(),
            nar_hash: "sha256:aaaa".to_string(),
            nar_size: 10,
            compression: "none".to_string(),
            ..NarInfo::default()
        };
        assert_eq!(NarInfo::parse(&info.to_text()), info);
    }

    #[test]
    fn serialize_field_order() {
        let text = sample().to_text();
        let keys: Vec<&str> = text
            .lines()
            .filter_map(|line| line.split_once(": ").map(|(k, _)| k))
            .collect();
        assert_eq!(
            keys,
            [
                "StorePath",
                "URL",
                "NarHash",
                "NarSize",
                "Compression",
                "FileHash",
                "FileSize",
                "Deriver",
                "System",
                "Sig",
                "References",
            ]
        );
    }

    #[test]
    fn serialize_omits_absent_fields() {
        let mut info = sample();
        info.file_hash = None;
        info.file_size = None;
        info.sigs.clear();
        info.references.clear();
        let text = info.to_text();
        assert!(!text.contains("FileHash"));
        assert!(!text.contains("FileSize"));
        assert!(!text.contains("Sig"));
        assert!(!text.contains("References"));
        assert!(!text.contains("\n\n"));
    }

    #[test]
    fn parse_accumulates_signatures() {
        let info = NarInfo::parse("Sig: first\nSig: second\n");
        assert_eq!(info.sigs, ["first", "second"]);
    }

    #[test]
    fn parse_drops_trailing_reference_token() {
        let info = NarInfo::parse("References: a5p0j1w27aqdzncpw73k95byvhh5prw2-x \n");
        assert_eq!(info.references, ["a5p0j1w27aqdzncpw73k95byvhh5prw2-x"]);
    }

    #[test]
    fn parse_empty_references_line() {
        let info = NarInfo::parse("References: \n");
        assert!(info.references.is_empty());
    }

    #[test]
    fn parse_skips_malformed_lines() {
        let info = NarInfo::parse("garbage\nNarSize: not-a-number\nURL: nar/x.nar\n");
        assert_eq!(info.nar_size, 0);
        assert_eq!(info.url, "nar/x.nar");
    }

    #[test]
    fn parse_ignores_unknown_keys() {
        let info = NarInfo::parse("Frobnicate: yes\nURL: nar/x.nar\n");
        assert_eq!(info.url, "nar/x.nar");
    }

    #[test]
    fn parse_splits_on_first_separator_only() {
        let info = NarInfo::parse("CA: fixed: sha256:abcd\n");
        assert_eq!(info.ca.as_deref(), Some("fixed: sha256:abcd"));
    }

    #[test]
    fn fixed_output_detection() {
        let mut info = sample();
        assert!(!info.is_fixed_output());
        info.references.clear();
        info.deriver = None;
        assert!(info.is_fixed_output());
    }

    #[test]
    fn compression_tags() {
        assert_eq!(
            CompressionFormat::from_tag("xz").unwrap(),
            CompressionFormat::Xz
        );
        assert_eq!(
            CompressionFormat::from_tag("").unwrap(),
            CompressionFormat::None
        );
        assert_eq!(CompressionFormat::Zstd.extension(), ".zstd");
        assert_eq!(CompressionFormat::None.extension(), "");
        assert!(CompressionFormat::from_tag("bzip2").is_err());
    }
}
