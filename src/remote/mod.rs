//! Remote binary caches
//!
//! Probes and fetches records and payloads from HTTP caches or local
//! filesystem mirrors. Endpoint failures are isolated: one unreachable
//! cache never sinks the rest of a batch.

use crate::error::{NarkeepError, NarkeepResult};
use crate::store::closure::Closure;
use crate::store::hash::StoreHash;
use crate::store::local::{NarStore, NARINFO_EXT};
use crate::store::narinfo::NarInfo;
use std::fmt;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use ureq::Agent;

/// One cache endpoint: an HTTP URL or a local mirror directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Http(String),
    Dir(PathBuf),
}

impl Endpoint {
    /// Parse an endpoint string
    ///
    /// Anything without an http(s) scheme is treated as a local mirror
    /// directory.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.starts_with("http://") || s.starts_with("https://") {
            Self::Http(s.trim_end_matches('/').to_string())
        } else {
            Self::Dir(PathBuf::from(s))
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(url) => f.write_str(url),
            Self::Dir(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Result of a fetch batch
#[derive(Debug, Default)]
pub struct FetchSummary {
    pub fetched: Vec<StoreHash>,
    pub missing: Vec<StoreHash>,
}

/// Client over an ordered list of cache endpoints
pub struct CacheClient {
    endpoints: Vec<Endpoint>,
    agent: Agent,
}

impl CacheClient {
    pub fn new(endpoints: Vec<Endpoint>, timeout: Duration) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self { endpoints, agent }
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Hashes available in at least one endpoint, in input order
    ///
    /// Endpoints are tried in order per hash and the first hit wins; a
    /// failing endpoint is warned about and not retried for that hash.
    pub fn probe(&self, hashes: &[StoreHash]) -> Vec<StoreHash> {
        let mut available = Vec::new();
        for hash in hashes {
            if self.endpoints.iter().any(|ep| self.probe_one(ep, hash)) {
                available.push(hash.clone());
            }
        }
        available
    }

    /// Probe only the references missing from `closure`
    pub fn probe_missing_refs(&self, closure: &Closure) -> Vec<StoreHash> {
        self.probe(&closure.missing_references())
    }

    /// Fetch records and payloads for `hashes` into `store`
    ///
    /// Per hash, endpoints are tried in order until one serves the record;
    /// the payload always comes from the endpoint that served the record.
    /// Failures are warnings, unreachable hashes end up in the summary.
    pub fn fetch(&self, hashes: &[StoreHash], store: &NarStore) -> FetchSummary {
        let mut summary = FetchSummary::default();

        'hashes: for hash in hashes {
            for endpoint in &self.endpoints {
                let text = match self.fetch_narinfo(endpoint, hash) {
                    Ok(Some(text)) => text,
                    Ok(None) => {
                        debug!("{hash} not in {endpoint}");
                        continue;
                    }
                    Err(err) => {
                        warn!("download of {hash} from {endpoint} failed: {err}");
                        continue;
                    }
                };
                let info = NarInfo::parse(&text);
                if info.url.is_empty() {
                    warn!("{endpoint} served a narinfo for {hash} without a URL");
                    continue;
                }
                if let Err(err) = store.write_narinfo_text(hash, &text) {
                    warn!("persisting narinfo for {hash} failed: {err}");
                    continue;
                }
                if let Err(err) = self.fetch_payload(endpoint, &info.url, store) {
                    warn!("download of {} from {endpoint} failed: {err}", info.url);
                    continue;
                }
                summary.fetched.push(hash.clone());
                continue 'hashes;
            }
            warn!("{hash} not found in any cache");
            summary.missing.push(hash.clone());
        }

        summary
    }

    /// True if `endpoint` currently serves the record for `hash`
    fn probe_one(&self, endpoint: &Endpoint, hash: &StoreHash) -> bool {
        match endpoint {
            Endpoint::Http(base) => {
                let url = format!("{base}/{hash}.{NARINFO_EXT}");
                match self.agent.get(&url).call() {
                    Ok(_) => true,
                    Err(ureq::Error::StatusCode(_)) => false,
                    Err(err) => {
                        warn!("probe of {url} failed: {err}");
                        false
                    }
                }
            }
            Endpoint::Dir(dir) => dir.join(format!("{hash}.{NARINFO_EXT}")).is_file(),
        }
    }

    /// Record text for `hash`, or None when the endpoint does not have it
    fn fetch_narinfo(
        &self,
        endpoint: &Endpoint,
        hash: &StoreHash,
    ) -> NarkeepResult<Option<String>> {
        match endpoint {
            Endpoint::Http(base) => {
                let url = format!("{base}/{hash}.{NARINFO_EXT}");
                match self.agent.get(&url).call() {
                    Ok(mut response) => {
                        let text = response.body_mut().read_to_string().map_err(|e| {
                            NarkeepError::Network {
                                url,
                                reason: e.to_string(),
                            }
                        })?;
                        Ok(Some(text))
                    }
                    Err(ureq::Error::StatusCode(_)) => Ok(None),
                    Err(err) => Err(NarkeepError::Network {
                        url,
                        reason: err.to_string(),
                    }),
                }
            }
            Endpoint::Dir(dir) => {
                let path = dir.join(format!("{hash}.{NARINFO_EXT}"));
                match fs::read_to_string(&path) {
                    Ok(text) => Ok(Some(text)),
                    Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
                    Err(err) => Err(NarkeepError::io(
                        format!("reading {}", path.display()),
                        err,
                    )),
                }
            }
        }
    }

    /// Fetch the payload `relative_url` names into the store
    ///
    /// Streams into a temporary sibling and renames into place, so a
    /// broken transfer never publishes a partial payload.
    fn fetch_payload(
        &self,
        endpoint: &Endpoint,
        relative_url: &str,
        store: &NarStore,
    ) -> NarkeepResult<()> {
        let final_path = store.payload_path(relative_url);
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| NarkeepError::io(format!("creating {}", parent.display()), e))?;
        }
        let file_name = final_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("payload");
        let tmp_path = final_path.with_file_name(format!(".{file_name}.tmp"));

        if let Err(err) = self.download_into(endpoint, relative_url, &tmp_path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(err);
        }
        fs::rename(&tmp_path, &final_path).map_err(|e| {
            NarkeepError::io(format!("renaming into {}", final_path.display()), e)
        })?;
        Ok(())
    }

    fn download_into(
        &self,
        endpoint: &Endpoint,
        relative_url: &str,
        dst: &Path,
    ) -> NarkeepResult<()> {
        let mut out = fs::File::create(dst)
            .map_err(|e| NarkeepError::io(format!("creating {}", dst.display()), e))?;
        match endpoint {
            Endpoint::Http(base) => {
                let url = format!("{base}/{relative_url}");
                let mut response =
                    self.agent
                        .get(&url)
                        .call()
                        .map_err(|e| NarkeepError::Network {
                            url: url.clone(),
                            reason: e.to_string(),
                        })?;
                let mut reader = response.body_mut().as_reader();
                io::copy(&mut reader, &mut out).map_err(|e| NarkeepError::Network {
                    url,
                    reason: e.to_string(),
                })?;
            }
            Endpoint::Dir(dir) => {
                let src = dir.join(relative_url);
                let mut input = fs::File::open(&src)
                    .map_err(|e| NarkeepError::io(format!("opening {}", src.display()), e))?;
                io::copy(&mut input, &mut out)
                    .map_err(|e| NarkeepError::io(format!("copying {}", src.display()), e))?;
            }
        }
        Ok(())
    }
}
