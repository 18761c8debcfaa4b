//! File-backed cache for raw agent payloads.
//!
//! One file per host under the configured base directory. Each entry
//! embeds its own write timestamp instead of relying on mtime, so
//! staleness checks survive filesystem copies and clock-skewed mounts.
//! A corrupt or unreadable entry is a cache miss, never a fatal error.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};
use vigil_common::config::{CacheSettings, FileCacheMode};
use vigil_common::error::CacheError;
use vigil_common::types::HostIdentity;

/// First line of every cache file; bump the version on format changes.
const CACHE_MAGIC: &str = "vigil-cache v1";

/// Process-wide sequence number so every write stages in its own temp
/// file, even for the same host on concurrent tasks.
static WRITE_SEQ: AtomicU64 = AtomicU64::new(0);

/// A payload read back from the cache, with its age at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedPayload {
    pub payload: Vec<u8>,
    pub age: Duration,
}

/// Persists and retrieves raw fetched payloads keyed by hostname.
#[derive(Debug, Clone)]
pub struct FileCache {
    base_path: PathBuf,
    max_age: Duration,
    use_outdated: bool,
    use_only_cache: bool,
    simulation: bool,
    mode: FileCacheMode,
}

impl FileCache {
    pub fn new(settings: &CacheSettings) -> Self {
        Self {
            base_path: settings.dir.clone(),
            max_age: settings.max_age(),
            use_outdated: settings.use_outdated,
            use_only_cache: settings.use_only_cache,
            simulation: settings.simulation,
            mode: settings.mode,
        }
    }

    /// True when this cycle must not open a network connection at all.
    pub fn is_offline(&self) -> bool {
        self.simulation || self.use_only_cache
    }

    fn entry_path(&self, host: &HostIdentity) -> PathBuf {
        self.base_path.join(&host.hostname)
    }

    /// Cached payload for `host`, honoring the staleness policy.
    ///
    /// Returns `None` on miss, disabled mode, corrupt entry, or when the
    /// entry is older than `max_age` and no flag permits outdated data.
    pub fn read(&self, host: &HostIdentity) -> Option<CachedPayload> {
        let entry = self.load_entry(host)?;
        let stale_ok = self.use_outdated || self.use_only_cache || self.simulation;
        if entry.age <= self.max_age || stale_ok {
            debug!(
                host = %host.hostname,
                age_secs = entry.age.as_secs(),
                "serving payload from cache"
            );
            Some(entry)
        } else {
            debug!(
                host = %host.hostname,
                age_secs = entry.age.as_secs(),
                max_age_secs = self.max_age.as_secs(),
                "cache entry is stale"
            );
            None
        }
    }

    /// Like [`read`](Self::read) but ignores `max_age` entirely. Used for
    /// the stale-fallback path after a failed fetch. Still honors the
    /// cache mode.
    pub fn read_outdated(&self, host: &HostIdentity) -> Option<CachedPayload> {
        self.load_entry(host)
    }

    fn load_entry(&self, host: &HostIdentity) -> Option<CachedPayload> {
        if !self.mode.allows_read() {
            return None;
        }
        let path = self.entry_path(host);
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(host = %host.hostname, error = %err, "unreadable cache entry, treating as miss");
                return None;
            }
        };
        match parse_entry(&raw) {
            Ok((written_at, payload)) => {
                let age = Utc::now()
                    .timestamp()
                    .saturating_sub(written_at)
                    .max(0) as u64;
                Some(CachedPayload {
                    payload,
                    age: Duration::from_secs(age),
                })
            }
            Err(reason) => {
                let err = CacheError::Read {
                    host: host.hostname.clone(),
                    reason,
                };
                warn!(error = %err, "corrupt cache entry, treating as miss");
                None
            }
        }
    }

    /// Persist `payload` for `host` with the current timestamp.
    ///
    /// A no-op unless the mode allows writes. The entry is staged in a
    /// temp file and renamed into place, so a concurrent reader only ever
    /// sees a complete entry and concurrent writers are last-writer-wins.
    pub fn write(&self, host: &HostIdentity, payload: &[u8]) -> Result<(), CacheError> {
        if !self.mode.allows_write() {
            debug!(host = %host.hostname, mode = ?self.mode, "cache write skipped");
            return Ok(());
        }
        let path = self.entry_path(host);
        let write_err = |err: std::io::Error| CacheError::Write {
            host: host.hostname.clone(),
            reason: err.to_string(),
        };

        std::fs::create_dir_all(&self.base_path).map_err(write_err)?;

        let mut contents =
            Vec::with_capacity(CACHE_MAGIC.len() + 16 + payload.len());
        contents.extend_from_slice(CACHE_MAGIC.as_bytes());
        contents.push(b'\n');
        contents.extend_from_slice(Utc::now().timestamp().to_string().as_bytes());
        contents.push(b'\n');
        contents.extend_from_slice(payload);

        // Unique temp name per write (pid + sequence number); two writers
        // racing on the same host each stage and rename a complete file.
        let temp_path = self.base_path.join(format!(
            ".{}.{}.{}.tmp",
            host.hostname,
            std::process::id(),
            WRITE_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::write(&temp_path, &contents).map_err(write_err)?;
        std::fs::rename(&temp_path, &path).map_err(write_err)?;

        debug!(host = %host.hostname, bytes = payload.len(), "cache entry written");
        Ok(())
    }
}

/// Split a raw cache file into (write timestamp, payload).
fn parse_entry(raw: &[u8]) -> Result<(i64, Vec<u8>), String> {
    let mut rest = raw;

    let magic_end = rest
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| "missing header".to_string())?;
    if &rest[..magic_end] != CACHE_MAGIC.as_bytes() {
        return Err("unrecognized cache format".to_string());
    }
    rest = &rest[magic_end + 1..];

    let ts_end = rest
        .iter()
        .position(|&b| b == b'\n')
        .ok_or_else(|| "missing timestamp".to_string())?;
    let ts_str = std::str::from_utf8(&rest[..ts_end]).map_err(|_| "invalid timestamp".to_string())?;
    let written_at: i64 = ts_str
        .parse()
        .map_err(|_| format!("invalid timestamp '{}'", ts_str))?;

    Ok((written_at, rest[ts_end + 1..].to_vec()))
}
