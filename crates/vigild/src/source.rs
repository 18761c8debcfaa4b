//! Source orchestrator: decides cache-vs-fetch for one host and turns
//! the outcome into a severity classification.
//!
//! Failure semantics: nothing in here panics or propagates a fetch
//! error upward. Every path ends in a [`FetchOutcome`] that the
//! summarizer classifies, so one broken host never aborts the cycle.

use crate::cache::FileCache;
use crate::fetcher::Fetch;
use crate::summarizer::Summarizer;
use std::time::Duration;
use tracing::{debug, warn};
use vigil_common::error::FetchError;
use vigil_common::exit_spec::{ExitClassification, State};
use vigil_common::types::HostIdentity;

/// How a cycle ended for one host.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Served from cache (fresh, or stale where flags permit).
    Cached { payload: Vec<u8>, age: Duration },
    /// Fetched live from the agent.
    Fetched { payload: Vec<u8> },
    /// Live fetch failed; an outdated cache entry was served instead.
    StaleFallback {
        payload: Vec<u8>,
        age: Duration,
        error: FetchError,
    },
    /// Live fetch failed and no cached data could stand in.
    Failed { error: FetchError },
    /// Offline cycle (simulation / cache-only) with nothing cached.
    NoCachedData,
}

impl FetchOutcome {
    /// Payload to hand to the parsing pipeline, if any.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            FetchOutcome::Cached { payload, .. }
            | FetchOutcome::Fetched { payload }
            | FetchOutcome::StaleFallback { payload, .. } => Some(payload),
            FetchOutcome::Failed { .. } | FetchOutcome::NoCachedData => None,
        }
    }
}

/// Report for one host, returned to the check engine.
#[derive(Debug)]
pub struct HostReport {
    pub hostname: String,
    pub classification: ExitClassification,
    pub payload: Option<Vec<u8>>,
}

impl HostReport {
    pub fn state(&self) -> State {
        self.classification.state
    }
}

/// Composes cache, fetcher and summarizer for one host.
pub struct AgentSource<F> {
    host: HostIdentity,
    cache: FileCache,
    fetcher: F,
    summarizer: Summarizer,
}

impl<F: Fetch> AgentSource<F> {
    pub fn new(host: HostIdentity, cache: FileCache, fetcher: F, summarizer: Summarizer) -> Self {
        Self {
            host,
            cache,
            fetcher,
            summarizer,
        }
    }

    /// Run one collection cycle for this host.
    pub async fn run(&self) -> HostReport {
        let outcome = self.collect().await;
        let classification = self.summarizer.summarize(&outcome);
        debug!(host = %self.host.hostname, %classification, "cycle complete");
        HostReport {
            hostname: self.host.hostname.clone(),
            payload: outcome.payload().map(<[u8]>::to_vec),
            classification,
        }
    }

    async fn collect(&self) -> FetchOutcome {
        // Offline cycle: the cache (stale included) is all there is.
        // The fetcher is never invoked.
        if self.cache.is_offline() {
            return match self.cache.read_outdated(&self.host) {
                Some(entry) => FetchOutcome::Cached {
                    payload: entry.payload,
                    age: entry.age,
                },
                None => FetchOutcome::NoCachedData,
            };
        }

        if let Some(entry) = self.cache.read(&self.host) {
            return FetchOutcome::Cached {
                payload: entry.payload,
                age: entry.age,
            };
        }

        match self.fetcher.fetch(&self.host).await {
            Ok(payload) => {
                // A write failure must not lose the fetched payload.
                if let Err(err) = self.cache.write(&self.host, &payload) {
                    warn!(host = %self.host.hostname, error = %err, "cache write failed");
                }
                FetchOutcome::Fetched { payload }
            }
            Err(error) => match self.cache.read_outdated(&self.host) {
                Some(entry) => {
                    debug!(
                        host = %self.host.hostname,
                        age_secs = entry.age.as_secs(),
                        "fetch failed, falling back to outdated cache entry"
                    );
                    FetchOutcome::StaleFallback {
                        payload: entry.payload,
                        age: entry.age,
                        error,
                    }
                }
                None => FetchOutcome::Failed { error },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use vigil_common::config::{CacheSettings, FileCacheMode};
    use vigil_common::exit_spec::ExitSpec;
    use vigil_common::types::AddressFamily;

    /// Scripted fetcher that records how often it was invoked.
    struct FakeFetcher {
        responses: Mutex<Vec<crate::fetcher::FetchResult>>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn succeeding(payload: &[u8]) -> Self {
            Self {
                responses: Mutex::new(vec![Ok(payload.to_vec())]),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing(error: FetchError) -> Self {
            Self {
                responses: Mutex::new(vec![Err(error)]),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Fetch for &FakeFetcher {
        async fn fetch(&self, _host: &HostIdentity) -> crate::fetcher::FetchResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(FetchError::ConnectionRefused))
        }
    }

    fn host() -> HostIdentity {
        HostIdentity::new("web-01", None, AddressFamily::V4)
    }

    fn cache_settings(dir: &TempDir) -> CacheSettings {
        CacheSettings {
            dir: dir.path().to_path_buf(),
            max_age_secs: 60,
            ..CacheSettings::default()
        }
    }

    fn source<'a>(cache: FileCache, fetcher: &'a FakeFetcher) -> AgentSource<&'a FakeFetcher> {
        AgentSource::new(host(), cache, fetcher, Summarizer::new(ExitSpec::default()))
    }

    #[tokio::test]
    async fn fresh_cache_hit_skips_fetcher() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(&cache_settings(&dir));
        cache.write(&host(), b"cached payload").unwrap();

        let fetcher = FakeFetcher::succeeding(b"live payload");
        let report = source(cache, &fetcher).run().await;

        assert_eq!(report.state(), State::Ok);
        assert_eq!(report.payload.as_deref(), Some(b"cached payload".as_slice()));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn cache_miss_fetches_and_populates_cache() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(&cache_settings(&dir));
        let fetcher = FakeFetcher::succeeding(b"live payload");

        let report = source(cache.clone(), &fetcher).run().await;

        assert_eq!(report.state(), State::Ok);
        assert_eq!(report.payload.as_deref(), Some(b"live payload".as_slice()));
        assert_eq!(fetcher.calls(), 1);
        // Subsequent read is served from the populated cache
        assert_eq!(cache.read(&host()).unwrap().payload, b"live payload");
    }

    #[tokio::test]
    async fn simulation_never_invokes_fetcher() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(&CacheSettings {
            simulation: true,
            mode: FileCacheMode::ReadOnly,
            ..cache_settings(&dir)
        });
        let fetcher = FakeFetcher::succeeding(b"live payload");

        // No cached data: degraded report, still no fetch
        let report = source(cache, &fetcher).run().await;
        assert_eq!(report.state(), State::Unknown);
        assert!(report.payload.is_none());
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn simulation_serves_stale_cache() {
        let dir = TempDir::new().unwrap();
        let rw = FileCache::new(&CacheSettings {
            max_age_secs: 0,
            ..cache_settings(&dir)
        });
        rw.write(&host(), b"recorded payload").unwrap();

        let cache = FileCache::new(&CacheSettings {
            simulation: true,
            max_age_secs: 0,
            ..cache_settings(&dir)
        });
        let fetcher = FakeFetcher::succeeding(b"live payload");
        let report = source(cache, &fetcher).run().await;

        assert_eq!(report.state(), State::Ok);
        assert_eq!(
            report.payload.as_deref(),
            Some(b"recorded payload".as_slice())
        );
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn fetch_failure_with_no_cache_is_classified() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(&cache_settings(&dir));
        let fetcher = FakeFetcher::failing(FetchError::ConnectionRefused);

        let report = source(cache, &fetcher).run().await;
        assert_eq!(report.state(), State::Crit);
        assert!(report.payload.is_none());
        assert!(report.classification.summary.contains("refused"));
    }

    #[tokio::test]
    async fn fetch_failure_falls_back_to_outdated_entry() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(&cache_settings(&dir));
        // Entry exists but is too old to satisfy the normal read
        cache.write(&host(), b"old payload").unwrap();
        let cache = FileCache::new(&CacheSettings {
            max_age_secs: 0,
            ..cache_settings(&dir)
        });

        // Age out the fresh write: max_age 0 rejects anything aged >= 1s,
        // so rewrite the entry timestamp instead of sleeping.
        let entry_file = dir.path().join("web-01");
        let contents = std::fs::read_to_string(&entry_file).unwrap();
        let mut lines = contents.lines();
        let magic = lines.next().unwrap().to_string();
        let ts: i64 = lines.next().unwrap().parse().unwrap();
        let rest: Vec<&str> = lines.collect();
        std::fs::write(
            &entry_file,
            format!("{}\n{}\n{}", magic, ts - 120, rest.join("\n")),
        )
        .unwrap();

        let fetcher = FakeFetcher::failing(FetchError::ConnectTimeout(Duration::from_secs(1)));
        let report = source(cache, &fetcher).run().await;

        assert_eq!(report.state(), State::Warn);
        assert_eq!(report.payload.as_deref(), Some(b"old payload".as_slice()));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn disabled_cache_always_fetches_and_never_persists() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(&CacheSettings {
            mode: FileCacheMode::Disabled,
            ..cache_settings(&dir)
        });
        let fetcher = FakeFetcher::succeeding(b"live payload");

        let report = source(cache, &fetcher).run().await;
        assert_eq!(report.state(), State::Ok);
        assert_eq!(fetcher.calls(), 1);
        assert!(!dir.path().join("web-01").exists());
    }
}
