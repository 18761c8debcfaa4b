//! Configuration for the collection daemon.
//!
//! Loaded once at startup from vigil.toml and validated before any fetch
//! cycle runs. Cache-mode flags are explicit configuration threaded
//! through the orchestrator; there is no process-wide mutable state.

use crate::exit_spec::ExitSpec;
use crate::types::AddressFamily;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default agent port.
pub const DEFAULT_AGENT_PORT: u16 = 6556;

/// Governs whether the file cache is bypassed, fully used, or read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileCacheMode {
    /// No reads and no writes ever occur, regardless of staleness flags.
    Disabled,
    ReadOnly,
    #[default]
    ReadWrite,
}

impl FileCacheMode {
    pub fn allows_read(self) -> bool {
        self != FileCacheMode::Disabled
    }

    pub fn allows_write(self) -> bool {
        self == FileCacheMode::ReadWrite
    }
}

/// Whether and how the TCP payload stream is decrypted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionMode {
    /// Payload is taken as plaintext; encrypted frames are an error.
    #[default]
    Disable,
    /// Decrypt encrypted frames, pass plaintext through unchanged.
    Allow,
    /// Every payload must arrive encrypted.
    Enforce,
}

/// Transport encryption settings for one host's agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EncryptionSettings {
    #[serde(default)]
    pub mode: EncryptionMode,
    /// Shared secret the key is derived from. Required unless mode is
    /// `disable`.
    #[serde(default)]
    pub secret: Option<String>,
}

impl EncryptionSettings {
    pub fn validate(&self, hostname: &str) -> Result<()> {
        if self.mode != EncryptionMode::Disable && self.secret.is_none() {
            anyhow::bail!(
                "host '{}': encryption mode '{:?}' requires a shared secret",
                hostname,
                self.mode
            );
        }
        Ok(())
    }
}

/// File-cache policy shared by all hosts in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Base directory; one file per host underneath.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,

    /// Entries older than this never satisfy a normal read.
    #[serde(default)]
    pub max_age_secs: u64,

    /// Accept stale entries on read instead of fetching.
    #[serde(default)]
    pub use_outdated: bool,

    /// Never open a network connection; serve from cache (even stale)
    /// or report missing data.
    #[serde(default)]
    pub use_only_cache: bool,

    /// Offline demo/testing mode: like `use_only_cache`, and also keeps
    /// the cache read-only so recorded payloads survive.
    #[serde(default)]
    pub simulation: bool,

    #[serde(default)]
    pub mode: FileCacheMode,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("/var/lib/vigil/cache")
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            max_age_secs: 0,
            use_outdated: false,
            use_only_cache: false,
            simulation: false,
            mode: FileCacheMode::ReadWrite,
        }
    }
}

impl CacheSettings {
    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

/// One monitored host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    pub hostname: String,

    /// Explicit address; when absent the hostname is resolved per
    /// `family` at fetch time.
    #[serde(default)]
    pub address: Option<IpAddr>,

    #[serde(default)]
    pub family: AddressFamily,

    #[serde(default = "default_agent_port")]
    pub agent_port: u16,

    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: f64,

    /// Collection interval when running in loop mode.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    #[serde(default)]
    pub encryption: EncryptionSettings,

    /// Per-host override; falls back to the global exit spec.
    #[serde(default)]
    pub exit_spec: Option<ExitSpec>,
}

fn default_agent_port() -> u16 {
    DEFAULT_AGENT_PORT
}

fn default_connect_timeout() -> f64 {
    5.0
}

fn default_check_interval() -> u64 {
    60
}

impl HostConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.connect_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VigilConfig {
    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub exit_spec: ExitSpec,

    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

impl VigilConfig {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Startup validation; configuration is immutable afterwards.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for host in &self.hosts {
            if host.hostname.is_empty() {
                anyhow::bail!("host with empty hostname in config");
            }
            // Hostnames key cache entries; a duplicate would make two
            // fetch cycles race on the same entry.
            if !seen.insert(host.hostname.as_str()) {
                anyhow::bail!("duplicate host '{}' in config", host.hostname);
            }
            if host.hostname.contains('/') || host.hostname.contains("..") {
                anyhow::bail!("host '{}': hostname is not a valid cache key", host.hostname);
            }
            if host.connect_timeout_secs <= 0.0 {
                anyhow::bail!("host '{}': connect timeout must be positive", host.hostname);
            }
            if let Some(addr) = &host.address {
                if !host.family.matches(addr) {
                    anyhow::bail!(
                        "host '{}': address {} does not match family {}",
                        host.hostname,
                        addr,
                        host.family
                    );
                }
            }
            host.encryption.validate(&host.hostname)?;
        }
        Ok(())
    }

    /// Exit spec to use for the given host.
    pub fn exit_spec_for(&self, host: &HostConfig) -> ExitSpec {
        host.exit_spec.clone().unwrap_or_else(|| self.exit_spec.clone())
    }
}
