//! Shared types for the Vigil data-collection layer.
//!
//! Everything the daemon and its tests need to agree on lives here:
//! host identity, the fetch/cache error taxonomy, exit-spec severity
//! mapping, and the configuration structs loaded from vigil.toml.

pub mod config;
pub mod error;
pub mod exit_spec;
pub mod types;

pub use config::{CacheSettings, EncryptionMode, EncryptionSettings, FileCacheMode, HostConfig, VigilConfig};
pub use error::{CacheError, FetchError};
pub use exit_spec::{ExitClassification, ExitSpec, State};
pub use types::{AddressFamily, HostIdentity};
