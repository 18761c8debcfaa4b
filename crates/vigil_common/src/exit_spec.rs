//! Severity states and the configurable exit-code specification.
//!
//! The exit spec maps fetch/cache conditions to monitoring severities.
//! Defaults follow the usual convention (connection problems are CRIT,
//! missing data is UNKNOWN) and every field can be overridden per host
//! in vigil.toml.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Monitoring severity for one host's collection outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Ok,
    Warn,
    Crit,
    Unknown,
}

impl State {
    /// Process/plugin exit code for this state.
    pub fn exit_code(self) -> i32 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Crit => 2,
            State::Unknown => 3,
        }
    }

    /// CRIT outranks UNKNOWN: a confirmed failure is worse than no data.
    fn rank(self) -> u8 {
        match self {
            State::Ok => 0,
            State::Warn => 1,
            State::Unknown => 2,
            State::Crit => 3,
        }
    }

    /// The worse of two states.
    pub fn worst(self, other: State) -> State {
        if self.rank() >= other.rank() {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Ok => write!(f, "OK"),
            State::Warn => write!(f, "WARN"),
            State::Crit => write!(f, "CRIT"),
            State::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Per-condition severity mapping, overridable per host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitSpec {
    /// Connection refused or other socket-level failure.
    #[serde(default = "default_crit")]
    pub connection: State,

    /// Agent did not answer within the connect timeout.
    #[serde(default = "default_crit")]
    pub timeout: State,

    /// Payload could not be decrypted (wrong shared secret, bad tag).
    #[serde(default = "default_crit")]
    pub decryption: State,

    /// Malformed or truncated payload, or plaintext where encryption
    /// is enforced.
    #[serde(default = "default_crit")]
    pub protocol: State,

    /// Agent closed the connection without sending anything.
    #[serde(default = "default_crit")]
    pub empty_output: State,

    /// No cached data available in an offline (cache-only) cycle.
    #[serde(default = "default_unknown")]
    pub missing_data: State,

    /// Stale cached data served because the live fetch failed.
    #[serde(default = "default_warn")]
    pub stale_cache: State,
}

fn default_crit() -> State {
    State::Crit
}

fn default_unknown() -> State {
    State::Unknown
}

fn default_warn() -> State {
    State::Warn
}

impl Default for ExitSpec {
    fn default() -> Self {
        Self {
            connection: default_crit(),
            timeout: default_crit(),
            decryption: default_crit(),
            protocol: default_crit(),
            empty_output: default_crit(),
            missing_data: default_unknown(),
            stale_cache: default_warn(),
        }
    }
}

/// Final classification for one host: severity plus a one-line summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitClassification {
    pub state: State,
    pub summary: String,
}

impl ExitClassification {
    pub fn new(state: State, summary: impl Into<String>) -> Self {
        Self {
            state,
            summary: summary.into(),
        }
    }
}

impl fmt::Display for ExitClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.state, self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worst_prefers_crit_over_unknown() {
        assert_eq!(State::Crit.worst(State::Unknown), State::Crit);
        assert_eq!(State::Unknown.worst(State::Crit), State::Crit);
        assert_eq!(State::Ok.worst(State::Warn), State::Warn);
        assert_eq!(State::Ok.worst(State::Ok), State::Ok);
    }

    #[test]
    fn exit_codes_follow_plugin_convention() {
        assert_eq!(State::Ok.exit_code(), 0);
        assert_eq!(State::Warn.exit_code(), 1);
        assert_eq!(State::Crit.exit_code(), 2);
        assert_eq!(State::Unknown.exit_code(), 3);
    }

    #[test]
    fn exit_spec_defaults() {
        let spec = ExitSpec::default();
        assert_eq!(spec.connection, State::Crit);
        assert_eq!(spec.missing_data, State::Unknown);
        assert_eq!(spec.stale_cache, State::Warn);
    }

    #[test]
    fn exit_spec_partial_override_from_toml() {
        let spec: ExitSpec = toml::from_str("timeout = \"warn\"\nmissing_data = \"crit\"").unwrap();
        assert_eq!(spec.timeout, State::Warn);
        assert_eq!(spec.missing_data, State::Crit);
        // Untouched fields keep their defaults
        assert_eq!(spec.connection, State::Crit);
        assert_eq!(spec.stale_cache, State::Warn);
    }
}
