//! Maps a collection outcome to a monitoring severity.

use crate::source::FetchOutcome;
use vigil_common::error::FetchError;
use vigil_common::exit_spec::{ExitClassification, ExitSpec, State};

/// Classifies fetch outcomes against a (possibly per-host) exit spec.
///
/// Pure: no I/O, deterministic for a given outcome and spec.
#[derive(Debug, Clone)]
pub struct Summarizer {
    exit_spec: ExitSpec,
}

impl Summarizer {
    pub fn new(exit_spec: ExitSpec) -> Self {
        Self { exit_spec }
    }

    pub fn summarize(&self, outcome: &FetchOutcome) -> ExitClassification {
        match outcome {
            FetchOutcome::Fetched { payload } => self.classify_payload(payload, None),
            FetchOutcome::Cached { payload, age } => self.classify_payload(payload, Some(*age)),
            FetchOutcome::StaleFallback { age, error, .. } => ExitClassification::new(
                self.exit_spec.stale_cache,
                format!(
                    "using cached data ({}s old) after fetch failure: {}",
                    age.as_secs(),
                    error
                ),
            ),
            FetchOutcome::Failed { error } => {
                ExitClassification::new(self.state_for(error), error.to_string())
            }
            FetchOutcome::NoCachedData => ExitClassification::new(
                self.exit_spec.missing_data,
                "no cached agent data available".to_string(),
            ),
        }
    }

    fn classify_payload(
        &self,
        payload: &[u8],
        age: Option<std::time::Duration>,
    ) -> ExitClassification {
        if payload.is_empty() {
            return ExitClassification::new(
                self.exit_spec.empty_output,
                "empty output from agent".to_string(),
            );
        }
        let summary = match age {
            Some(age) => format!("received {} bytes (cached, {}s old)", payload.len(), age.as_secs()),
            None => format!("received {} bytes from agent", payload.len()),
        };
        ExitClassification::new(State::Ok, summary)
    }

    fn state_for(&self, error: &FetchError) -> State {
        match error {
            FetchError::ConnectTimeout(_) => self.exit_spec.timeout,
            FetchError::ConnectionRefused | FetchError::Io(_) => self.exit_spec.connection,
            FetchError::Decryption(_) => self.exit_spec.decryption,
            FetchError::Protocol(_) => self.exit_spec.protocol,
        }
    }
}
