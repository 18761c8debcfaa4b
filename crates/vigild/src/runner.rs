//! Per-cycle fan-out across all configured hosts.
//!
//! Each host is an independent unit of work on its own task; a panic or
//! failure in one host's cycle degrades that host to UNKNOWN and never
//! touches the others.

use crate::cache::FileCache;
use crate::fetcher::TcpFetcher;
use crate::source::{AgentSource, HostReport};
use crate::summarizer::Summarizer;
use tokio::task::JoinHandle;
use tracing::{error, info};
use vigil_common::config::{HostConfig, VigilConfig};
use vigil_common::exit_spec::{ExitClassification, State};
use vigil_common::types::HostIdentity;

/// Run one collection cycle over every configured host.
///
/// Reports come back sorted by hostname so output is stable across
/// runs regardless of completion order.
pub async fn run_cycle(config: &VigilConfig) -> Vec<HostReport> {
    let mut handles = Vec::with_capacity(config.hosts.len());
    for host_config in &config.hosts {
        let host_config = host_config.clone();
        let cache_settings = config.cache.clone();
        let exit_spec = config.exit_spec_for(&host_config);
        let hostname = host_config.hostname.clone();
        let handle = tokio::spawn(async move {
            let source = build_source(&host_config, &cache_settings, exit_spec);
            source.run().await
        });
        handles.push((hostname, handle));
    }

    let mut reports = collect_reports(handles).await;
    reports.sort_by(|a, b| a.hostname.cmp(&b.hostname));

    let worst = worst_state(&reports);
    info!(hosts = reports.len(), worst = %worst, "collection cycle finished");
    reports
}

/// Await every host's task, degrading a panicked task to an UNKNOWN
/// report that still names the host it served.
async fn collect_reports(handles: Vec<(String, JoinHandle<HostReport>)>) -> Vec<HostReport> {
    let mut reports = Vec::with_capacity(handles.len());
    for (hostname, handle) in handles {
        match handle.await {
            Ok(report) => reports.push(report),
            Err(err) => {
                error!(host = %hostname, error = %err, "host collection task failed");
                reports.push(HostReport {
                    hostname,
                    classification: ExitClassification::new(
                        State::Unknown,
                        format!("collection task failed: {err}"),
                    ),
                    payload: None,
                });
            }
        }
    }
    reports
}

fn build_source(
    host_config: &HostConfig,
    cache_settings: &vigil_common::config::CacheSettings,
    exit_spec: vigil_common::exit_spec::ExitSpec,
) -> AgentSource<TcpFetcher> {
    let host = HostIdentity::new(
        host_config.hostname.clone(),
        host_config.address,
        host_config.family,
    );
    let cache = FileCache::new(cache_settings);
    let fetcher = TcpFetcher::new(
        host_config.agent_port,
        host_config.connect_timeout(),
        host_config.encryption.clone(),
    );
    AgentSource::new(host, cache, fetcher, Summarizer::new(exit_spec))
}

/// Worst state across all reports; OK for an empty cycle.
pub fn worst_state(reports: &[HostReport]) -> State {
    reports
        .iter()
        .fold(State::Ok, |acc, report| acc.worst(report.state()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_report(hostname: &str) -> HostReport {
        HostReport {
            hostname: hostname.to_string(),
            classification: ExitClassification::new(State::Ok, "fine"),
            payload: Some(b"data".to_vec()),
        }
    }

    #[test]
    fn worst_state_of_empty_cycle_is_ok() {
        assert_eq!(worst_state(&[]), State::Ok);
    }

    #[test]
    fn worst_state_picks_crit_over_unknown() {
        let reports = vec![
            HostReport {
                hostname: "a".to_string(),
                classification: ExitClassification::new(State::Unknown, "no data"),
                payload: None,
            },
            HostReport {
                hostname: "b".to_string(),
                classification: ExitClassification::new(State::Crit, "refused"),
                payload: None,
            },
            ok_report("c"),
        ];
        assert_eq!(worst_state(&reports), State::Crit);
    }

    #[tokio::test]
    async fn panicked_task_degrades_to_unknown_and_keeps_its_hostname() {
        let handles = vec![
            (
                "healthy-host".to_string(),
                tokio::spawn(async { ok_report("healthy-host") }),
            ),
            (
                "broken-host".to_string(),
                tokio::spawn(async { panic!("collection blew up") }),
            ),
        ];

        let reports = collect_reports(handles).await;
        assert_eq!(reports.len(), 2);

        assert_eq!(reports[0].hostname, "healthy-host");
        assert_eq!(reports[0].state(), State::Ok);

        assert_eq!(reports[1].hostname, "broken-host");
        assert_eq!(reports[1].state(), State::Unknown);
        assert!(reports[1].payload.is_none());
        assert!(reports[1].classification.summary.contains("task failed"));
    }
}
