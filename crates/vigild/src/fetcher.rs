//! TCP fetcher for raw agent output.
//!
//! `Fetch` is the capability seam between the orchestrator and a
//! transport; `TcpFetcher` is the agent-over-TCP implementation. Other
//! transports (SNMP, piped special agents) plug in behind the same
//! trait. The fetcher never retries; retry policy belongs to the
//! caller.

use crate::crypto;
use std::future::Future;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;
use vigil_common::config::{EncryptionMode, EncryptionSettings};
use vigil_common::error::FetchError;
use vigil_common::types::HostIdentity;

/// Outcome of one fetch attempt: raw (decrypted) payload bytes or a
/// typed, recoverable failure.
pub type FetchResult = Result<Vec<u8>, FetchError>;

/// A transport that can fetch one host's agent payload.
pub trait Fetch: Send + Sync {
    fn fetch(&self, host: &HostIdentity) -> impl Future<Output = FetchResult> + Send;
}

/// Fetches agent output over a plain TCP connection.
#[derive(Debug, Clone)]
pub struct TcpFetcher {
    agent_port: u16,
    timeout: Duration,
    encryption: EncryptionSettings,
}

impl TcpFetcher {
    pub fn new(agent_port: u16, timeout: Duration, encryption: EncryptionSettings) -> Self {
        Self {
            agent_port,
            timeout,
            encryption,
        }
    }

    async fn resolve(&self, host: &HostIdentity) -> Result<SocketAddr, FetchError> {
        if let Some(addr) = host.address {
            return Ok(SocketAddr::new(addr, self.agent_port));
        }
        let candidates = tokio::net::lookup_host((host.hostname.as_str(), self.agent_port))
            .await
            .map_err(FetchError::from_io)?;
        candidates
            .into_iter()
            .find(|addr| host.family.matches(&addr.ip()))
            .ok_or_else(|| {
                FetchError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no {} address for {}", host.family, host.hostname),
                ))
            })
    }

    /// Connect, read to EOF, and decrypt if the host's settings call for
    /// it. The timeout bounds the connect and each read; dropping the
    /// returned future closes the socket.
    async fn fetch_raw(&self, host: &HostIdentity) -> FetchResult {
        let addr = self.resolve(host).await?;

        let started = Instant::now();
        let mut stream = match timeout(self.timeout, TcpStream::connect(addr)).await {
            Err(_) => return Err(FetchError::ConnectTimeout(self.timeout)),
            Ok(Err(err)) => return Err(FetchError::from_io(err)),
            Ok(Ok(stream)) => stream,
        };
        debug!(
            host = %host.hostname,
            %addr,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "agent connection established"
        );

        // The agent writes its full output and closes. Bound each read
        // with the same timeout so a wedged agent cannot hold us forever.
        let mut raw = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            let n = match timeout(self.timeout, stream.read(&mut chunk)).await {
                Err(_) => return Err(FetchError::ConnectTimeout(self.timeout)),
                Ok(Err(err)) => return Err(FetchError::from_io(err)),
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => n,
            };
            raw.extend_from_slice(&chunk[..n]);
        }
        debug!(host = %host.hostname, bytes = raw.len(), "agent payload received");
        Ok(raw)
    }

    fn decrypt(&self, host: &HostIdentity, raw: Vec<u8>) -> FetchResult {
        match self.encryption.mode {
            EncryptionMode::Disable => {
                if crypto::is_encrypted(&raw) {
                    Err(FetchError::Protocol(
                        "received encrypted payload but encryption is disabled".to_string(),
                    ))
                } else {
                    Ok(raw)
                }
            }
            EncryptionMode::Allow | EncryptionMode::Enforce => {
                if crypto::is_encrypted(&raw) {
                    // Config validation guarantees a secret for these modes.
                    let secret = self.encryption.secret.as_deref().ok_or_else(|| {
                        FetchError::Decryption("no shared secret configured".to_string())
                    })?;
                    let payload = crypto::decrypt_payload(&raw, secret)?;
                    debug!(host = %host.hostname, "payload decrypted");
                    Ok(payload)
                } else if self.encryption.mode == EncryptionMode::Enforce {
                    Err(FetchError::Protocol(
                        "received plaintext payload but encryption is enforced".to_string(),
                    ))
                } else {
                    Ok(raw)
                }
            }
        }
    }
}

impl Fetch for TcpFetcher {
    async fn fetch(&self, host: &HostIdentity) -> FetchResult {
        let raw = self.fetch_raw(host).await?;
        self.decrypt(host, raw)
    }
}
