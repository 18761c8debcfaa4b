//! Minimal in-process agent for tests and offline demos.
//!
//! Speaks the agent's half of the protocol: accept one connection,
//! write the payload (optionally encrypted), close. Real agents live on
//! the monitored hosts; this one exists so fetcher and orchestrator
//! behavior can be exercised against a loopback listener.

use crate::crypto;
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tracing::debug;

/// Serve `payload` to the next client that connects, then close.
pub async fn serve_once(listener: TcpListener, payload: Vec<u8>) -> io::Result<()> {
    let (mut socket, peer) = listener.accept().await?;
    debug!(%peer, bytes = payload.len(), "simulated agent serving payload");
    socket.write_all(&payload).await?;
    socket.shutdown().await
}

/// Like [`serve_once`], but encrypt the payload with `secret` first.
pub async fn serve_once_encrypted(
    listener: TcpListener,
    payload: &[u8],
    secret: &str,
) -> io::Result<()> {
    let frame = crypto::encrypt_payload(payload, secret)
        .map_err(|err| io::Error::other(err.to_string()))?;
    serve_once(listener, frame).await
}
