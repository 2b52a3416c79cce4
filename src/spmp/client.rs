//! Caller side of SPMP: one connection per command.
//!
//! Mirrors the router: connect, write the request packet, decode the
//! response, disconnect. A daemon that rejects the request at the protocol
//! level closes the connection without writing anything, which surfaces
//! here as a decode failure on the closed stream.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;

use super::packet::Packet;

/// SPMP client bound to a socket path.
#[derive(Debug, Clone)]
pub struct SpmpClient {
    socket_path: PathBuf,
}

impl SpmpClient {
    /// Creates a client that will connect to `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    /// Performs one request/response exchange.
    pub async fn roundtrip(&self, request: &Packet) -> Result<Packet> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .await
            .with_context(|| {
                format!(
                    "connecting to daemon socket {} (is saged running?)",
                    self.socket_path.display()
                )
            })?;

        let bytes = request.encode().context("encoding request packet")?;
        stream
            .write_all(&bytes)
            .await
            .context("writing request packet")?;

        let response = Packet::decode(&mut stream)
            .await
            .context("decoding response packet")?;
        Ok(response)
    }
}
