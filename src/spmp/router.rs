//! Command routing: one decoded request, one handler, one connection.
//!
//! The router owns an instance-scoped table from command type byte to
//! handler, populated at daemon startup. Protocol failures (a packet that
//! does not decode, or a type with no handler) close the connection
//! without a response; the caller observes the closed stream. Domain
//! failures never reach this layer - handlers report them inside normal
//! response envelopes.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::packet::{Packet, V1};

/// One decoded request packet.
#[derive(Debug)]
pub struct Request {
    /// The packet as read off the wire.
    pub packet: Packet,
}

/// Sink for response packets, abstracted over the open transport.
///
/// Implemented for a live connection by [`ConnWriter`]; tests implement it
/// over an in-memory buffer.
#[async_trait]
pub trait ResponseWriter: Send {
    /// Builds a V1 packet from the given encoding/command/payload and
    /// writes it to the transport.
    async fn write(&mut self, encoding: &str, command: u8, payload: &[u8]) -> Result<()>;
}

/// [`ResponseWriter`] bound to a live connection.
pub struct ConnWriter<W> {
    stream: W,
}

impl<W> ConnWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Wraps an open write transport.
    pub fn new(stream: W) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl<W> ResponseWriter for ConnWriter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, encoding: &str, command: u8, payload: &[u8]) -> Result<()> {
        let packet = Packet::new(V1, encoding, command, payload.to_vec())?;
        let bytes = packet.encode()?;
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// A registered command handler.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles one decoded request, writing zero or more response packets.
    async fn handle(&self, req: &Request, writer: &mut dyn ResponseWriter) -> Result<()>;
}

/// Table-driven dispatcher from command type byte to handler.
#[derive(Default)]
pub struct CommandRouter {
    handlers: HashMap<u8, Arc<dyn Handler>>,
}

impl CommandRouter {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Binds a handler to a command type.
    ///
    /// A later registration for the same type replaces the earlier one.
    pub fn register(&mut self, command: u8, handler: Arc<dyn Handler>) {
        self.handlers.insert(command, handler);
    }

    /// Drives one request/response exchange on an accepted connection.
    ///
    /// Decodes exactly one packet. If decoding fails or no handler is
    /// registered for the command type, the connection is dropped without
    /// a response and the reason is logged. Otherwise the handler runs
    /// with a writer bound to the same connection; the connection closes
    /// when this returns.
    pub async fn serve<S>(&self, mut stream: S)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let packet = match Packet::decode(&mut stream).await {
            Ok(packet) => packet,
            Err(e) => {
                log::warn!("[spmp] dropping connection: {e}");
                return;
            }
        };

        let Some(handler) = self.handlers.get(&packet.command) else {
            log::warn!(
                "[spmp] dropping connection: no handler for command type 0x{:02x}",
                packet.command
            );
            return;
        };

        let request = Request { packet };
        let mut writer = ConnWriter::new(stream);
        if let Err(e) = handler.handle(&request, &mut writer).await {
            log::error!(
                "[spmp] handler for command type 0x{:02x} failed: {e:#}",
                request.packet.command
            );
        }
    }
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("commands", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
