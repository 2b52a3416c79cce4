//! Packet codec for the SPMP wire format.
//!
//! A packet is immutable once encoded and constructed fresh for every
//! request and response. The codec is strict in both directions: `encode`
//! re-checks the declared payload length, and `decode` validates the
//! header field by field before it reads a single payload byte.

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Magic bytes opening every packet.
pub const MAGIC: [u8; 2] = *b"SG";

/// Fixed header size: magic(2) + version(1) + encoding(2) + command(1) + len(4).
pub const HEADER_SIZE: usize = 10;

/// Protocol version 1, the only version currently supported.
pub const V1: u8 = 0x01;

/// Registered encoding tags.
pub mod encoding {
    /// Structured JSON payload.
    pub const JSON: &str = "JS";
    /// Plain text payload.
    pub const TEXT: &str = "TX";
}

/// Registered command type bytes.
pub mod command {
    /// List every configured service.
    pub const LIST: u8 = 0x01;
    /// Status of a single service.
    pub const STATUS: u8 = 0x02;
    /// Start a configured service.
    pub const START: u8 = 0x03;
    /// Stop a running service.
    pub const STOP: u8 = 0x04;
}

/// Protocol-level failures.
///
/// These never travel on the wire: the peer that hits one closes the
/// connection, and the other side observes the closed stream.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Encoding tag handed to [`Packet::new`] was not exactly two bytes.
    #[error("invalid encoding tag '{0}': must be exactly two bytes")]
    InvalidEncoding(String),

    /// Declared payload length diverged from the actual payload.
    #[error("payload size mismatch: declared {declared}, actual {actual}")]
    SizeMismatch {
        /// Length recorded in the header.
        declared: u32,
        /// Length of the payload buffer.
        actual: usize,
    },

    /// First two bytes were not the `SG` magic.
    #[error("bad magic bytes {0:02x?}")]
    BadMagic([u8; 2]),

    /// Version byte outside the supported set.
    #[error("unsupported protocol version 0x{0:02x}")]
    UnsupportedVersion(u8),

    /// Encoding tag not registered.
    #[error("unregistered encoding tag {0:02x?}")]
    BadEncoding([u8; 2]),

    /// Command type byte not registered.
    #[error("unknown command type 0x{0:02x}")]
    UnknownType(u8),

    /// Stream ended before the full header or declared payload arrived.
    #[error("short read: {0}")]
    ShortRead(#[source] std::io::Error),
}

fn is_registered_encoding(tag: &[u8; 2]) -> bool {
    tag == encoding::JSON.as_bytes() || tag == encoding::TEXT.as_bytes()
}

fn is_registered_command(cmd: u8) -> bool {
    matches!(
        cmd,
        command::LIST | command::STATUS | command::START | command::STOP
    )
}

/// One framed unit of the protocol: header plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Magic constant, always [`MAGIC`].
    pub magic: [u8; 2],
    /// Protocol version byte.
    pub version: u8,
    /// Two-byte encoding tag.
    pub encoding: [u8; 2],
    /// Command type byte.
    pub command: u8,
    /// Declared payload length.
    pub payload_len: u32,
    /// Payload bytes.
    pub payload: Vec<u8>,
}

impl Packet {
    /// Builds a packet, recording the payload length in the header.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::InvalidEncoding`] if the tag is not exactly two
    /// bytes. Membership in the registered tag set is checked at decode
    /// time, not here.
    pub fn new(
        version: u8,
        encoding: &str,
        command: u8,
        payload: Vec<u8>,
    ) -> Result<Self, ProtocolError> {
        let tag: [u8; 2] = encoding
            .as_bytes()
            .try_into()
            .map_err(|_| ProtocolError::InvalidEncoding(encoding.to_string()))?;

        Ok(Self {
            magic: MAGIC,
            version,
            encoding: tag,
            command,
            payload_len: payload.len() as u32,
            payload,
        })
    }

    /// Encoding tag as a string slice, for handlers that branch on it.
    pub fn encoding_tag(&self) -> &str {
        // Registered tags are ASCII; an unregistered tag never survives decode.
        std::str::from_utf8(&self.encoding).unwrap_or("??")
    }

    /// Encodes the packet into wire bytes.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::SizeMismatch`] if the declared payload length no
    /// longer matches the payload. The field is set correctly by
    /// [`Packet::new`], but the struct is plain data and can be mutated
    /// between construction and encode.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        if self.payload_len as usize != self.payload.len() {
            return Err(ProtocolError::SizeMismatch {
                declared: self.payload_len,
                actual: self.payload.len(),
            });
        }

        let mut buf = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        buf.extend_from_slice(&self.magic);
        buf.push(self.version);
        buf.extend_from_slice(&self.encoding);
        buf.push(self.command);
        buf.extend_from_slice(&self.payload_len.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    /// Decodes one packet from a byte stream.
    ///
    /// Reads exactly [`HEADER_SIZE`] bytes, validates magic, version,
    /// encoding and command type in that order, then reads exactly the
    /// declared payload length. Nothing is read past the packet.
    ///
    /// # Errors
    ///
    /// [`ProtocolError::ShortRead`] if the stream ends before the header
    /// or declared payload is complete, plus the per-field validation
    /// variants.
    pub async fn decode<R>(reader: &mut R) -> Result<Self, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        let mut header = [0u8; HEADER_SIZE];
        reader
            .read_exact(&mut header)
            .await
            .map_err(ProtocolError::ShortRead)?;

        let magic = [header[0], header[1]];
        if magic != MAGIC {
            return Err(ProtocolError::BadMagic(magic));
        }

        let version = header[2];
        if version != V1 {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        let encoding = [header[3], header[4]];
        if !is_registered_encoding(&encoding) {
            return Err(ProtocolError::BadEncoding(encoding));
        }

        let command = header[5];
        if !is_registered_command(command) {
            return Err(ProtocolError::UnknownType(command));
        }

        let payload_len = u32::from_be_bytes([header[6], header[7], header[8], header[9]]);
        let mut payload = vec![0u8; payload_len as usize];
        if payload_len > 0 {
            reader
                .read_exact(&mut payload)
                .await
                .map_err(ProtocolError::ShortRead)?;
        }

        Ok(Self {
            magic,
            version,
            encoding,
            command,
            payload_len,
            payload,
        })
    }
}
