//! SPMP - the framed binary protocol between `sagectl` and `saged`.
//!
//! One request/response exchange per connection over a Unix domain socket:
//! connect, write one packet, read one packet, disconnect. The protocol is
//! not persistent or multiplexed.
//!
//! # Architecture
//!
//! ```text
//! sagectl process                        saged process
//! ┌──────────────────┐                  ┌──────────────────┐
//! │ SpmpClient       │                  │ SpmpServer       │
//! │  UnixStream      │◄────────────────►│  UnixListener    │
//! │  one packet each │  SPMP packets    │  task per conn   │
//! │  way             │  over the socket │                  │
//! └──────────────────┘                  └────────┬─────────┘
//!                                                │ CommandRouter
//!                                                ▼
//!                                          command handlers
//! ```
//!
//! # Wire Format
//!
//! Fixed 10-byte big-endian header followed by the payload:
//!
//! ```text
//! [magic "SG": 2] [version: 1] [encoding: 2] [command: 1] [payload len: 4 BE] [payload]
//! ```
//!
//! See [`packet`] for header constants and the codec.

pub mod client;
pub mod packet;
pub mod router;
pub mod server;

pub use client::SpmpClient;
pub use packet::{Packet, ProtocolError};
pub use router::{CommandRouter, ConnWriter, Handler, Request, ResponseWriter};
pub use server::SpmpServer;
