//! Sage - local service supervisor.
//!
//! This crate provides the shared functionality for the two sage binaries:
//! `saged`, the background daemon that owns a set of configured child
//! processes, and `sagectl`, the operator CLI that talks to it.
//!
//! # Architecture
//!
//! The daemon and client speak SPMP, a small framed binary protocol, over
//! a Unix domain socket:
//!
//! - **spmp** - Packet codec, command router, transport server, client
//! - **supervisor** - Process registry: spawn, sample, stop, reap
//! - **config** - Service definitions loaded once at daemon startup
//! - **envelope** - Status/message/data responses carried inside packets
//!
//! # Modules
//!
//! - [`spmp`] - Wire protocol and transport
//! - [`supervisor`] - Managed process lifecycle
//! - [`daemon`] - Command handlers wiring the router to the supervisor
//! - [`table`] - Plain-text table rendering for `sagectl list`

pub mod config;
pub mod constants;
pub mod daemon;
pub mod envelope;
pub mod logging;
pub mod spmp;
pub mod supervisor;
pub mod table;

// Re-export commonly used types
pub use config::{Config, ServiceDefinition};
pub use envelope::{ListEntry, Response};
pub use supervisor::Supervisor;
