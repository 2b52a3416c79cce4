//! Command handlers wiring the SPMP router to the process supervisor.
//!
//! Each handler completes a normal protocol exchange even when the
//! requested operation is refused: domain failures travel as failure
//! envelopes, never as protocol errors. Requests that name a service
//! carry the name as a TX-encoded payload; every response is a
//! JS-encoded [`Response`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::envelope::{ListEntry, Response};
use crate::spmp::packet::{command, encoding};
use crate::spmp::{CommandRouter, Handler, Request, ResponseWriter, SpmpServer};
use crate::supervisor::Supervisor;

/// Serializes an envelope and writes it as the response packet.
async fn respond<T: serde::Serialize>(
    writer: &mut dyn ResponseWriter,
    cmd: u8,
    envelope: &Response<T>,
) -> Result<()> {
    let payload = serde_json::to_vec(envelope)?;
    writer.write(encoding::JSON, cmd, &payload).await
}

/// Extracts the service name from a TX-encoded request payload.
///
/// Returns a failure message (for the envelope) if the encoding is wrong
/// or the name is missing.
fn service_name(req: &Request) -> std::result::Result<String, String> {
    if req.packet.encoding_tag() != encoding::TEXT {
        return Err(format!(
            "expected {}-encoded service name, got {}",
            encoding::TEXT,
            req.packet.encoding_tag()
        ));
    }
    let name = String::from_utf8_lossy(&req.packet.payload).trim().to_string();
    if name.is_empty() {
        return Err("missing service name".to_string());
    }
    Ok(name)
}

/// Handles `list`: one entry per configured service.
pub struct ListHandler(pub Arc<Supervisor>);

#[async_trait]
impl Handler for ListHandler {
    async fn handle(&self, _req: &Request, writer: &mut dyn ResponseWriter) -> Result<()> {
        let entries = self.0.list_services();
        let envelope = Response::ok("list fetched successfully", entries);
        respond(writer, command::LIST, &envelope).await
    }
}

/// Handles `status`: the entry for one named service.
pub struct StatusHandler(pub Arc<Supervisor>);

#[async_trait]
impl Handler for StatusHandler {
    async fn handle(&self, req: &Request, writer: &mut dyn ResponseWriter) -> Result<()> {
        let envelope = match service_name(req).and_then(|name| {
            self.0
                .service_status(&name)
                .map_err(|e| format!("{e:#}"))
        }) {
            Ok(entry) => Response::ok("status fetched successfully", vec![entry]),
            Err(msg) => Response::failed(msg, Vec::<ListEntry>::new()),
        };
        respond(writer, command::STATUS, &envelope).await
    }
}

/// Handles `start`.
pub struct StartHandler(pub Arc<Supervisor>);

#[async_trait]
impl Handler for StartHandler {
    async fn handle(&self, req: &Request, writer: &mut dyn ResponseWriter) -> Result<()> {
        let envelope = match service_name(req)
            .and_then(|name| self.0.start_service(&name).map_err(|e| format!("{e:#}")))
        {
            Ok(msg) => Response::ok(msg, String::new()),
            Err(msg) => Response::failed(msg, String::new()),
        };
        respond(writer, command::START, &envelope).await
    }
}

/// Handles `stop`.
pub struct StopHandler(pub Arc<Supervisor>);

#[async_trait]
impl Handler for StopHandler {
    async fn handle(&self, req: &Request, writer: &mut dyn ResponseWriter) -> Result<()> {
        let envelope = match service_name(req)
            .and_then(|name| self.0.stop_service(&name).map_err(|e| format!("{e:#}")))
        {
            Ok(msg) => Response::ok(msg, String::new()),
            Err(msg) => Response::failed(msg, String::new()),
        };
        respond(writer, command::STOP, &envelope).await
    }
}

/// Builds the daemon's command table over a supervisor.
pub fn build_router(supervisor: &Arc<Supervisor>) -> CommandRouter {
    let mut router = CommandRouter::new();
    router.register(command::LIST, Arc::new(ListHandler(Arc::clone(supervisor))));
    router.register(command::STATUS, Arc::new(StatusHandler(Arc::clone(supervisor))));
    router.register(command::START, Arc::new(StartHandler(Arc::clone(supervisor))));
    router.register(command::STOP, Arc::new(StopHandler(Arc::clone(supervisor))));
    router
}

/// Runs the daemon until the server fails or a shutdown signal arrives.
///
/// Registry state is not persisted: children still running when the
/// daemon exits are orphaned and never re-adopted.
pub async fn run(config: Config, socket_path: PathBuf, log_dir: PathBuf) -> Result<()> {
    let supervisor = Arc::new(Supervisor::new(Arc::new(config), log_dir));
    let router = Arc::new(build_router(&supervisor));
    let server = SpmpServer::new(socket_path, router);

    tokio::select! {
        res = server.run() => res,
        sig = shutdown_signal() => {
            sig?;
            log::info!("shutdown signal received, exiting");
            Ok(())
        }
    }
}

/// Completes when SIGINT or SIGTERM arrives.
async fn shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = terminate.recv() => {}
    }
    Ok(())
}
