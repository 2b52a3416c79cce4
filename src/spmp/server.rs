//! Unix domain socket server for the daemon side of SPMP.
//!
//! Binds the well-known socket path and hands every accepted connection to
//! the [`CommandRouter`] on its own task. Connections are independent and
//! unbounded - acceptable for a low-volume operator tool on a private
//! socket, not hardened against abuse.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::UnixListener;

use super::router::CommandRouter;

/// SPMP transport server.
#[derive(Debug)]
pub struct SpmpServer {
    socket_path: PathBuf,
    router: Arc<CommandRouter>,
}

impl SpmpServer {
    /// Creates a server that will listen at `socket_path`.
    pub fn new(socket_path: impl Into<PathBuf>, router: Arc<CommandRouter>) -> Self {
        Self {
            socket_path: socket_path.into(),
            router,
        }
    }

    /// Path of the socket file.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Binds the socket and runs the accept loop until an accept error.
    ///
    /// A socket file left at the path is removed unconditionally before
    /// binding; there is no liveness check on a previous daemon instance,
    /// so two concurrently started daemons race for the path. An accept
    /// failure is fatal and propagated to the caller.
    pub async fn run(&self) -> Result<()> {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e).with_context(|| {
                    format!("removing stale socket {}", self.socket_path.display())
                });
            }
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating socket directory {}", parent.display()))?;
        }

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("binding socket {}", self.socket_path.display()))?;

        // Owner-only: filesystem permissions are the only access control.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        log::info!("spmp server listening on {}", self.socket_path.display());

        loop {
            let (stream, _addr) = listener
                .accept()
                .await
                .context("accepting spmp connection")?;
            let router = Arc::clone(&self.router);
            tokio::spawn(async move {
                router.serve(stream).await;
            });
        }
    }
}

impl Drop for SpmpServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spmp::packet::{command, encoding, Packet, V1};
    use crate::spmp::router::{Handler, Request, ResponseWriter};
    use anyhow::Result;
    use async_trait::async_trait;
    use std::time::Duration;

    struct PingHandler;

    #[async_trait]
    impl Handler for PingHandler {
        async fn handle(&self, _req: &Request, writer: &mut dyn ResponseWriter) -> Result<()> {
            writer.write(encoding::TEXT, command::LIST, b"pong").await
        }
    }

    #[tokio::test]
    async fn test_accepts_and_routes_connections() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sock_path = tmp.path().join("sage-test.sock");

        let mut router = CommandRouter::new();
        router.register(command::LIST, Arc::new(PingHandler));
        let server = Arc::new(SpmpServer::new(&sock_path, Arc::new(router)));

        let server_task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };

        // Wait for the socket file to appear.
        for _ in 0..50 {
            if sock_path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let mut stream = tokio::net::UnixStream::connect(&sock_path).await.unwrap();
        let request = Packet::new(V1, encoding::TEXT, command::LIST, Vec::new()).unwrap();
        use tokio::io::AsyncWriteExt;
        stream.write_all(&request.encode().unwrap()).await.unwrap();

        let response = tokio::time::timeout(Duration::from_secs(2), Packet::decode(&mut stream))
            .await
            .expect("timed out waiting for response")
            .unwrap();
        assert_eq!(response.payload, b"pong");

        server_task.abort();
    }

    #[tokio::test]
    async fn test_stale_socket_file_is_replaced() {
        let tmp = tempfile::TempDir::new().unwrap();
        let sock_path = tmp.path().join("sage-test.sock");
        std::fs::write(&sock_path, b"stale").unwrap();

        let mut router = CommandRouter::new();
        router.register(command::LIST, Arc::new(PingHandler));
        let server = Arc::new(SpmpServer::new(&sock_path, Arc::new(router)));

        let server_task = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.run().await })
        };

        for _ in 0..50 {
            if tokio::net::UnixStream::connect(&sock_path).await.is_ok() {
                server_task.abort();
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("server never came up over the stale socket file");
    }
}
