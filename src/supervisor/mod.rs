//! Process supervisor: the daemon's registry of running services.
//!
//! The registry - a locked map from service name to
//! [`RunningProcessRecord`] - is the only mutable shared state in the
//! daemon. Every operation (start, stop, list, sampler update, waiter
//! cleanup) goes through the same lock, and at most one record exists per
//! service name at any time.
//!
//! Each running service has two background tasks observing one shared
//! cancellation token:
//!
//! - the **sampler** refreshes the record's CPU/memory/uptime every
//!   [`SAMPLE_INTERVAL`](crate::constants::SAMPLE_INTERVAL);
//! - the **waiter** owns the child handle, reaps the process when it
//!   exits on its own and removes its record.
//!
//! The token is one-shot and broadcast: a stop cancels it once, both
//! tasks observe it, and it is discarded with the record - a later start
//! gets a fresh one.

pub mod metrics;

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ServiceDefinition};
use crate::constants::SAMPLE_INTERVAL;
use crate::envelope::ListEntry;

/// In-memory state for one currently-running service instance.
#[derive(Debug)]
pub struct RunningProcessRecord {
    /// OS process id of the spawned child.
    pub pid: u32,
    /// Observed process name, refreshed by the sampler.
    pub pname: String,
    /// Logical service name.
    pub name: String,
    /// Command line the child runs.
    pub cmd: String,
    /// Human-readable uptime from the last sample.
    pub uptime: String,
    /// CPU percentage from the last sample.
    pub cpu_percent: f64,
    /// Memory percentage from the last sample.
    pub mem_percent: f32,
    /// One-shot stop signal shared by the sampler and the waiter.
    cancel: CancellationToken,
}

type Registry = Arc<Mutex<HashMap<String, RunningProcessRecord>>>;

/// Owner of the registry; exposes the four supervisor operations.
///
/// The raw map never leaves this type - all mutation happens behind the
/// method boundary, under the single registry lock.
#[derive(Debug)]
pub struct Supervisor {
    config: Arc<Config>,
    registry: Registry,
    log_dir: PathBuf,
}

impl Supervisor {
    /// Creates a supervisor over a configuration snapshot.
    ///
    /// `log_dir` receives one append-only `<service>.log` per managed
    /// service.
    pub fn new(config: Arc<Config>, log_dir: PathBuf) -> Self {
        Self {
            config,
            registry: Arc::new(Mutex::new(HashMap::new())),
            log_dir,
        }
    }

    /// Starts a configured service.
    ///
    /// Refuses (rather than restarts) if a record already exists for the
    /// name. The registry lock is held from the duplicate check through
    /// record insertion - the spawn itself is synchronous - so two
    /// concurrent starts for the same name can never both spawn.
    ///
    /// # Errors
    ///
    /// Domain failures: unknown service name, already running, log
    /// directory or spawn failure. None of these leave a registry entry.
    pub fn start_service(&self, name: &str) -> Result<String> {
        let Some(def) = self.config.service(name) else {
            bail!("'{name}': service name doesn't exist");
        };

        std::fs::create_dir_all(&self.log_dir)
            .with_context(|| format!("creating service log dir {}", self.log_dir.display()))?;

        let mut registry = self.registry.lock().expect("registry lock poisoned");
        if registry.contains_key(name) {
            bail!("service '{name}' is already running");
        }

        let mut cmd = Command::new(&def.command);
        cmd.args(&def.args)
            .envs(&def.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &def.working_dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning service '{name}' ({})", def.command))?;
        let pid = child.id().unwrap_or(0);

        let log_path = self.log_dir.join(format!("{name}.log"));
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(stream_output(stdout, "stdout", name.to_string(), log_path.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(stream_output(stderr, "stderr", name.to_string(), log_path));
        }

        let cancel = CancellationToken::new();
        registry.insert(
            name.to_string(),
            RunningProcessRecord {
                pid,
                pname: name.to_string(),
                name: name.to_string(),
                cmd: def.command_line(),
                uptime: "0s".to_string(),
                cpu_percent: 0.0,
                mem_percent: 0.0,
                cancel: cancel.clone(),
            },
        );
        drop(registry);

        tokio::spawn(sampler_task(
            Arc::clone(&self.registry),
            name.to_string(),
            pid,
            cancel.clone(),
        ));
        tokio::spawn(waiter_task(
            Arc::clone(&self.registry),
            name.to_string(),
            pid,
            child,
            cancel,
        ));

        log::info!("started service '{name}' with PID {pid}");
        Ok(format!("service '{name}' started with PID {pid}"))
    }

    /// Stops a running service.
    ///
    /// Triggers the record's cancellation token, sends SIGKILL to the
    /// recorded pid best-effort, and removes the record - the removal
    /// happens even if the kill errors. The waiter's cancellation branch
    /// reaps the child.
    pub fn stop_service(&self, name: &str) -> Result<String> {
        if self.config.service(name).is_none() {
            bail!("service '{name}' not found in configuration");
        }

        let record = {
            let mut registry = self.registry.lock().expect("registry lock poisoned");
            registry.remove(name)
        };
        let Some(record) = record else {
            bail!("service '{name}' is not running");
        };

        record.cancel.cancel();
        if record.pid > 0 {
            // SAFETY: plain kill(2) on a pid we spawned; worst case is ESRCH
            // if the process already exited.
            let rc = unsafe { libc::kill(record.pid as i32, libc::SIGKILL) };
            if rc != 0 {
                log::warn!(
                    "kill({}) for service '{name}' failed: {}",
                    record.pid,
                    std::io::Error::last_os_error()
                );
            }
        }

        log::info!("stopped service '{name}' (PID {})", record.pid);
        Ok(format!("service '{name}' stopped"))
    }

    /// One entry per configured service, running or not.
    ///
    /// Entry order follows the configuration map's iteration order.
    pub fn list_services(&self) -> Vec<ListEntry> {
        let registry = self.registry.lock().expect("registry lock poisoned");
        self.config
            .services
            .iter()
            .map(|(name, def)| entry_for(name, def, registry.get(name)))
            .collect()
    }

    /// Status entry for a single configured service.
    ///
    /// # Errors
    ///
    /// Fails if the name is not in the configuration.
    pub fn service_status(&self, name: &str) -> Result<ListEntry> {
        let Some(def) = self.config.service(name) else {
            bail!("'{name}': service name doesn't exist");
        };
        let registry = self.registry.lock().expect("registry lock poisoned");
        Ok(entry_for(name, def, registry.get(name)))
    }
}

fn entry_for(
    name: &str,
    def: &ServiceDefinition,
    record: Option<&RunningProcessRecord>,
) -> ListEntry {
    match record {
        Some(rec) => ListEntry {
            pid: rec.pid,
            pname: rec.pname.clone(),
            name: rec.name.clone(),
            cmd: rec.cmd.clone(),
            status: "online".to_string(),
            uptime: rec.uptime.clone(),
            cpu_percent: rec.cpu_percent,
            mem_percent: rec.mem_percent,
        },
        None => ListEntry {
            pid: 0,
            pname: name.to_string(),
            name: name.to_string(),
            cmd: def.command_line(),
            status: "offline".to_string(),
            uptime: "0s".to_string(),
            cpu_percent: 0.0,
            mem_percent: 0.0,
        },
    }
}

/// Copies one child output stream to the service's log file, one tagged
/// line at a time.
async fn stream_output<R>(reader: R, label: &'static str, service: String, path: PathBuf)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut file = match tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            log::error!("opening log file {} for '{service}': {e}", path.display());
            return;
        }
    };

    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let entry = format!("[{label}][{service}] {line}\n");
        if let Err(e) = file.write_all(entry.as_bytes()).await {
            log::error!("writing log file {} for '{service}': {e}", path.display());
            return;
        }
    }
}

/// Periodically refreshes one record's resource fields.
///
/// Stops silently when the process can no longer be sampled - removing
/// the record is the waiter's job. The update re-looks the record up by
/// name and checks the pid, so a sample that loses the race against a
/// stop (or a stop-then-start) is discarded rather than written onto the
/// wrong record.
async fn sampler_task(registry: Registry, name: String, pid: u32, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(SAMPLE_INTERVAL);
    ticker.tick().await; // the first tick completes immediately

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }

        let Some(m) = metrics::sample(pid) else {
            log::debug!("sampler for '{name}' (PID {pid}): process gone, stopping");
            return;
        };
        let uptime = SystemTime::now()
            .duration_since(m.started_at)
            .unwrap_or_default();

        let mut reg = registry.lock().expect("registry lock poisoned");
        if let Some(rec) = reg.get_mut(&name) {
            if rec.pid == pid {
                rec.pname = m.name;
                rec.cpu_percent = m.cpu_percent;
                rec.mem_percent = m.mem_percent;
                rec.uptime = metrics::format_uptime(uptime);
            }
        }
    }
}

/// Owns the child handle; reaps the process and cleans up the registry.
///
/// On natural exit (any status, or a wait error) the record is removed
/// under the lock. If the cancellation token fires first, a stop has
/// already removed the record - the waiter only makes sure the child is
/// killed and reaped.
async fn waiter_task(
    registry: Registry,
    name: String,
    pid: u32,
    mut child: Child,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            log::info!("service '{name}' (PID {pid}) terminated on stop");
        }
        status = child.wait() => {
            match status {
                Ok(s) if s.success() => {
                    log::info!("service '{name}' (PID {pid}) exited normally");
                }
                Ok(s) => {
                    log::warn!("service '{name}' (PID {pid}) exited with {s}");
                }
                Err(e) => {
                    log::warn!("service '{name}' (PID {pid}) wait failed: {e}");
                }
            }
            let mut reg = registry.lock().expect("registry lock poisoned");
            if reg.get(&name).is_some_and(|rec| rec.pid == pid) {
                reg.remove(&name);
            }
        }
    }
}
