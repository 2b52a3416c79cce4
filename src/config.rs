//! Configuration loading for the daemon.
//!
//! A JSON document read once at startup declares every service the daemon
//! is permitted to run. The snapshot is read-only afterwards; there is no
//! reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::constants::{CONFIG_ENV, DEFAULT_CONFIG_PATH};

/// One configured service: a named command the daemon may spawn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Unique service name (the registry key).
    pub name: String,
    /// Executable to run.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory for the child; inherited from the daemon if unset.
    #[serde(default, rename = "workingDir")]
    pub working_dir: Option<PathBuf>,
    /// Environment overlay applied on top of the daemon's environment.
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl ServiceDefinition {
    /// Full command line, for display.
    pub fn command_line(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

/// On-disk shape of the configuration file.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    services: Vec<ServiceDefinition>,
}

/// Read-only snapshot of the configured services, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Service definitions keyed by service name.
    pub services: HashMap<String, ServiceDefinition>,
}

impl Config {
    /// Resolves the configuration path: `SAGE_CONFIG` env var if set,
    /// otherwise `./config.json`.
    pub fn default_path() -> PathBuf {
        std::env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Loads and parses the configuration file at `path`.
    ///
    /// Entries sharing a name are keyed last-wins; each shadowed entry is
    /// logged so the misconfiguration is visible.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let file: ConfigFile = serde_json::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        let mut services = HashMap::with_capacity(file.services.len());
        for svc in file.services {
            if let Some(shadowed) = services.insert(svc.name.clone(), svc) {
                log::warn!(
                    "duplicate service name '{}' in {}; keeping the later entry",
                    shadowed.name,
                    path.display()
                );
            }
        }

        Ok(Self { services })
    }

    /// Looks up a service definition by name.
    pub fn service(&self, name: &str) -> Option<&ServiceDefinition> {
        self.services.get(name)
    }
}
