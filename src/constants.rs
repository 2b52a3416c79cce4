//! Application-wide constants for sage.
//!
//! Centralizes paths, intervals and limits shared by the daemon and the
//! client so the well-known locations live in exactly one place.

use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Transport
// ============================================================================

/// Well-known Unix domain socket path the daemon listens on.
///
/// `sagectl` connects here; a stale file left by a previous daemon run is
/// removed unconditionally before binding.
pub const SOCKET_PATH: &str = "/tmp/sage.sock";

// ============================================================================
// Configuration
// ============================================================================

/// Environment variable overriding the configuration file path.
pub const CONFIG_ENV: &str = "SAGE_CONFIG";

/// Default configuration file path when neither the `--config` flag nor
/// [`CONFIG_ENV`] is set.
pub const DEFAULT_CONFIG_PATH: &str = "./config.json";

// ============================================================================
// Supervisor
// ============================================================================

/// Interval between resource samples of a running managed process.
pub const SAMPLE_INTERVAL: Duration = Duration::from_secs(5);

// ============================================================================
// Logging
// ============================================================================

/// Size at which the daemon log is rotated.
pub const LOG_MAX_SIZE: u64 = 5 * 1024 * 1024;

/// Number of rotated daemon log backups kept (`saged.log.1` .. `.N`).
pub const LOG_BACKUPS: u32 = 3;

/// Base directory for sage state (`~/.sage`).
///
/// Falls back to a relative `.sage` if the home directory cannot be
/// determined, so the daemon still comes up in stripped-down environments.
pub fn sage_home() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".sage"))
        .unwrap_or_else(|| PathBuf::from(".sage"))
}

/// Directory holding the per-service stdout/stderr logs.
pub fn service_log_dir() -> PathBuf {
    sage_home().join("logs")
}

/// Path of the daemon's own rotating log file.
pub fn daemon_log_path() -> PathBuf {
    sage_home().join("saged.log")
}
