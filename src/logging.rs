//! Daemon log file setup with startup rotation.
//!
//! The daemon writes its own log to a file under the sage home directory.
//! At startup, if the current file has reached [`LOG_MAX_SIZE`], the
//! numbered backups shift up (`saged.log.1` becomes `saged.log.2`, and so
//! on) and the current file becomes `saged.log.1`. At most [`LOG_BACKUPS`]
//! backups are kept; the oldest is discarded. Rotation only happens at
//! startup, not while the daemon runs.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use env_logger::{Env, Target};

use crate::constants::{LOG_BACKUPS, LOG_MAX_SIZE};

/// Initializes the global logger writing to `log_path`, rotating first
/// if the file is already at the size cap.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`.
pub fn init_daemon_logging(log_path: &Path) -> Result<()> {
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    rotate_if_full(log_path)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("opening daemon log {}", log_path.display()))?;

    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_secs()
        .init();
    Ok(())
}

/// Shifts backups up and renames the current file to `.1` if it has
/// reached the size cap. Missing backups in the chain are skipped.
fn rotate_if_full(log_path: &Path) -> Result<()> {
    let Ok(meta) = fs::metadata(log_path) else {
        return Ok(());
    };
    if meta.len() < LOG_MAX_SIZE {
        return Ok(());
    }

    let _ = fs::remove_file(backup_path(log_path, LOG_BACKUPS));
    for n in (1..LOG_BACKUPS).rev() {
        let _ = fs::rename(backup_path(log_path, n), backup_path(log_path, n + 1));
    }
    fs::rename(log_path, backup_path(log_path, 1))
        .with_context(|| format!("rotating daemon log {}", log_path.display()))?;
    Ok(())
}

fn backup_path(log_path: &Path, n: u32) -> PathBuf {
    let mut name = log_path.as_os_str().to_os_string();
    name.push(format!(".{n}"));
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_skips_small_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log = tmp.path().join("saged.log");
        fs::write(&log, "short").unwrap();

        rotate_if_full(&log).unwrap();

        assert_eq!(fs::read_to_string(&log).unwrap(), "short");
        assert!(!backup_path(&log, 1).exists());
    }

    #[test]
    fn test_rotate_skips_missing_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        rotate_if_full(&tmp.path().join("saged.log")).unwrap();
    }

    #[test]
    fn test_rotate_shifts_full_file_to_first_backup() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log = tmp.path().join("saged.log");
        fs::write(&log, vec![b'x'; LOG_MAX_SIZE as usize]).unwrap();

        rotate_if_full(&log).unwrap();

        assert!(!log.exists());
        assert_eq!(
            fs::metadata(backup_path(&log, 1)).unwrap().len(),
            LOG_MAX_SIZE
        );
    }

    #[test]
    fn test_rotate_discards_oldest_backup() {
        let tmp = tempfile::TempDir::new().unwrap();
        let log = tmp.path().join("saged.log");
        fs::write(&log, vec![b'x'; LOG_MAX_SIZE as usize]).unwrap();
        for n in 1..=LOG_BACKUPS {
            fs::write(backup_path(&log, n), format!("gen{n}")).unwrap();
        }

        rotate_if_full(&log).unwrap();

        // gen3 dropped, gen2 -> .3, gen1 -> .2, full file -> .1
        assert_eq!(
            fs::read_to_string(backup_path(&log, LOG_BACKUPS)).unwrap(),
            format!("gen{}", LOG_BACKUPS - 1)
        );
        assert_eq!(fs::read_to_string(backup_path(&log, 2)).unwrap(), "gen1");
        assert_eq!(
            fs::metadata(backup_path(&log, 1)).unwrap().len(),
            LOG_MAX_SIZE
        );
    }
}
