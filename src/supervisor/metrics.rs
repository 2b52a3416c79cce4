//! Process resource metrics read from procfs.
//!
//! The sampler treats this as a platform capability: [`sample`] either
//! returns a full reading for a live pid or `None` when the process no
//! longer exists (or the platform has no procfs).
//!
//! CPU percentage is the lifetime average - total CPU time consumed
//! divided by wall time since the process was created - which matches how
//! the daemon's resource columns are defined.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// One resource reading for a pid.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessMetrics {
    /// Process name (comm).
    pub name: String,
    /// Lifetime-average CPU percentage.
    pub cpu_percent: f64,
    /// Resident memory as a percentage of total system memory.
    pub mem_percent: f32,
    /// Process creation time.
    pub started_at: SystemTime,
}

/// Reads metrics for `pid`, or `None` if the process does not exist.
#[cfg(target_os = "linux")]
pub fn sample(pid: u32) -> Option<ProcessMetrics> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;

    // Format: pid (comm) state ppid ... - comm may contain spaces and
    // parens, so split on the last ')'.
    let open = stat.find('(')?;
    let close = stat.rfind(')')?;
    let name = stat.get(open + 1..close)?.to_string();
    let rest: Vec<&str> = stat.get(close + 1..)?.split_whitespace().collect();

    // rest[0] is field 3 (state); utime/stime are fields 14/15,
    // starttime is field 22.
    let utime: u64 = rest.get(11)?.parse().ok()?;
    let stime: u64 = rest.get(12)?.parse().ok()?;
    let starttime: u64 = rest.get(19)?.parse().ok()?;

    let ticks_per_sec = clock_ticks_per_sec()?;
    let started_at =
        UNIX_EPOCH + Duration::from_secs(boot_time_secs()?) + ticks_to_duration(starttime, ticks_per_sec);

    let elapsed = SystemTime::now()
        .duration_since(started_at)
        .unwrap_or_default()
        .as_secs_f64();
    let cpu_secs = (utime + stime) as f64 / ticks_per_sec as f64;
    let cpu_percent = if elapsed > 0.0 {
        cpu_secs / elapsed * 100.0
    } else {
        0.0
    };

    Some(ProcessMetrics {
        name,
        cpu_percent,
        mem_percent: mem_percent(pid).unwrap_or(0.0),
        started_at,
    })
}

/// Non-Linux builds have no procfs; the sampler sees every process as
/// unobservable and leaves the record's metrics at their defaults.
#[cfg(not(target_os = "linux"))]
pub fn sample(_pid: u32) -> Option<ProcessMetrics> {
    None
}

#[cfg(target_os = "linux")]
fn clock_ticks_per_sec() -> Option<u64> {
    // SAFETY: sysconf with a valid name has no preconditions.
    let ticks = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    u64::try_from(ticks).ok().filter(|t| *t > 0)
}

#[cfg(target_os = "linux")]
fn ticks_to_duration(ticks: u64, ticks_per_sec: u64) -> Duration {
    Duration::from_secs_f64(ticks as f64 / ticks_per_sec as f64)
}

/// System boot time (`btime`) from `/proc/stat`, in epoch seconds.
#[cfg(target_os = "linux")]
fn boot_time_secs() -> Option<u64> {
    let stat = std::fs::read_to_string("/proc/stat").ok()?;
    stat.lines()
        .find_map(|line| line.strip_prefix("btime "))
        .and_then(|v| v.trim().parse().ok())
}

/// Resident set of `pid` as a percentage of MemTotal.
#[cfg(target_os = "linux")]
fn mem_percent(pid: u32) -> Option<f32> {
    let statm = std::fs::read_to_string(format!("/proc/{pid}/statm")).ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    // SAFETY: sysconf with a valid name has no preconditions.
    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    let page_size = u64::try_from(page_size).ok()?;

    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let total_kb: u64 = meminfo
        .lines()
        .find_map(|line| line.strip_prefix("MemTotal:"))?
        .trim()
        .trim_end_matches(" kB")
        .trim()
        .parse()
        .ok()?;
    if total_kb == 0 {
        return None;
    }

    Some((resident_pages * page_size) as f32 / (total_kb * 1024) as f32 * 100.0)
}

/// Renders a duration as `1h2m3s` / `4m5s` / `6s`, truncated to whole
/// seconds.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
