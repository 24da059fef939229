//! # Utility Functions and Helper Module
//!
//! Host fact collection for report metadata, plus small formatting helpers
//! used in log output.
//!
//! ## Host facts
//!
//! The readers below pull the facts that end up in the report's `metadata`
//! envelope. They never fail: a missing or unreadable source yields `None`
//! (or an empty map), and the parsing is limited to extracting known fields.
//! Parsing is split from file access so it can be tested against fixed
//! input.
//!
//! ## Usage Examples
//!
//! ```rust
//! use tailleur::utils::*;
//! use std::time::Duration;
//!
//! assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
//! assert_eq!(parse_meminfo_total_mib("MemTotal:       2048 kB\n"), Some(2.0));
//! ```

use crate::results::PlatformInfo;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

pub const CPU_ONLINE_PATH: &str = "/sys/devices/system/cpu/online";
pub const CPU_POSSIBLE_PATH: &str = "/sys/devices/system/cpu/possible";
pub const CPUINFO_PATH: &str = "/proc/cpuinfo";
pub const MEMINFO_PATH: &str = "/proc/meminfo";
pub const OS_RELEASE_PATH: &str = "/etc/os-release";

/// Generate a unique identifier for a suite run
///
/// Creates a UUID v4 string stamped into the report metadata so reports
/// from repeated invocations on the same host can be told apart.
pub fn generate_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Format a duration in a human-readable way
///
/// Picks the largest unit that keeps the value readable:
///
/// - **Nanoseconds**: < 1,000 ns (e.g., "500ns")
/// - **Microseconds**: < 1,000,000 ns (e.g., "1.50μs")
/// - **Milliseconds**: < 1,000,000,000 ns (e.g., "25.75ms")
/// - **Seconds**: < 60 seconds (e.g., "5.25s")
/// - **Minutes and Hours**: for longer durations (e.g., "5m 30s", "2h 15m 30s")
///
/// ```rust
/// # use tailleur::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_nanos(1250)), "1.25μs");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

fn read_to_string(path: impl AsRef<Path>) -> Option<String> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            debug!("Host fact source {} unavailable: {}", path.display(), e);
            None
        }
    }
}

/// First line of a file, trimmed.
pub fn read_first_line(path: impl AsRef<Path>) -> Option<String> {
    read_to_string(path).and_then(|content| content.lines().next().map(|l| l.trim().to_string()))
}

/// CPU model name from `/proc/cpuinfo`.
pub fn read_processor_model() -> Option<String> {
    read_to_string(CPUINFO_PATH).and_then(|content| parse_cpuinfo_model(&content))
}

/// Total memory in MiB from `/proc/meminfo`.
pub fn read_memory_mib() -> Option<f64> {
    read_to_string(MEMINFO_PATH).and_then(|content| parse_meminfo_total_mib(&content))
}

/// Key/value facts from `/etc/os-release`.
pub fn read_os_release() -> BTreeMap<String, String> {
    read_to_string(OS_RELEASE_PATH)
        .map(|content| parse_os_release(&content))
        .unwrap_or_default()
}

pub fn parse_cpuinfo_model(content: &str) -> Option<String> {
    content
        .lines()
        .find(|l| l.starts_with("model name"))
        .and_then(|l| l.split(':').nth(1))
        .map(|s| s.trim().to_string())
}

pub fn parse_meminfo_total_mib(content: &str) -> Option<f64> {
    content
        .lines()
        .find(|l| l.starts_with("MemTotal:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb as f64 / 1024.0)
}

/// Parse `KEY=value` lines; surrounding double quotes are stripped.
/// Comments, blank lines and lines without `=` are ignored.
pub fn parse_os_release(content: &str) -> BTreeMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| (k.to_string(), v.trim_matches('"').to_string()))
        .collect()
}

/// Platform identification from `uname(2)`.
#[cfg(unix)]
pub fn platform_info() -> PlatformInfo {
    match nix::sys::utsname::uname() {
        Ok(uts) => PlatformInfo {
            system: uts.sysname().to_string_lossy().into_owned(),
            node: uts.nodename().to_string_lossy().into_owned(),
            release: uts.release().to_string_lossy().into_owned(),
            version: uts.version().to_string_lossy().into_owned(),
            machine: uts.machine().to_string_lossy().into_owned(),
            processor: std::env::consts::ARCH.to_string(),
        },
        Err(e) => {
            debug!("uname failed: {}", e);
            fallback_platform_info()
        }
    }
}

#[cfg(not(unix))]
pub fn platform_info() -> PlatformInfo {
    fallback_platform_info()
}

fn fallback_platform_info() -> PlatformInfo {
    PlatformInfo {
        system: std::env::consts::OS.to_string(),
        machine: std::env::consts::ARCH.to_string(),
        processor: std::env::consts::ARCH.to_string(),
        ..Default::default()
    }
}
