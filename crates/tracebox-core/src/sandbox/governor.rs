//! Process resource ceilings applied inside the worker.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Ceilings carried to the worker in its request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Address-space ceiling (`RLIMIT_AS`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_bytes: Option<u64>,
    /// CPU-time ceiling (`RLIMIT_CPU`), a backstop behind the host's wall clock.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_limit_secs: Option<u64>,
}

impl ResourceLimits {
    /// CPU seconds allowed for a wall-clock budget: `ceil(timeout) + 1`.
    pub fn cpu_secs_for_timeout(timeout_ms: u64) -> u64 {
        timeout_ms.div_ceil(1000) + 1
    }
}

/// Which ceilings actually took effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GovernorReport {
    pub memory_applied: bool,
    pub cpu_applied: bool,
}

/// Applies [`ResourceLimits`] to the current process.
///
/// Best effort: a ceiling that cannot be set is logged and skipped, and
/// execution continues without it. Nothing is monitored afterwards.
pub struct ResourceGovernor;

impl ResourceGovernor {
    pub fn apply(limits: &ResourceLimits) -> GovernorReport {
        let mut report = GovernorReport::default();

        if let Some(bytes) = limits.memory_limit_bytes {
            match set_memory_limit(bytes) {
                Ok(()) => report.memory_applied = true,
                Err(err) => warn!(limit_bytes = bytes, error = %err, "memory ceiling not applied"),
            }
        }
        if let Some(secs) = limits.cpu_limit_secs {
            match set_cpu_limit(secs) {
                Ok(()) => report.cpu_applied = true,
                Err(err) => warn!(limit_secs = secs, error = %err, "cpu ceiling not applied"),
            }
        }

        debug!(
            memory_applied = report.memory_applied,
            cpu_applied = report.cpu_applied,
            "resource governor applied"
        );
        report
    }
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn set_memory_limit(bytes: u64) -> std::io::Result<()> {
    share_main_arena();
    let value = bytes as libc::rlim_t;
    let limit = libc::rlimit {
        rlim_cur: value,
        rlim_max: value,
    };
    // SAFETY: `limit` is a valid, initialised rlimit for the duration of the call.
    if unsafe { libc::setrlimit(libc::RLIMIT_AS, &limit) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Route every thread's allocations through the main malloc arena.
///
/// glibc otherwise reserves a 64 MiB arena per allocating thread, which
/// alone exceeds the default address-space ceiling.
#[cfg(all(target_os = "linux", target_env = "gnu"))]
fn share_main_arena() {
    // SAFETY: mallopt only tunes the allocator; the worker calls this before it starts the evaluation thread.
    if unsafe { libc::mallopt(libc::M_ARENA_MAX, 1) } == 0 {
        warn!("could not restrict malloc arenas");
    }
}

#[cfg(all(any(target_os = "linux", target_os = "android"), not(target_env = "gnu")))]
fn share_main_arena() {}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn set_memory_limit(_bytes: u64) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "address-space limits are not supported on this platform",
    ))
}

#[cfg(unix)]
fn set_cpu_limit(secs: u64) -> std::io::Result<()> {
    let value = secs as libc::rlim_t;
    let limit = libc::rlimit {
        rlim_cur: value,
        rlim_max: value,
    };
    // SAFETY: `limit` is a valid, initialised rlimit for the duration of the call.
    if unsafe { libc::setrlimit(libc::RLIMIT_CPU, &limit) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
fn set_cpu_limit(_secs: u64) -> std::io::Result<()> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        "cpu limits are not supported on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cpu_secs_for_timeout() {
        assert_eq!(ResourceLimits::cpu_secs_for_timeout(2000), 3);
        assert_eq!(ResourceLimits::cpu_secs_for_timeout(2001), 4);
        assert_eq!(ResourceLimits::cpu_secs_for_timeout(1), 2);
        assert_eq!(ResourceLimits::cpu_secs_for_timeout(0), 1);
    }

    #[test]
    fn test_no_limits_applies_nothing() {
        let report = ResourceGovernor::apply(&ResourceLimits::default());
        assert_eq!(report, GovernorReport::default());
    }

    #[test]
    fn test_limits_serialization_omits_absent_fields() {
        let json = serde_json::to_value(ResourceLimits::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));

        let limits = ResourceLimits {
            memory_limit_bytes: Some(1024),
            cpu_limit_secs: Some(3),
        };
        let back: ResourceLimits =
            serde_json::from_str(&serde_json::to_string(&limits).unwrap()).unwrap();
        assert_eq!(back, limits);
    }
}
