//! Best-effort real-time elevation.
//!
//! Reduces scheduling jitter for the calling process:
//! - Memory locking (mlockall) to prevent page-fault latency spikes
//! - Real-time scheduling (SCHED_FIFO) at a role-specific priority
//!
//! Both steps are attempted exactly once, independently of each other.
//! Failures are reported as warnings with the platform error text and the
//! process continues with reduced timing precision.

use sbc_common::config::RealtimeConfig;
use std::fmt;
use std::io;
use tracing::{debug, info, warn};

/// How much of the real-time elevation succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivilegeStatus {
    /// Memory lock and real-time scheduling both active.
    Full,
    /// Exactly one of the two is active.
    Partial,
    /// Neither is active.
    None,
}

impl PrivilegeStatus {
    /// Classify the outcome of the two independent attempts.
    #[must_use]
    pub fn classify(memory_locked: bool, realtime_scheduling: bool) -> Self {
        match (memory_locked, realtime_scheduling) {
            (true, true) => Self::Full,
            (false, false) => Self::None,
            _ => Self::Partial,
        }
    }
}

impl fmt::Display for PrivilegeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full real-time"),
            Self::Partial => write!(f, "partial real-time"),
            Self::None => write!(f, "standard (no real-time)"),
        }
    }
}

/// The two privileged operations elevation relies on.
pub trait PrivilegeOps {
    /// Lock current and future pages into RAM.
    fn lock_memory(&self) -> io::Result<()>;

    /// Switch the calling process to SCHED_FIFO at `priority`.
    fn set_fifo_priority(&self, priority: u8) -> io::Result<()>;
}

/// Privileged operations backed by the running kernel.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPrivileges;

#[cfg(target_os = "linux")]
impl PrivilegeOps for SystemPrivileges {
    fn lock_memory(&self) -> io::Result<()> {
        use nix::sys::mman::{mlockall, MlockAllFlags};

        debug!("Locking memory pages with mlockall");
        mlockall(MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE).map_err(io::Error::from)
    }

    fn set_fifo_priority(&self, priority: u8) -> io::Result<()> {
        debug!(priority, "Setting SCHED_FIFO");
        let param = libc::sched_param {
            sched_priority: i32::from(priority),
        };

        // SAFETY: pid 0 targets the calling process and `param` outlives the call.
        let result = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
        if result == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(not(target_os = "linux"))]
impl PrivilegeOps for SystemPrivileges {
    fn lock_memory(&self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "mlockall not available on this platform",
        ))
    }

    fn set_fifo_priority(&self, _priority: u8) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "SCHED_FIFO not available on this platform",
        ))
    }
}

/// Outcome of [`elevate`], produced once at startup and never modified.
#[derive(Debug, Clone)]
pub struct PrivilegeReport {
    /// Classification of the two attempts.
    pub status: PrivilegeStatus,
    /// Whether memory was locked.
    pub memory_locked: bool,
    /// Applied SCHED_FIFO priority, if real-time scheduling succeeded.
    pub scheduler_priority: Option<u8>,
    /// Platform error text for a failed memory lock.
    pub memory_lock_error: Option<String>,
    /// Platform error text for a failed scheduler change.
    pub scheduler_error: Option<String>,
    /// Elevation was turned off in configuration.
    pub disabled: bool,
}

impl PrivilegeReport {
    fn disabled() -> Self {
        Self {
            status: PrivilegeStatus::None,
            memory_locked: false,
            scheduler_priority: None,
            memory_lock_error: None,
            scheduler_error: None,
            disabled: true,
        }
    }
}

/// Attempt memory locking and SCHED_FIFO elevation, in that order.
///
/// Never fails: every error is logged with its platform description and
/// folded into the returned [`PrivilegeReport`]. No retries are made.
pub fn elevate<O: PrivilegeOps>(ops: &O, config: &RealtimeConfig, priority: u8) -> PrivilegeReport {
    if !config.enabled {
        info!("Real-time elevation disabled in configuration; running in standard mode");
        return PrivilegeReport::disabled();
    }

    let (memory_locked, memory_lock_error) = if config.lock_memory {
        match ops.lock_memory() {
            Ok(()) => {
                info!("Memory locked (MCL_CURRENT | MCL_FUTURE)");
                (true, None)
            }
            Err(e) => {
                warn!(error = %e, "Memory lock failed; page faults may add latency");
                (false, Some(e.to_string()))
            }
        }
    } else {
        debug!("Memory locking disabled in configuration");
        (false, None)
    };

    let clamped = priority.clamp(1, 99);
    if clamped != priority {
        warn!(
            original = priority,
            clamped, "Scheduler priority clamped to valid range"
        );
    }

    let (scheduler_priority, scheduler_error) = match ops.set_fifo_priority(clamped) {
        Ok(()) => {
            info!(priority = clamped, "Real-time scheduling enabled (SCHED_FIFO)");
            (Some(clamped), None)
        }
        Err(e) => {
            warn!(error = %e, priority = clamped, "Real-time scheduling failed");
            (None, Some(e.to_string()))
        }
    };

    let report = PrivilegeReport {
        status: PrivilegeStatus::classify(memory_locked, scheduler_priority.is_some()),
        memory_locked,
        scheduler_priority,
        memory_lock_error,
        scheduler_error,
        disabled: false,
    };
    log_summary(&report);
    report
}

/// Elevate the current process using the kernel's privileged calls.
pub fn elevate_process(config: &RealtimeConfig, priority: u8) -> PrivilegeReport {
    elevate(&SystemPrivileges, config, priority)
}

fn log_summary(report: &PrivilegeReport) {
    match report.status {
        PrivilegeStatus::Full => info!("Running in full real-time mode"),
        PrivilegeStatus::Partial => warn!(
            memory_locked = report.memory_locked,
            realtime_scheduling = report.scheduler_priority.is_some(),
            "Running in partial real-time mode"
        ),
        PrivilegeStatus::None => {
            warn!("Running in standard mode; timing precision is reduced");
        }
    }

    if report.status != PrivilegeStatus::Full {
        let caps = check_rt_capabilities();
        if !caps.is_root {
            warn!(
                rtprio_limit = ?caps.rtprio_limit,
                memlock_limit = ?caps.memlock_limit,
                "Not running as root. Run with sudo, or grant CAP_SYS_NICE and CAP_IPC_LOCK, \
                 for full real-time mode."
            );
        }
    }
}

/// Information about real-time capabilities of the system.
#[derive(Debug, Clone, Default)]
pub struct RtCapabilities {
    /// Whether running as root.
    pub is_root: bool,
    /// RLIMIT_RTPRIO value (max RT priority allowed).
    pub rtprio_limit: Option<u64>,
    /// RLIMIT_MEMLOCK value (max lockable memory).
    pub memlock_limit: Option<u64>,
    /// Whether running on a PREEMPT_RT kernel.
    pub preempt_rt: bool,
}

impl RtCapabilities {
    /// Check if RT scheduling is likely to succeed.
    #[must_use]
    pub fn can_use_rt_scheduling(&self) -> bool {
        self.is_root || self.rtprio_limit.is_some_and(|l| l > 0)
    }

    /// Check if memory locking is likely to succeed.
    #[must_use]
    pub fn can_lock_memory(&self) -> bool {
        if self.is_root {
            return true;
        }

        #[cfg(target_family = "unix")]
        {
            #[allow(clippy::useless_conversion)]
            let infinity = u64::from(libc::RLIM_INFINITY);
            self.memlock_limit.is_some_and(|l| l == infinity)
        }

        #[cfg(not(target_family = "unix"))]
        {
            false
        }
    }
}

/// Inspect privileges and kernel flavor relevant to real-time operation.
#[cfg(target_os = "linux")]
#[must_use]
pub fn check_rt_capabilities() -> RtCapabilities {
    use nix::sys::resource::{getrlimit, Resource};

    let mut caps = RtCapabilities {
        is_root: nix::unistd::geteuid().is_root(),
        ..Default::default()
    };

    if let Ok((soft, _hard)) = getrlimit(Resource::RLIMIT_RTPRIO) {
        caps.rtprio_limit = Some(soft);
    }
    if let Ok((soft, _hard)) = getrlimit(Resource::RLIMIT_MEMLOCK) {
        caps.memlock_limit = Some(soft);
    }

    if let Ok(version) = std::fs::read_to_string("/proc/version") {
        caps.preempt_rt = version.contains("PREEMPT_RT") || version.contains("PREEMPT RT");
    }

    caps
}

#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn check_rt_capabilities() -> RtCapabilities {
    RtCapabilities::default()
}
