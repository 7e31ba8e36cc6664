//! Privilege elevation acceptance tests.
//!
//! Elevation is best-effort: whatever the environment grants, the outcome
//! must be classified consistently and the loop must still run.

use super::common::{check_rt_prerequisites, is_root, run_cycles};
use sbc_common::config::{RealtimeConfig, SchedulerConfig};
use sbc_runtime::{check_rt_capabilities, elevate_process, PrivilegeStatus};

#[test]
fn test_disabled_elevation_makes_no_changes() {
    let config = RealtimeConfig {
        enabled: false,
        ..RealtimeConfig::default()
    };
    let report = elevate_process(&config, 80);

    assert!(report.disabled);
    assert_eq!(report.status, PrivilegeStatus::None);
    assert!(!report.memory_locked);
    assert!(report.scheduler_priority.is_none());

    let run = run_cycles(SchedulerConfig::led(), 20, &mut || {});
    assert_eq!(run.cycles, 20);
}

#[test]
fn test_capabilities_consistent() {
    let caps = check_rt_capabilities();
    if caps.is_root {
        assert!(caps.can_use_rt_scheduling());
        assert!(caps.can_lock_memory());
    }
    assert_eq!(caps.is_root, is_root());
}

/// Elevation as root yields full real-time mode.
#[test]
#[ignore = "Requires root privileges"]
fn test_elevation_as_root() {
    if let Err(e) = check_rt_prerequisites() {
        eprintln!("Skipping test: {e}");
        return;
    }

    let report = elevate_process(&RealtimeConfig::default(), 80);
    assert_eq!(report.status, PrivilegeStatus::Full);
    assert!(report.memory_locked);
    assert_eq!(report.scheduler_priority, Some(80));
    assert!(report.memory_lock_error.is_none());
    assert!(report.scheduler_error.is_none());
}

/// Unprivileged elevation degrades with the platform error text attached.
#[test]
#[ignore = "Must run as an unprivileged user without RLIMIT_RTPRIO"]
fn test_elevation_unprivileged() {
    if is_root() {
        eprintln!("Skipping test: running as root");
        return;
    }

    let report = elevate_process(&RealtimeConfig::default(), 70);
    assert_ne!(report.status, PrivilegeStatus::Full);
    assert!(report.scheduler_error.is_some());
    assert_eq!(
        report.status,
        PrivilegeStatus::classify(report.memory_locked, report.scheduler_priority.is_some())
    );

    let run = run_cycles(SchedulerConfig::button(), 100, &mut || {});
    assert_eq!(run.cycles, 100);
}
