//! Drift and lateness acceptance tests on the system clock.
//!
//! # Acceptance Criteria
//!
//! - The schedule stays anchored: `target(n) == target(0) + n * interval`
//! - 99th percentile wake-up lateness < 50µs with real-time privileges
//! - Zero missed deadlines for the LED workload

use super::common::{check_rt_prerequisites, print_report, run_cycles, AcceptanceCriteria};
use sbc_common::config::{RealtimeConfig, SchedulerConfig};
use sbc_runtime::{elevate_process, ExitReason, PrivilegeStatus};
use std::time::Duration;

/// The schedule never shifts, whatever the clock jitter.
#[test]
fn test_schedule_anchored_on_system_clock() {
    let config = SchedulerConfig {
        report_every: 100,
        ..SchedulerConfig::led()
    };
    let report = run_cycles(config, 300, &mut || {});

    assert_eq!(report.exit_reason, ExitReason::CycleLimit);
    assert_eq!(report.cycles, 300);
    assert_eq!(report.next_target, report.origin + Duration::from_millis(301));
    assert_eq!(report.drift_reports, 3);

    // The error is bounded by one late wake-up, not by the cycle count.
    let error = report.last_accumulated_error_ns.unwrap_or(i128::MAX);
    assert!(error >= 0);
    assert!(error < 50_000_000, "accumulated error {error} ns");
}

/// Slow actions are absorbed by the next wait instead of accumulating.
#[test]
fn test_action_time_absorbed() {
    let config = SchedulerConfig {
        interval: Duration::from_millis(5),
        report_every: 50,
        ..SchedulerConfig::led()
    };
    let report = run_cycles(config, 50, &mut || {
        std::thread::sleep(Duration::from_millis(2));
    });

    assert_eq!(report.cycles, 50);
    let error = report.last_accumulated_error_ns.unwrap_or(i128::MAX);
    // One action's worth of time plus wake-up lateness; 50 actions would be 100 ms.
    assert!(error < 40_000_000, "accumulated error {error} ns");
}

/// Full real-time LED schedule for 10 seconds.
#[test]
#[ignore = "Requires root and PREEMPT_RT kernel"]
fn test_led_lateness_realtime() {
    if let Err(e) = check_rt_prerequisites() {
        eprintln!("Skipping test: {e}");
        return;
    }

    let schedule = SchedulerConfig::led();
    let privileges = elevate_process(&RealtimeConfig::default(), schedule.priority);
    assert_eq!(privileges.status, PrivilegeStatus::Full);

    let report = run_cycles(schedule, 10_000, &mut || {});
    print_report("LED, full real-time", &report);

    assert!(report.last_accumulated_error_ns.is_some_and(|e| e >= 0));
    let criteria = AcceptanceCriteria::default();
    assert!(
        criteria.check(&report),
        "Lateness test failed: p99={:?}ns, max={:?}ns, missed={}",
        report.lateness.p99_ns,
        report.lateness.max_ns,
        report.lateness.missed_deadlines
    );
}

/// Button polling schedule for 10 seconds.
#[test]
#[ignore = "Requires root and PREEMPT_RT kernel"]
fn test_button_lateness_realtime() {
    if let Err(e) = check_rt_prerequisites() {
        eprintln!("Skipping test: {e}");
        return;
    }

    let schedule = SchedulerConfig::button();
    elevate_process(&RealtimeConfig::default(), schedule.priority);

    let report = run_cycles(schedule, 10_000, &mut || {});
    print_report("button, full real-time", &report);

    assert!(AcceptanceCriteria::default().check(&report));
}
