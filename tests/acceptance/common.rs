//! Common utilities for acceptance tests.
//!
//! Provides helpers for:
//! - Checking real-time prerequisites (PREEMPT_RT, privileges)
//! - Running a schedule on the system clock and collecting timing stats
//! - Applying acceptance criteria

#![allow(dead_code)] // Not every suite uses every helper

use sbc_common::config::SchedulerConfig;
use sbc_runtime::{check_rt_capabilities, CancellationToken, PeriodicAction, RunReport, SchedulerBuilder};
use std::fs;
use std::time::Duration;

/// Check if the system has PREEMPT_RT kernel.
pub fn has_preempt_rt() -> bool {
    check_rt_capabilities().preempt_rt
}

/// Check if running as root (required for RT priority).
pub fn is_root() -> bool {
    check_rt_capabilities().is_root
}

/// Check all prerequisites for real-time tests.
pub fn check_rt_prerequisites() -> Result<(), String> {
    let caps = check_rt_capabilities();

    if !caps.preempt_rt {
        eprintln!("WARNING: PREEMPT_RT kernel not detected - lateness results may be unreliable");
    }

    if caps.can_use_rt_scheduling() && caps.can_lock_memory() {
        Ok(())
    } else {
        Err("Missing real-time privileges - run as root".to_string())
    }
}

/// Run `action` on the system clock for `cycles` cycles.
pub fn run_cycles<A: PeriodicAction>(
    config: SchedulerConfig,
    cycles: u64,
    action: &mut A,
) -> RunReport {
    let mut scheduler = SchedulerBuilder::new(config)
        .max_cycles(cycles)
        .histogram_size(usize::try_from(cycles).unwrap_or(usize::MAX).min(100_000))
        .build()
        .expect("valid schedule");
    scheduler
        .run(action, &CancellationToken::new())
        .expect("periodic loop failed")
}

/// Get current process memory usage in bytes.
pub fn get_memory_usage() -> u64 {
    if let Ok(status) = fs::read_to_string("/proc/self/status") {
        for line in status.lines() {
            if line.starts_with("VmRSS:") {
                let parts: Vec<&str> = line.split_whitespace().collect();
                if parts.len() >= 2 {
                    if let Ok(kb) = parts[1].parse::<u64>() {
                        return kb * 1024;
                    }
                }
            }
        }
    }
    0
}

/// Print a short timing summary for a run.
pub fn print_report(name: &str, report: &RunReport) {
    let l = &report.lateness;
    println!("Results ({name}):");
    println!("  Cycles: {}", report.cycles);
    println!("  Lateness min: {} ns", l.min_ns.unwrap_or(0));
    println!("  Lateness mean: {:.0} ns", l.mean_ns.unwrap_or(0.0));
    println!("  Lateness p99: {} ns", l.p99_ns.unwrap_or(0));
    println!("  Lateness max: {} ns", l.max_ns.unwrap_or(0));
    println!("  Missed deadlines: {}", l.missed_deadlines);
    if let Some(err) = report.last_accumulated_error_ns {
        println!("  Accumulated error: {err} ns");
    }
}

/// Acceptance criteria for wake-up lateness.
pub struct AcceptanceCriteria {
    /// Maximum acceptable 99th percentile lateness.
    pub max_p99: Duration,
    /// Maximum acceptable worst-case lateness.
    pub max_lateness: Duration,
    /// Maximum acceptable missed deadlines.
    pub max_missed: u64,
}

impl Default for AcceptanceCriteria {
    fn default() -> Self {
        Self {
            max_p99: Duration::from_micros(50),
            max_lateness: Duration::from_micros(200),
            max_missed: 0,
        }
    }
}

impl AcceptanceCriteria {
    /// Check if a run meets the criteria.
    pub fn check(&self, report: &RunReport) -> bool {
        let l = &report.lateness;
        let p99 = Duration::from_nanos(l.p99_ns.unwrap_or(u64::MAX));
        let max = Duration::from_nanos(l.max_ns.unwrap_or(u64::MAX));
        p99 <= self.max_p99 && max <= self.max_lateness && l.missed_deadlines <= self.max_missed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbc_runtime::ManualClock;

    #[test]
    fn test_acceptance_criteria_zero_jitter_passes() {
        let clock = ManualClock::default();
        let mut scheduler = SchedulerBuilder::new(SchedulerConfig::led())
            .max_cycles(100)
            .build_with_clock(&clock)
            .unwrap();
        let report = scheduler
            .run(&mut || {}, &CancellationToken::new())
            .unwrap();
        assert!(AcceptanceCriteria::default().check(&report));
    }

    #[test]
    fn test_acceptance_criteria_missed_deadline_fails() {
        let clock = ManualClock::default();
        let mut scheduler = SchedulerBuilder::new(SchedulerConfig::led())
            .max_cycles(3)
            .build_with_clock(&clock)
            .unwrap();
        let report = scheduler
            .run(&mut || clock.advance(Duration::from_millis(2)), &CancellationToken::new())
            .unwrap();
        assert!(report.lateness.missed_deadlines > 0);
        assert!(!AcceptanceCriteria::default().check(&report));
    }

    #[test]
    fn test_memory_usage_readable() {
        assert!(get_memory_usage() > 0);
    }
}
