//! Soak (long-duration stability) tests.
//!
//! These tests run the LED workload on the system clock for an extended
//! period and check for accumulated drift and memory growth.
//!
//! # Acceptance Criteria
//!
//! - Accumulated error stays bounded by a single wake-up's lateness
//! - Memory usage stable (no growth after warm-up)

use super::common::{get_memory_usage, print_report, run_cycles};
use sbc_common::config::SchedulerConfig;
use sbc_common::state::SchedulerState;
use sbc_runtime::{CancellationToken, SchedulerBuilder};
use std::time::Duration;

/// Run `cycles` of the LED schedule and check drift stays bounded.
fn soak(cycles: u64) {
    let initial_memory = get_memory_usage();
    let mut toggles = 0u64;

    let report = run_cycles(SchedulerConfig::led(), cycles, &mut || toggles += 1);
    print_report("soak", &report);

    assert_eq!(report.cycles, cycles);
    assert_eq!(toggles, cycles);
    assert_eq!(
        report.next_target,
        report.origin + Duration::from_millis(cycles + 1)
    );
    let error = report.last_accumulated_error_ns.unwrap_or(i128::MAX);
    assert!(error < 10_000_000, "accumulated error {error} ns");

    let growth = get_memory_usage().saturating_sub(initial_memory);
    println!("  Memory growth: {:.1} KB", growth as f64 / 1024.0);
    assert!(growth < 1024 * 1024, "memory grew by {growth} bytes");
}

/// Short soak test (1 minute) - quick sanity check.
#[test]
#[ignore = "Soak test - takes 1 minute"]
fn test_soak_short() {
    soak(60_000);
}

/// Medium soak test (1 hour).
#[test]
#[ignore = "Soak test - takes 1 hour"]
fn test_soak_medium() {
    soak(3_600_000);
}

/// A signal-like cancellation from another thread ends a long run promptly.
#[test]
#[ignore = "Soak test - takes 5 seconds"]
fn test_soak_cancellation() {
    let token = CancellationToken::new();
    let canceller = token.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_secs(5));
        canceller.cancel();
    });

    let mut scheduler = SchedulerBuilder::new(SchedulerConfig::led())
        .build()
        .expect("valid schedule");
    let report = scheduler.run(&mut || {}, &token).expect("periodic loop failed");
    handle.join().expect("canceller thread panicked");

    assert_eq!(scheduler.state(), SchedulerState::Terminated);
    assert!(report.cycles >= 1_000, "only {} cycles", report.cycles);
}
