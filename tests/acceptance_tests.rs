//! Acceptance tests for the SBC real-time demos.
//!
//! These tests verify timing behavior on the real monotonic clock:
//! - Zero cumulative drift of the absolute schedule
//! - Graceful degradation without real-time privileges
//! - Long-duration stability of the LED loop (soak tests)
//!
//! Tests marked `#[ignore]` require:
//! - Root privileges (or CAP_SYS_NICE and CAP_IPC_LOCK)
//! - PREEMPT_RT kernel (recommended)

mod acceptance;
