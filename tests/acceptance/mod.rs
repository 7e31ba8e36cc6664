//! Integration tests for SBC demo acceptance testing.
//!
//! These tests verify real-time behavior of the periodic loop:
//! - Drift and wake-up lateness on the system clock
//! - Privilege elevation outcomes
//! - Long-duration stability (soak tests)

mod common;
mod drift_test;
mod privilege_test;
mod soak_test;
