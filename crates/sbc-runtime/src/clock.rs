//! Monotonic clock and absolute-deadline waits.
//!
//! [`SystemClock`] reads `CLOCK_MONOTONIC` and sleeps with
//! `clock_nanosleep(.., TIMER_ABSTIME, ..)`. A single call to
//! [`MonotonicClock::sleep_until`] is one attempt: when a signal interrupts
//! it, [`WaitOutcome::Interrupted`] is returned and the caller re-issues the
//! same deadline.
//!
//! [`ManualClock`] is a deterministic clock for tests and simulation. Time
//! only moves when a wait reaches its deadline or when the caller advances
//! it explicitly.

use sbc_common::error::{SbcError, SbcResult};
use sbc_common::time::MonoTime;
use std::cell::{Cell, RefCell};
use std::time::Duration;

/// Result of a single absolute-deadline wait attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The clock reached (or was already past) the deadline.
    Reached,
    /// The wait returned early because a signal handler ran.
    Interrupted,
}

/// Source of monotonic time with absolute-deadline sleeping.
pub trait MonotonicClock {
    /// Current reading of the monotonic clock.
    fn now(&self) -> SbcResult<MonoTime>;

    /// Block until `deadline`, or until interrupted.
    ///
    /// Returns immediately with [`WaitOutcome::Reached`] when the deadline
    /// has already passed.
    fn sleep_until(&self, deadline: MonoTime) -> SbcResult<WaitOutcome>;
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for &C {
    fn now(&self) -> SbcResult<MonoTime> {
        (**self).now()
    }

    fn sleep_until(&self, deadline: MonoTime) -> SbcResult<WaitOutcome> {
        (**self).sleep_until(deadline)
    }
}

/// The operating system's monotonic clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a handle to the system monotonic clock.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "linux")]
impl MonotonicClock for SystemClock {
    fn now(&self) -> SbcResult<MonoTime> {
        use nix::time::{clock_gettime, ClockId};

        let ts = clock_gettime(ClockId::CLOCK_MONOTONIC)
            .map_err(|e| SbcError::Clock(format!("clock_gettime failed: {e}")))?;
        let nanos = u64::try_from(ts.tv_nsec()).unwrap_or(0);
        Ok(MonoTime::new(i64::from(ts.tv_sec()), nanos))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_lossless)]
    fn sleep_until(&self, deadline: MonoTime) -> SbcResult<WaitOutcome> {
        let ts = libc::timespec {
            tv_sec: deadline.secs() as libc::time_t,
            tv_nsec: deadline.subsec_nanos() as libc::c_long,
        };

        // SAFETY: `ts` is a valid, normalized timespec and the remainder
        // pointer may be null for absolute sleeps.
        let rc = unsafe {
            libc::clock_nanosleep(
                libc::CLOCK_MONOTONIC,
                libc::TIMER_ABSTIME,
                &ts,
                std::ptr::null_mut(),
            )
        };

        match rc {
            0 => Ok(WaitOutcome::Reached),
            libc::EINTR => Ok(WaitOutcome::Interrupted),
            err => Err(SbcError::Clock(format!(
                "clock_nanosleep failed: {}",
                std::io::Error::from_raw_os_error(err)
            ))),
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl MonotonicClock for SystemClock {
    fn now(&self) -> SbcResult<MonoTime> {
        let elapsed = process_epoch().elapsed();
        Ok(MonoTime::ZERO + elapsed)
    }

    fn sleep_until(&self, deadline: MonoTime) -> SbcResult<WaitOutcome> {
        // No absolute sleep primitive here; the relative remainder is
        // recomputed from the same deadline on every call.
        let remaining = deadline.saturating_duration_since(self.now()?);
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        Ok(WaitOutcome::Reached)
    }
}

#[cfg(not(target_os = "linux"))]
fn process_epoch() -> std::time::Instant {
    static EPOCH: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    *EPOCH.get_or_init(std::time::Instant::now)
}

/// One wait observed by a [`ManualClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitRecord {
    /// Absolute deadline requested.
    pub deadline: MonoTime,
    /// Clock reading when the wait was issued.
    pub issued_at: MonoTime,
    /// Whether the clock had to move forward to reach the deadline.
    pub slept: bool,
    /// Whether the attempt returned early without reaching the deadline.
    pub interrupted: bool,
}

/// Deterministic clock driven by the caller.
///
/// Waits jump the clock straight to their deadline with zero jitter.
/// Pending interruptions make the next waits return
/// [`WaitOutcome::Interrupted`] without moving time.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<MonoTime>,
    pending_interrupts: Cell<u32>,
    waits: RefCell<Vec<WaitRecord>>,
    interrupted_waits: Cell<u64>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(MonoTime::ZERO)
    }
}

impl ManualClock {
    /// Create a clock reading `start`.
    #[must_use]
    pub fn new(start: MonoTime) -> Self {
        Self {
            now: Cell::new(start),
            pending_interrupts: Cell::new(0),
            waits: RefCell::new(Vec::new()),
            interrupted_waits: Cell::new(0),
        }
    }

    /// Move the clock forward, as if work took `by` to execute.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Current reading without going through the trait.
    #[must_use]
    pub fn current(&self) -> MonoTime {
        self.now.get()
    }

    /// Make the next `count` waits return early as if a signal arrived.
    pub fn interrupt_next_waits(&self, count: u32) {
        self.pending_interrupts
            .set(self.pending_interrupts.get() + count);
    }

    /// Completed waits, in order.
    #[must_use]
    pub fn waits(&self) -> Vec<WaitRecord> {
        self.waits
            .borrow()
            .iter()
            .filter(|w| !w.interrupted)
            .copied()
            .collect()
    }

    /// Every wait attempt, interrupted ones included, in order.
    #[must_use]
    pub fn attempts(&self) -> Vec<WaitRecord> {
        self.waits.borrow().clone()
    }

    /// Number of wait attempts that were interrupted.
    #[must_use]
    pub fn interrupted_waits(&self) -> u64 {
        self.interrupted_waits.get()
    }
}

impl MonotonicClock for ManualClock {
    fn now(&self) -> SbcResult<MonoTime> {
        Ok(self.now.get())
    }

    fn sleep_until(&self, deadline: MonoTime) -> SbcResult<WaitOutcome> {
        let issued_at = self.now.get();
        let pending = self.pending_interrupts.get();
        if pending > 0 {
            self.pending_interrupts.set(pending - 1);
            self.interrupted_waits.set(self.interrupted_waits.get() + 1);
            self.waits.borrow_mut().push(WaitRecord {
                deadline,
                issued_at,
                slept: false,
                interrupted: true,
            });
            return Ok(WaitOutcome::Interrupted);
        }

        let slept = deadline > issued_at;
        if slept {
            self.now.set(deadline);
        }
        self.waits.borrow_mut().push(WaitRecord {
            deadline,
            issued_at,
            slept,
            interrupted: false,
        });
        Ok(WaitOutcome::Reached)
    }
}
