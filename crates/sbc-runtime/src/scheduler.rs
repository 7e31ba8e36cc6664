//! Absolute-time periodic scheduler.
//!
//! Runs one caller-supplied action at a fixed nominal period:
//! 1. Seed `target_time` from the monotonic clock plus one interval
//! 2. Wait until `target_time` with an absolute-deadline sleep
//! 3. Invoke the action (before or after the wait, per configuration)
//! 4. Advance `target_time` by exactly one interval
//! 5. Check the cancellation token at the iteration boundary
//!
//! The deadline is never recomputed relative to "now", so the time spent
//! in the action cannot leak into the schedule:
//! `target_time(n) == target_time(0) + n * interval` for every `n`.
//! When the loop falls behind, waits whose deadline already passed return
//! immediately; there is no catch-up or coalescing.

use crate::cancel::CancellationToken;
use crate::clock::{MonotonicClock, SystemClock, WaitOutcome};
use sbc_common::config::SchedulerConfig;
use sbc_common::error::{SbcError, SbcResult};
use sbc_common::metrics::{LatenessMetrics, LatenessSnapshot};
use sbc_common::state::{SchedulerState, StateMachine};
use sbc_common::time::{duration_to_nanos, MonoTime};
use std::time::Duration;
use tracing::{debug, error, info, trace};

/// Default number of lateness samples kept for percentiles.
const DEFAULT_HISTOGRAM_SIZE: usize = 10_000;

/// Work executed once per period.
///
/// Actions run to completion; the scheduler never interrupts one.
pub trait PeriodicAction {
    /// Perform one cycle of work.
    fn on_cycle(&mut self);
}

impl<F: FnMut()> PeriodicAction for F {
    fn on_cycle(&mut self) {
        self()
    }
}

/// Loop bookkeeping, created right before the loop and dropped after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleState {
    /// Clock reading the schedule is anchored on.
    origin: MonoTime,
    /// Next absolute deadline.
    target_time: MonoTime,
    /// Fixed period.
    interval: Duration,
    /// Completed action invocations.
    cycle_count: u64,
}

impl ScheduleState {
    /// Anchor a schedule at `origin`; the first deadline is one interval later.
    #[must_use]
    pub fn new(origin: MonoTime, interval: Duration) -> Self {
        Self {
            origin,
            target_time: origin + interval,
            interval,
            cycle_count: 0,
        }
    }

    /// Clock reading the schedule was seeded from.
    #[must_use]
    pub fn origin(&self) -> MonoTime {
        self.origin
    }

    /// Next absolute deadline.
    #[must_use]
    pub fn target_time(&self) -> MonoTime {
        self.target_time
    }

    /// Fixed period.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Completed action invocations.
    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Move the deadline forward by exactly one interval.
    pub fn advance_target(&mut self) {
        self.target_time.advance(self.interval);
    }

    /// Count one completed action.
    pub fn record_cycle(&mut self) {
        self.cycle_count += 1;
    }

    /// `elapsed - cycle_count * interval`, in nanoseconds.
    #[must_use]
    pub fn accumulated_error_ns(&self, now: MonoTime) -> i128 {
        let expected = i128::from(self.cycle_count) * i128::from(duration_to_nanos(self.interval));
        now.nanos_since(self.origin) - expected
    }
}

/// Why the loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Cancellation observed at an iteration boundary or during a wait.
    Cancelled,
    /// `max_cycles` actions completed.
    CycleLimit,
}

/// Summary returned when the loop terminates.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Total completed action invocations.
    pub cycles: u64,
    /// Why the loop stopped.
    pub exit_reason: ExitReason,
    /// Clock reading the schedule was anchored on.
    pub origin: MonoTime,
    /// Deadline the next iteration would have waited for.
    pub next_target: MonoTime,
    /// Accumulated error from the most recent drift report, if any.
    pub last_accumulated_error_ns: Option<i128>,
    /// Drift reports emitted.
    pub drift_reports: u64,
    /// Wake-up lateness statistics.
    pub lateness: LatenessSnapshot,
}

/// Result of waiting for one deadline, retries included.
enum WaitResult {
    Reached,
    Cancelled,
}

/// Periodic scheduler with zero cumulative drift.
pub struct AbsoluteTimeScheduler<C: MonotonicClock = SystemClock> {
    clock: C,
    config: SchedulerConfig,
    state: StateMachine,
    metrics: LatenessMetrics,
    last_accumulated_error_ns: Option<i128>,
    drift_reports: u64,
}

impl AbsoluteTimeScheduler<SystemClock> {
    /// Scheduler on the system monotonic clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SchedulerConfig) -> SbcResult<Self> {
        Self::with_clock(SystemClock::new(), config)
    }
}

impl<C: MonotonicClock> AbsoluteTimeScheduler<C> {
    /// Scheduler on an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_clock(clock: C, config: SchedulerConfig) -> SbcResult<Self> {
        config.validate()?;
        Ok(Self {
            clock,
            config,
            state: StateMachine::new(),
            metrics: LatenessMetrics::new(DEFAULT_HISTOGRAM_SIZE),
            last_accumulated_error_ns: None,
            drift_reports: 0,
        })
    }

    /// Replace the lateness histogram capacity.
    #[must_use]
    pub fn with_histogram_size(mut self, size: usize) -> Self {
        self.metrics = LatenessMetrics::new(size);
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state.state()
    }

    /// Schedule parameters.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Lateness statistics collected so far.
    pub fn metrics(&self) -> &LatenessMetrics {
        &self.metrics
    }

    /// Run `action` periodically until `token` is cancelled or the cycle
    /// limit is reached.
    ///
    /// Blocks the calling thread. May only be called once per scheduler.
    ///
    /// # Errors
    ///
    /// Returns an error if the scheduler was already run, or if the clock
    /// fails in a way other than an interrupted wait.
    pub fn run<A: PeriodicAction>(
        &mut self,
        action: &mut A,
        token: &CancellationToken,
    ) -> SbcResult<RunReport> {
        self.state.transition(SchedulerState::Running)?;

        let mut schedule = None;
        let outcome = self.drive(action, token, &mut schedule);

        // Clock failures drain and terminate like any other exit.
        self.state.transition(SchedulerState::Draining)?;
        let result = match (outcome, schedule) {
            (Ok(exit_reason), Some(schedule)) => Ok(self.finish(&schedule, exit_reason)),
            (Ok(_), None) => Err(SbcError::Clock("periodic loop never seeded".into())),
            (Err(e), schedule) => {
                error!(
                    error = %e,
                    cycles = schedule.as_ref().map_or(0, ScheduleState::cycle_count),
                    missed_deadlines = self.metrics.missed_deadlines(),
                    "Periodic loop aborted"
                );
                Err(e)
            }
        };
        self.state.transition(SchedulerState::Terminated)?;
        result
    }

    /// The loop body of [`run`](Self::run). `slot` receives the schedule as
    /// soon as it is seeded so the caller can report on it after an error.
    fn drive<A: PeriodicAction>(
        &mut self,
        action: &mut A,
        token: &CancellationToken,
        slot: &mut Option<ScheduleState>,
    ) -> SbcResult<ExitReason> {
        let origin = self.clock.now()?;
        let schedule = slot.insert(ScheduleState::new(origin, self.config.interval));
        let fire_first = self.config.fire_immediately_on_first_iteration;

        info!(
            interval_ns = duration_to_nanos(self.config.interval),
            fire_first,
            first_target = %schedule.target_time(),
            "Entering periodic loop"
        );

        loop {
            if token.is_cancelled() {
                return Ok(ExitReason::Cancelled);
            }
            if self.limit_reached(schedule) {
                return Ok(ExitReason::CycleLimit);
            }

            if fire_first {
                action.on_cycle();
                schedule.record_cycle();
                if self.limit_reached(schedule) {
                    return Ok(ExitReason::CycleLimit);
                }
            }

            if let WaitResult::Cancelled = self.wait_for_target(schedule, token)? {
                return Ok(ExitReason::Cancelled);
            }
            schedule.advance_target();

            if !fire_first {
                action.on_cycle();
                schedule.record_cycle();
            }

            self.maybe_report_drift(schedule)?;
        }
    }

    fn limit_reached(&self, schedule: &ScheduleState) -> bool {
        self.config
            .max_cycles
            .is_some_and(|max| schedule.cycle_count() >= max)
    }

    /// Wait for the current target, re-issuing the same absolute deadline
    /// after every interruption until it is reached or cancellation is
    /// requested.
    fn wait_for_target(
        &mut self,
        schedule: &ScheduleState,
        token: &CancellationToken,
    ) -> SbcResult<WaitResult> {
        let deadline = schedule.target_time();
        let issued_at = self.clock.now()?;
        let missed = issued_at >= deadline;

        loop {
            match self.clock.sleep_until(deadline)? {
                WaitOutcome::Reached => break,
                WaitOutcome::Interrupted => {
                    if token.is_cancelled() {
                        debug!(%deadline, "Wait interrupted by cancellation");
                        return Ok(WaitResult::Cancelled);
                    }
                    trace!(%deadline, "Wait interrupted; retrying same deadline");
                }
            }
        }

        let woke = self.clock.now()?;
        self.metrics
            .record(woke.saturating_duration_since(deadline), missed);
        if missed {
            trace!(
                cycle = schedule.cycle_count(),
                behind_ns = issued_at.nanos_since(deadline),
                "Deadline already passed; firing without sleep"
            );
        }
        Ok(WaitResult::Reached)
    }

    fn maybe_report_drift(&mut self, schedule: &ScheduleState) -> SbcResult<()> {
        let every = self.config.report_every;
        let cycles = schedule.cycle_count();
        if every == 0 || cycles == 0 || cycles % every != 0 {
            return Ok(());
        }

        let now = self.clock.now()?;
        let error_ns = schedule.accumulated_error_ns(now);
        self.last_accumulated_error_ns = Some(error_ns);
        self.drift_reports += 1;

        #[allow(clippy::cast_precision_loss)]
        let error_us = error_ns as f64 / 1_000.0;
        info!(
            cycle = cycles,
            accumulated_error_ns = %error_ns,
            accumulated_error_us = error_us,
            missed_deadlines = self.metrics.missed_deadlines(),
            "Drift report"
        );
        Ok(())
    }

    fn finish(&self, schedule: &ScheduleState, exit_reason: ExitReason) -> RunReport {
        let lateness = self.metrics.snapshot();
        info!(
            cycles = schedule.cycle_count(),
            ?exit_reason,
            mean_lateness_ns = lateness.mean_ns.unwrap_or(0.0),
            max_lateness_ns = lateness.max_ns.unwrap_or(0),
            missed_deadlines = lateness.missed_deadlines,
            "Periodic loop exited"
        );

        RunReport {
            cycles: schedule.cycle_count(),
            exit_reason,
            origin: schedule.origin(),
            next_target: schedule.target_time(),
            last_accumulated_error_ns: self.last_accumulated_error_ns,
            drift_reports: self.drift_reports,
            lateness,
        }
    }
}

impl<C: MonotonicClock> std::fmt::Debug for AbsoluteTimeScheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbsoluteTimeScheduler")
            .field("config", &self.config)
            .field("state", &self.state.state())
            .finish_non_exhaustive()
    }
}

/// Builder for configuring the scheduler.
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    histogram_size: usize,
}

impl SchedulerBuilder {
    /// Start from a preset or loaded configuration.
    #[must_use]
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            histogram_size: DEFAULT_HISTOGRAM_SIZE,
        }
    }

    /// Set the nominal period.
    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Choose whether the action runs before the first wait.
    #[must_use]
    pub fn fire_immediately(mut self, enabled: bool) -> Self {
        self.config.fire_immediately_on_first_iteration = enabled;
        self
    }

    /// Stop normally after `cycles` actions.
    #[must_use]
    pub fn max_cycles(mut self, cycles: u64) -> Self {
        self.config.max_cycles = Some(cycles);
        self
    }

    /// Emit a drift report every `cycles` cycles (0 disables).
    #[must_use]
    pub fn report_every(mut self, cycles: u64) -> Self {
        self.config.report_every = cycles;
        self
    }

    /// Lateness samples kept for percentiles.
    #[must_use]
    pub fn histogram_size(mut self, size: usize) -> Self {
        self.histogram_size = size;
        self
    }

    /// Build on the system monotonic clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> SbcResult<AbsoluteTimeScheduler<SystemClock>> {
        self.build_with_clock(SystemClock::new())
    }

    /// Build on an explicit clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build_with_clock<C: MonotonicClock>(
        self,
        clock: C,
    ) -> SbcResult<AbsoluteTimeScheduler<C>> {
        Ok(AbsoluteTimeScheduler::with_clock(clock, self.config)?
            .with_histogram_size(self.histogram_size))
    }
}
