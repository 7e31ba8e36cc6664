//! Wake-up lateness tracking for the periodic loop.
//!
//! Every absolute wait records how far past its deadline the thread
//! actually resumed. Samples go into a fixed ring buffer allocated up
//! front, so recording never allocates inside the loop.

use std::time::Duration;

/// Wake-up lateness statistics with a ring buffer for percentiles.
#[derive(Debug)]
pub struct LatenessMetrics {
    /// Ring buffer of lateness samples in nanoseconds.
    samples: Box<[u64]>,
    /// Current write position in the ring buffer.
    write_pos: usize,
    /// Number of samples held (saturates at buffer size).
    sample_count: usize,
    /// Total waits recorded.
    total_waits: u64,
    /// Minimum observed lateness in nanoseconds.
    min_ns: u64,
    /// Maximum observed lateness in nanoseconds.
    max_ns: u64,
    /// Sum of all lateness values, for the mean.
    sum_ns: u128,
    /// Waits whose deadline had already passed when issued.
    missed_deadlines: u64,
}

impl LatenessMetrics {
    /// Create a collector retaining `histogram_size` samples.
    #[must_use]
    pub fn new(histogram_size: usize) -> Self {
        let size = histogram_size.max(1);
        Self {
            samples: vec![0u64; size].into_boxed_slice(),
            write_pos: 0,
            sample_count: 0,
            total_waits: 0,
            min_ns: u64::MAX,
            max_ns: 0,
            sum_ns: 0,
            missed_deadlines: 0,
        }
    }

    /// Record one wait.
    ///
    /// `lateness_ns` is `wake - deadline`, floored at zero. `missed` is true
    /// when the deadline was already behind the clock before waiting.
    pub fn record_ns(&mut self, lateness_ns: u64, missed: bool) {
        self.samples[self.write_pos] = lateness_ns;
        self.write_pos = (self.write_pos + 1) % self.samples.len();
        self.sample_count = self.sample_count.saturating_add(1).min(self.samples.len());

        self.total_waits += 1;
        self.min_ns = self.min_ns.min(lateness_ns);
        self.max_ns = self.max_ns.max(lateness_ns);
        self.sum_ns += u128::from(lateness_ns);

        if missed {
            self.missed_deadlines += 1;
        }
    }

    /// Record one wait from a `Duration`.
    pub fn record(&mut self, lateness: Duration, missed: bool) {
        self.record_ns(u64::try_from(lateness.as_nanos()).unwrap_or(u64::MAX), missed);
    }

    /// Total number of waits recorded.
    #[must_use]
    pub fn total_waits(&self) -> u64 {
        self.total_waits
    }

    /// Number of waits issued after their deadline had passed.
    #[must_use]
    pub fn missed_deadlines(&self) -> u64 {
        self.missed_deadlines
    }

    /// Smallest observed lateness.
    #[must_use]
    pub fn min(&self) -> Option<Duration> {
        (self.total_waits > 0).then(|| Duration::from_nanos(self.min_ns))
    }

    /// Largest observed lateness.
    #[must_use]
    pub fn max(&self) -> Option<Duration> {
        (self.total_waits > 0).then(|| Duration::from_nanos(self.max_ns))
    }

    /// Mean lateness in nanoseconds, as a float for reporting.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_ns(&self) -> Option<f64> {
        (self.total_waits > 0).then(|| self.sum_ns as f64 / self.total_waits as f64)
    }

    /// Compute a percentile (0.0 to 100.0) over the retained samples.
    ///
    /// Returns `None` when empty or when `percentile` is out of range.
    #[must_use]
    pub fn percentile(&self, percentile: f64) -> Option<Duration> {
        if self.sample_count == 0 || !(0.0..=100.0).contains(&percentile) {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples[..self.sample_count].to_vec();
        sorted.sort_unstable();
        Some(Duration::from_nanos(sorted[percentile_index(percentile, sorted.len())]))
    }

    /// Immutable snapshot for reporting.
    #[must_use]
    pub fn snapshot(&self) -> LatenessSnapshot {
        LatenessSnapshot {
            total_waits: self.total_waits,
            min_ns: (self.total_waits > 0).then_some(self.min_ns),
            max_ns: (self.total_waits > 0).then_some(self.max_ns),
            mean_ns: self.mean_ns(),
            p99_ns: self
                .percentile(99.0)
                .map(|d| u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)),
            missed_deadlines: self.missed_deadlines,
        }
    }
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn percentile_index(percentile: f64, len: usize) -> usize {
    let idx = ((percentile / 100.0) * (len - 1) as f64).round() as usize;
    idx.min(len - 1)
}

/// Immutable snapshot of lateness statistics.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct LatenessSnapshot {
    /// Total waits recorded.
    pub total_waits: u64,
    /// Minimum lateness in nanoseconds.
    pub min_ns: Option<u64>,
    /// Maximum lateness in nanoseconds.
    pub max_ns: Option<u64>,
    /// Mean lateness in nanoseconds.
    pub mean_ns: Option<f64>,
    /// 99th percentile lateness in nanoseconds.
    pub p99_ns: Option<u64>,
    /// Waits issued after their deadline.
    pub missed_deadlines: u64,
}

impl LatenessSnapshot {
    /// Jitter (max - min) in nanoseconds.
    #[must_use]
    pub fn jitter_ns(&self) -> Option<u64> {
        match (self.min_ns, self.max_ns) {
            (Some(min), Some(max)) => Some(max - min),
            _ => None,
        }
    }
}
