use std::time::{Duration, Instant};

/// Holds the capture loop to a nominal frame rate.
///
/// Each call to [`FramePacer::pace`] sleeps for whatever is left of the
/// period since the previous call. An overrun is not paid back: the next
/// period starts from the moment the overrun iteration finished.
pub struct FramePacer {
    period: Duration,
    period_ms: u64,
    iteration_start: Instant,
    timestamp_ms: u64,
}

impl FramePacer {
    /// `fps` is clamped to at least 1.
    pub fn new(fps: u32) -> Self {
        Self::resuming_at(fps, 0)
    }

    /// A pacer whose first timestamp is `first_timestamp_ms`, so a restarted
    /// loop continues the previous run's timeline.
    pub fn resuming_at(fps: u32, first_timestamp_ms: u64) -> Self {
        let fps = fps.max(1);
        let period_ms = 1000 / u64::from(fps);
        Self {
            period: Duration::from_secs_f64(1.0 / f64::from(fps)),
            period_ms: period_ms.max(1),
            iteration_start: Instant::now(),
            timestamp_ms: first_timestamp_ms,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Monotonic frame timestamp: advances by the nominal period per call.
    pub fn next_timestamp(&mut self) -> u64 {
        let ts = self.timestamp_ms;
        self.timestamp_ms += self.period_ms;
        ts
    }

    /// The timestamp the next call to [`FramePacer::next_timestamp`] returns.
    pub fn upcoming_timestamp(&self) -> u64 {
        self.timestamp_ms
    }

    /// Time left in the current period, or `None` on overrun.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let elapsed = now.saturating_duration_since(self.iteration_start);
        self.period.checked_sub(elapsed).filter(|d| !d.is_zero())
    }

    /// Sleeps out the rest of the period and starts the next one.
    pub fn pace(&mut self) {
        if let Some(wait) = self.remaining(Instant::now()) {
            std::thread::sleep(wait);
        }
        self.iteration_start = Instant::now();
    }
}
