//! Accumulators shared by the concrete detectors.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Fires when a condition holds for `threshold` frames in a row.
///
/// Any frame without the condition resets the run. Firing also resets, so a
/// sustained episode fires once per `threshold` frames.
#[derive(Debug, Clone)]
pub struct ConsecutiveCounter {
    threshold: u32,
    count: u32,
}

impl ConsecutiveCounter {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            count: 0,
        }
    }

    pub fn observe(&mut self, condition: bool) -> bool {
        if !condition {
            self.count = 0;
            return false;
        }
        self.count += 1;
        if self.count >= self.threshold {
            self.count = 0;
            return true;
        }
        false
    }

    pub fn reset(&mut self) {
        self.count = 0;
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

/// Counts rising edges inside a trailing time window.
///
/// An event is recorded only when the condition goes false→true, so one
/// continuous span counts once no matter how many frames it lasts.
#[derive(Debug, Clone)]
pub struct SlidingWindowCounter {
    window: Duration,
    max_events: usize,
    events: VecDeque<Instant>,
    was_active: bool,
}

impl SlidingWindowCounter {
    pub fn new(window: Duration, max_events: usize) -> Self {
        Self {
            window,
            max_events: max_events.max(1),
            events: VecDeque::new(),
            was_active: false,
        }
    }

    /// Feeds one evaluation; returns true while the live count is at or
    /// above the maximum.
    pub fn observe(&mut self, condition: bool, now: Instant) -> bool {
        if condition && !self.was_active {
            self.events.push_back(now);
        }
        self.was_active = condition;
        self.expire(now);
        self.events.len() >= self.max_events
    }

    /// Ends the current span without recording anything, e.g. when the
    /// input needed to evaluate the condition is missing.
    pub fn interrupt(&mut self) {
        self.was_active = false;
    }

    pub fn expire(&mut self, now: Instant) {
        while let Some(&oldest) = self.events.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn reset(&mut self) {
        self.events.clear();
        self.was_active = false;
    }

    pub fn count(&self) -> usize {
        self.events.len()
    }

    pub fn max_events(&self) -> usize {
        self.max_events
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

/// Fires every `interval`, measured from the last fire or reset.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: Duration,
    next_fire: Instant,
}

impl IntervalTimer {
    pub fn new(interval: Duration, now: Instant) -> Self {
        Self {
            interval,
            next_fire: now + interval,
        }
    }

    pub fn poll(&mut self, now: Instant) -> bool {
        if now >= self.next_fire {
            self.next_fire = now + self.interval;
            return true;
        }
        false
    }

    pub fn reset(&mut self, now: Instant) {
        self.next_fire = now + self.interval;
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.next_fire.saturating_duration_since(now)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}
