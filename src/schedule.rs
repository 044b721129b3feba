use std::time::{Duration, Instant};

/// Fixed-interval tick source polled from the UI event loop.
#[derive(Debug, Clone)]
pub struct CaptureSchedule {
    interval: Duration,
    next_due: Option<Instant>,
}

impl CaptureSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// Arms the first tick one interval after `now`.
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.interval);
    }

    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Returns true at most once per call when a tick is due.
    ///
    /// Missed ticks are dropped rather than replayed in a burst.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if due <= now => {
                let next = due + self.interval;
                self.next_due = Some(if next <= now { now + self.interval } else { next });
                true
            }
            _ => false,
        }
    }

    pub fn time_until_next(&self, now: Instant) -> Option<Duration> {
        self.next_due.map(|due| due.saturating_duration_since(now))
    }
}
