//! Single-shot debounce and rate throttle driven by explicit time ticks
//!
//! Nothing here spawns threads or reads the clock; callers pass `now` and
//! poll once per frame.

use std::time::{Duration, Instant};

/// A cancellable single-shot timer.
///
/// Each schedule records the session epoch it was made under. Polling with
/// a newer epoch discards the timer without firing, so timers armed before
/// a reload never act on the new toolpath.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    deadline: Option<Instant>,
    epoch: u64,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
            epoch: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm or re-arm the timer; any earlier deadline is replaced.
    pub fn schedule(&mut self, now: Instant, epoch: u64) {
        self.schedule_after(now, self.delay, epoch);
    }

    pub fn schedule_after(&mut self, now: Instant, delay: Duration, epoch: u64) {
        self.deadline = Some(now + delay);
        self.epoch = epoch;
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true exactly once when the deadline has passed.
    pub fn poll(&mut self, now: Instant, current_epoch: u64) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if self.epoch != current_epoch {
            self.deadline = None;
            return false;
        }
        if now >= deadline {
            self.deadline = None;
            return true;
        }
        false
    }
}

/// Allows at most one action per interval.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// True if the action may run now; records `now` as the last run.
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn test_debounce_fires_once_after_delay() {
        let t0 = Instant::now();
        let mut d = Debounce::new(MS * 100);
        d.schedule(t0, 1);
        assert!(!d.poll(t0 + MS * 50, 1));
        assert!(d.poll(t0 + MS * 100, 1));
        assert!(!d.poll(t0 + MS * 200, 1));
    }

    #[test]
    fn test_debounce_reschedule_pushes_deadline() {
        let t0 = Instant::now();
        let mut d = Debounce::new(MS * 100);
        d.schedule(t0, 0);
        d.schedule(t0 + MS * 80, 0);
        assert!(!d.poll(t0 + MS * 120, 0));
        assert!(d.poll(t0 + MS * 180, 0));
    }

    #[test]
    fn test_debounce_stale_epoch_never_fires() {
        let t0 = Instant::now();
        let mut d = Debounce::new(MS * 10);
        d.schedule(t0, 1);
        assert!(!d.poll(t0 + MS * 20, 2));
        assert!(!d.is_pending());
    }

    #[test]
    fn test_debounce_cancel() {
        let t0 = Instant::now();
        let mut d = Debounce::new(MS * 10);
        d.schedule(t0, 0);
        d.cancel();
        assert!(!d.poll(t0 + MS * 20, 0));
    }

    #[test]
    fn test_throttle_interval() {
        let t0 = Instant::now();
        let mut t = Throttle::new(MS * 16);
        assert!(t.try_acquire(t0));
        assert!(!t.try_acquire(t0 + MS * 10));
        assert!(t.try_acquire(t0 + MS * 16));
        t.reset();
        assert!(t.try_acquire(t0 + MS * 17));
    }
}
