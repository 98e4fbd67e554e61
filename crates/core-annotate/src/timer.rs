//! Deadline timers.
//!
//! Timers here never sleep or spawn. They only remember when they are due;
//! the runtime sleeps until [`crate::Coordinator::next_deadline`] and then
//! calls `poll`. Arming again before expiry replaces the deadline, which is
//! the only cancellation mechanism the debounce needs.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadlineTimer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl DeadlineTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Arm (or re-arm) the timer relative to `now`; any pending deadline is
    /// discarded. Returns the new deadline.
    pub fn arm(&mut self, now: Instant) -> Instant {
        let deadline = now + self.delay;
        self.deadline = Some(deadline);
        deadline
    }

    /// Cancel the pending deadline. Returns true if one was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fire at most once: returns true and disarms when `now` has reached the
    /// deadline.
    pub fn poll_expired(&mut self, now: Instant) -> bool {
        if let Some(deadline) = self.deadline
            && now >= deadline
        {
            self.deadline = None;
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rearm_replaces_deadline() {
        let t0 = Instant::now();
        let mut timer = DeadlineTimer::new(Duration::from_millis(800));
        timer.arm(t0);
        let second = timer.arm(t0 + Duration::from_millis(500));
        assert_eq!(timer.deadline(), Some(second));
        assert!(!timer.poll_expired(t0 + Duration::from_millis(900)));
        assert!(timer.poll_expired(t0 + Duration::from_millis(1300)));
    }

    #[test]
    fn fires_once() {
        let t0 = Instant::now();
        let mut timer = DeadlineTimer::new(Duration::from_millis(10));
        timer.arm(t0);
        assert!(timer.poll_expired(t0 + Duration::from_millis(10)));
        assert!(!timer.poll_expired(t0 + Duration::from_millis(20)));
        assert!(!timer.is_armed());
    }

    #[test]
    fn cancel_reports_pending() {
        let mut timer = DeadlineTimer::new(Duration::from_millis(10));
        assert!(!timer.cancel());
        timer.arm(Instant::now());
        assert!(timer.cancel());
        assert_eq!(timer.deadline(), None);
    }
}
