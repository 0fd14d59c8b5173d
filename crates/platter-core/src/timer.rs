//! Tiny deadline timers for retransmission scheduling. No threads, no
//! callbacks: a timer is one optional deadline, and callers decide how
//! often to poll [`DeadlineTimer::expired`]. This matches the transports'
//! cooperative model where liveness is driven from receive calls.

use std::time::{Duration, Instant};

/// A poll-driven one-shot timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeadlineTimer {
    deadline: Option<Instant>,
}

impl DeadlineTimer {
    /// Creates a disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer to expire `timeout` from now, replacing any deadline.
    pub fn arm(&mut self, timeout: Duration) {
        self.deadline = Some(Instant::now() + timeout);
    }

    /// Disarms the timer; `expired` returns false until re-armed.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    /// Whether the timer currently holds a deadline.
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// True iff armed and the deadline has passed.
    pub fn expired(&self) -> bool {
        matches!(self.deadline, Some(d) if Instant::now() >= d)
    }

    /// Time until the deadline; zero if disarmed or already expired.
    pub fn remaining(&self) -> Duration {
        match self.deadline {
            Some(d) => d.saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }
}
