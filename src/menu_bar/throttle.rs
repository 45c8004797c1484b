//! Coalesces bursts of refresh triggers.

use std::time::{Duration, Instant};

/// Fires at most once per `interval`.
///
/// The first trigger after a quiet period fires immediately. Triggers that
/// arrive before the interval has elapsed collapse into one pending fire at
/// the end of the interval.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_fire: Option<Instant>,
    pending: bool,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self { Throttle { interval, last_fire: None, pending: false } }

    /// Records a trigger. Returns true if it should fire right away.
    pub fn post(&mut self, now: Instant) -> bool {
        match self.last_fire {
            Some(last) if now.saturating_duration_since(last) < self.interval => {
                self.pending = true;
                false
            }
            _ => {
                self.fire(now);
                true
            }
        }
    }

    /// When the pending trigger is due, if there is one.
    pub fn next_deadline(&self) -> Option<Instant> {
        if !self.pending {
            return None;
        }
        self.last_fire.map(|last| last + self.interval)
    }

    /// Returns true, consuming the pending trigger, once it is due.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.next_deadline() {
            Some(deadline) if now >= deadline => {
                self.fire(now);
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool { self.pending }

    fn fire(&mut self, now: Instant) {
        self.last_fire = Some(now);
        self.pending = false;
    }
}
