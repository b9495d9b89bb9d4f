// src/session/ticker.rs
//! Fixed-interval scheduling for backup snapshots

/// Fires at most once per poll when its interval has elapsed. Missed
/// intervals are not replayed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ticker {
    interval_ms: i64,
    next_due: Option<i64>,
}

impl Ticker {
    pub fn new(interval_ms: i64) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            next_due: None,
        }
    }

    pub fn interval_ms(&self) -> i64 {
        self.interval_ms
    }

    pub fn arm(&mut self, now: i64) {
        self.next_due = Some(now + self.interval_ms);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn fire_if_due(&mut self, now: i64) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.interval_ms);
                true
            }
            _ => false,
        }
    }
}
