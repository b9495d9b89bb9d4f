// src/session/state.rs
//! Tracking states and the pausable elapsed-time clock

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackState {
    #[default]
    Idle,
    Tracking,
    Paused,
    /// Waiting on the save decision; never observable after `stop` returns.
    Stopped,
}

impl TrackState {
    pub fn is_active(&self) -> bool {
        matches!(self, TrackState::Tracking | TrackState::Paused)
    }
}

impl fmt::Display for TrackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TrackState::Idle => "idle",
            TrackState::Tracking => "tracking",
            TrackState::Paused => "paused",
            TrackState::Stopped => "stopped",
        };
        f.write_str(label)
    }
}

/// Elapsed time as a baseline from earlier running windows plus the
/// current window, if the clock is running.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stopwatch {
    baseline_ms: i64,
    running_since: Option<i64>,
}

impl Stopwatch {
    pub fn start(&mut self, now: i64) {
        *self = Self {
            baseline_ms: 0,
            running_since: Some(now),
        };
    }

    /// Continue from an offset recovered from a backup.
    pub fn start_from(&mut self, offset_ms: i64, now: i64) {
        *self = Self {
            baseline_ms: offset_ms.max(0),
            running_since: Some(now),
        };
    }

    /// Stopped clock showing a fixed value, for routes loaded for viewing.
    pub fn hold(&mut self, elapsed_ms: i64) {
        *self = Self {
            baseline_ms: elapsed_ms.max(0),
            running_since: None,
        };
    }

    pub fn freeze(&mut self, now: i64) {
        self.baseline_ms = self.elapsed_ms(now);
        self.running_since = None;
    }

    pub fn resume(&mut self, now: i64) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn elapsed_ms(&self, now: i64) -> i64 {
        match self.running_since {
            Some(since) => self.baseline_ms + (now - since).max(0),
            None => self.baseline_ms,
        }
    }
}
