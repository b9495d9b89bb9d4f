// src/session/mod.rs
//! Route tracking session and startup recovery

mod state;
mod ticker;
mod track;
pub mod recovery;

pub use recovery::{Recovery, RecoveryCoordinator};
pub use state::{Stopwatch, TrackState};
pub use ticker::Ticker;
pub use track::{
    BackupTick, FixOutcome, StopOutcome, TickReport, TrackSession, NAME_QUESTION,
    SAVE_FAILED_NOTICE, SAVE_QUESTION,
};
