// src/lib.rs
//! Nature Tracker Library
//!
//! Records a walking route from a GPS receiver, pins notes, media and
//! accessibility answers to it, keeps a crash-safe backup of the route in
//! progress and recovers it on the next start.

pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod geo;
pub mod gps;
pub mod media;
pub mod ports;
pub mod route;
pub mod session;
pub mod share;
pub mod snapshot;
pub mod store;
pub mod tracker;

// Re-export main types for convenience
pub use config::{TrackerConfig, TrackingConfig};
pub use error::{Result, SourceError, StoreError, TrackerError};
pub use geo::{Fix, GeoFilter, Position};
pub use route::{NoteContent, RouteEntry, RouteLog};
pub use session::{Recovery, RecoveryCoordinator, TrackSession, TrackState};
pub use snapshot::{BackupSnapshot, SessionSnapshot};
pub use store::{FileStore, KeyValueStore, MemoryStore, SessionStore};
