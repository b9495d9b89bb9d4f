// src/session/recovery.rs
//! Startup decision between a shared route, a crash backup and a fresh start

use super::TrackSession;
use crate::{
    share::decode_payload,
    snapshot::{BackupSnapshot, SessionSummary},
    store::KeyValueStore,
};
use tracing::{error, info, warn};

pub const RESTORE_QUESTION: &str = "Unsaved route found! Would you like to restore it?";
pub const RESTORED_NOTICE: &str = "Route recovered successfully!";
pub const CORRUPT_BACKUP_NOTICE: &str = "Failed to restore previous route. It may be corrupted.";
pub const INVALID_SHARE_NOTICE: &str = "Failed to load shared route.";

#[derive(Debug, Clone, PartialEq)]
pub enum Recovery {
    /// A shared route was loaded for viewing.
    SharedRoute { entries: usize, distance_km: f64 },
    InvalidShare { reason: String },
    /// The backup was restored; the clock runs but no watch is attached.
    RestoredBackup {
        entries: usize,
        distance_km: f64,
        elapsed_ms: i64,
    },
    BackupDeclined,
    CorruptBackup { reason: String },
    NoRecovery { saved: Vec<SessionSummary> },
}

/// Runs once at startup, before any tracking command.
#[derive(Debug, Clone, Default)]
pub struct RecoveryCoordinator {
    share_payload: Option<String>,
}

impl RecoveryCoordinator {
    pub fn new(share_payload: Option<String>) -> Self {
        Self {
            share_payload: share_payload.filter(|payload| !payload.trim().is_empty()),
        }
    }

    /// First match wins: shared payload, then backup, then nothing.
    pub fn recover<S: KeyValueStore>(&self, session: &mut TrackSession<S>) -> Recovery {
        if let Some(payload) = &self.share_payload {
            return Self::load_shared(session, payload);
        }

        let raw = match session.store().read_backup_raw() {
            Ok(Some(raw)) => raw,
            Ok(None) => return Self::no_recovery(session),
            Err(e) => {
                warn!(error = %e, "Could not read route backup");
                return Self::no_recovery(session);
            }
        };

        if !session.prompt_mut().confirm(RESTORE_QUESTION) {
            info!("Backup restore declined, clearing backup");
            session.reset();
            return Recovery::BackupDeclined;
        }

        match BackupSnapshot::parse(&raw) {
            Ok(backup) => {
                let entries = backup.route_data.len();
                let distance_km = backup.total_distance;
                let elapsed_ms = backup.elapsed_time;
                session.restore_backup(backup);
                info!(entries, distance_km, elapsed_ms, "Route restored from backup");
                session.prompt_mut().notify(RESTORED_NOTICE);
                Recovery::RestoredBackup {
                    entries,
                    distance_km,
                    elapsed_ms,
                }
            }
            Err(reason) => {
                error!(error = %reason, "Failed to restore from backup");
                session.prompt_mut().notify(CORRUPT_BACKUP_NOTICE);
                session.reset();
                Recovery::CorruptBackup { reason }
            }
        }
    }

    fn load_shared<S: KeyValueStore>(session: &mut TrackSession<S>, payload: &str) -> Recovery {
        match decode_payload(payload) {
            Ok(log) => {
                let entries = log.len();
                let distance_km = log.path_km();
                session.load_read_only(log, distance_km, 0);
                info!(entries, "Shared route loaded");
                Recovery::SharedRoute {
                    entries,
                    distance_km,
                }
            }
            Err(e) => {
                error!(error = %e, "Invalid share data");
                session.prompt_mut().notify(INVALID_SHARE_NOTICE);
                Recovery::InvalidShare {
                    reason: e.to_string(),
                }
            }
        }
    }

    fn no_recovery<S: KeyValueStore>(session: &TrackSession<S>) -> Recovery {
        info!("No backup found, loading saved sessions");
        let saved = session.store().summaries().unwrap_or_else(|e| {
            warn!(error = %e, "Could not read saved sessions");
            Vec::new()
        });
        Recovery::NoRecovery { saved }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::TrackingConfig,
        geo::{Fix, Position},
        ports::{ManualClock, ManualSource, ScriptedPrompt},
        route::{RouteEntry, RouteLog},
        session::{BackupTick, FixOutcome, TrackState},
        share::encode_payload,
        store::{MemoryStore, BACKUP_KEY},
    };

    const START: i64 = 1_700_000_000_000;

    fn session_with(
        store: MemoryStore,
    ) -> (TrackSession<MemoryStore>, ManualClock, ManualSource, ScriptedPrompt) {
        let clock = ManualClock::new(START);
        let source = ManualSource::new();
        let prompt = ScriptedPrompt::new();
        let session = TrackSession::new(
            TrackingConfig::default(),
            store,
            source.clone(),
            clock.clone(),
            prompt.clone(),
        );
        (session, clock, source, prompt)
    }

    fn store_with_backup(raw: &str) -> MemoryStore {
        let mut store = MemoryStore::new();
        store.set(BACKUP_KEY, raw).unwrap();
        store
    }

    fn backup_json() -> String {
        let backup = BackupSnapshot {
            route_data: RouteLog::from(vec![
                RouteEntry::Location {
                    timestamp: 1,
                    coords: Position::new(0.0, 0.0),
                },
                RouteEntry::Location {
                    timestamp: 2,
                    coords: Position::new(0.0, 0.0001),
                },
            ]),
            total_distance: 0.011,
            elapsed_time: 90_000,
        };
        serde_json::to_string(&backup).unwrap()
    }

    #[test]
    fn test_share_payload_wins_over_backup() {
        let backup = backup_json();
        let (mut session, _, source, prompt) = session_with(store_with_backup(&backup));
        let shared = RouteLog::from(vec![RouteEntry::Location {
            timestamp: 5,
            coords: Position::new(51.5, -0.12),
        }]);
        let payload = encode_payload(&shared).unwrap();

        let recovery = RecoveryCoordinator::new(Some(payload)).recover(&mut session);
        assert!(matches!(recovery, Recovery::SharedRoute { entries: 1, .. }));
        assert!(session.is_read_only());
        assert_eq!(session.state(), TrackState::Idle);
        assert_eq!(source.subscribe_count(), 0);
        assert!(prompt.asked().is_empty());
        assert_eq!(session.store().read_backup_raw().unwrap(), Some(backup));
    }

    #[test]
    fn test_invalid_share_leaves_backup() {
        let backup = backup_json();
        let (mut session, _, _, prompt) = session_with(store_with_backup(&backup));
        let recovery = RecoveryCoordinator::new(Some("%%%".to_string())).recover(&mut session);
        assert!(matches!(recovery, Recovery::InvalidShare { .. }));
        assert_eq!(prompt.notices(), vec![INVALID_SHARE_NOTICE.to_string()]);
        assert_eq!(session.store().read_backup_raw().unwrap(), Some(backup));
        assert!(session.log().is_empty());
    }

    #[test]
    fn test_restore_backup_resumes_clock_not_watch() {
        let (mut session, clock, source, prompt) = session_with(store_with_backup(&backup_json()));
        prompt.push_confirm(true);

        let recovery = RecoveryCoordinator::default().recover(&mut session);
        assert_eq!(
            recovery,
            Recovery::RestoredBackup {
                entries: 2,
                distance_km: 0.011,
                elapsed_ms: 90_000,
            }
        );
        assert_eq!(prompt.asked(), vec![RESTORE_QUESTION.to_string()]);
        assert_eq!(session.state(), TrackState::Tracking);
        assert!(!session.is_watching());
        assert_eq!(source.subscribe_count(), 0);
        assert_eq!(session.last_known_position(), Some(Position::new(0.0, 0.0001)));

        clock.advance(10_000);
        assert_eq!(session.elapsed_ms(), 100_000);

        // backups continue on the usual interval
        clock.advance(10_000);
        assert_eq!(session.tick().backup, BackupTick::Written);

        session.resume_watch().unwrap();
        let id = source.current().unwrap();
        let outcome = session.on_position(id, Fix::new(0.0, 0.0002, 5.0));
        assert!(matches!(outcome, FixOutcome::Accepted { segment_km, .. } if segment_km == 0.0));
        assert_eq!(session.log().len(), 3);
    }

    #[test]
    fn test_restore_is_repeatable() {
        let raw = backup_json();
        for _ in 0..2 {
            let (mut session, _, _, prompt) = session_with(store_with_backup(&raw));
            prompt.push_confirm(true);
            let recovery = RecoveryCoordinator::default().recover(&mut session);
            assert!(matches!(recovery, Recovery::RestoredBackup { entries: 2, .. }));
            assert_eq!(session.store().read_backup_raw().unwrap(), Some(raw.clone()));
        }
    }

    #[test]
    fn test_declined_backup_is_deleted() {
        let (mut session, _, _, prompt) = session_with(store_with_backup(&backup_json()));
        prompt.push_confirm(false);
        assert_eq!(
            RecoveryCoordinator::default().recover(&mut session),
            Recovery::BackupDeclined
        );
        assert!(!session.store().has_backup().unwrap());
        assert_eq!(session.state(), TrackState::Idle);
    }

    #[test]
    fn test_empty_backup_is_corrupt() {
        let raw = r#"{"routeData":[],"totalDistance":1.2,"elapsedTime":5000}"#;
        let (mut session, _, _, prompt) = session_with(store_with_backup(raw));
        prompt.push_confirm(true);

        let recovery = RecoveryCoordinator::default().recover(&mut session);
        assert!(matches!(recovery, Recovery::CorruptBackup { .. }));
        assert_eq!(session.state(), TrackState::Idle);
        assert!(session.log().is_empty());
        assert_eq!(session.distance_km(), 0.0);
        assert!(!session.store().has_backup().unwrap());
        assert_eq!(prompt.notices(), vec![CORRUPT_BACKUP_NOTICE.to_string()]);
    }

    #[test]
    fn test_malformed_backup_is_corrupt() {
        let (mut session, _, _, prompt) = session_with(store_with_backup("{not json"));
        prompt.push_confirm(true);
        let recovery = RecoveryCoordinator::default().recover(&mut session);
        assert!(matches!(recovery, Recovery::CorruptBackup { .. }));
        assert!(!session.store().has_backup().unwrap());
    }

    #[test]
    fn test_no_recovery_lists_saved_sessions() {
        let (mut session, _, source, prompt) = session_with(MemoryStore::new());
        session.start().unwrap();
        let id = source.current().unwrap();
        session.on_position(id, Fix::new(0.0, 0.0, 5.0));
        prompt.push_confirm(true).push_text(Some("Oak trail"));
        session.stop().unwrap();

        match RecoveryCoordinator::new(Some("   ".to_string())).recover(&mut session) {
            Recovery::NoRecovery { saved } => {
                assert_eq!(saved.len(), 1);
                assert_eq!(saved[0].name, "Oak trail");
            }
            other => panic!("unexpected recovery {:?}", other),
        }
    }
}
