// src/session/track.rs
//! The tracking state machine: route log, distance, elapsed clock and backups

use super::{state::Stopwatch, ticker::Ticker, TrackState};
use crate::{
    config::TrackingConfig,
    error::{Result, StoreError, TrackerError},
    geo::{segment_km, FilterVerdict, Fix, Position},
    ports::{Clock, PositionSource, Prompt, SubscriptionId},
    route::{AccessibilityAnswers, NoteContent, RouteEntry, RouteLog},
    snapshot::{format_elapsed, parse_elapsed, BackupSnapshot, SessionSnapshot},
    store::{KeyValueStore, SessionStore, StorageUsage},
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

pub const SAVE_QUESTION: &str = "Do you want to save this route?";
pub const NAME_QUESTION: &str = "Enter a name for this route:";
pub const SAVE_FAILED_NOTICE: &str =
    "Could not save the route. Storage may be full. Try exporting and clearing older data.";

/// What happened to a delivered fix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    Accepted { segment_km: f64, total_km: f64 },
    Rejected(FilterVerdict),
    /// Delivered after the subscription was cancelled or the state changed.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    Saved { index: usize, snapshot: SessionSnapshot },
    /// The save was declined; tracking continues with the route intact.
    Resumed,
    NothingToSave,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackupTick {
    NotDue,
    Written,
    Failed(String),
}

/// Snapshot of the live counters, produced once per display tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub state: TrackState,
    pub elapsed_ms: i64,
    pub distance_km: f64,
    pub entries: usize,
    pub watching: bool,
    pub backup: BackupTick,
}

impl TickReport {
    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed_ms)
    }
}

/// Owns the route being recorded. All mutation goes through its transition
/// methods; the ports are injected at construction.
pub struct TrackSession<S: KeyValueStore> {
    config: TrackingConfig,
    store: SessionStore<S>,
    source: Box<dyn PositionSource>,
    clock: Box<dyn Clock>,
    prompt: Box<dyn Prompt>,
    state: TrackState,
    log: RouteLog,
    distance_km: f64,
    stopwatch: Stopwatch,
    backup: Ticker,
    subscription: Option<SubscriptionId>,
    /// Last accepted fix; the reference for jump filtering and distance.
    previous: Option<Position>,
    /// Where notes get pinned.
    last_known: Option<Position>,
    read_only: bool,
}

impl<S: KeyValueStore> TrackSession<S> {
    pub fn new(
        config: TrackingConfig,
        store: S,
        source: impl PositionSource + 'static,
        clock: impl Clock + 'static,
        prompt: impl Prompt + 'static,
    ) -> Self {
        Self {
            config,
            store: SessionStore::new(store),
            source: Box::new(source),
            clock: Box::new(clock),
            prompt: Box::new(prompt),
            state: TrackState::Idle,
            log: RouteLog::new(),
            distance_km: 0.0,
            stopwatch: Stopwatch::default(),
            backup: Ticker::new(config.backup_interval_ms),
            subscription: None,
            previous: None,
            last_known: None,
            read_only: false,
        }
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn log(&self) -> &RouteLog {
        &self.log
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn elapsed_ms(&self) -> i64 {
        self.stopwatch.elapsed_ms(self.clock.now_ms())
    }

    pub fn elapsed_display(&self) -> String {
        format_elapsed(self.elapsed_ms())
    }

    pub fn is_watching(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn subscription(&self) -> Option<SubscriptionId> {
        self.subscription
    }

    /// Whether the loaded route is a shared or saved one opened for viewing.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn last_known_position(&self) -> Option<Position> {
        self.last_known
    }

    pub fn config(&self) -> &TrackingConfig {
        &self.config
    }

    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SessionStore<S> {
        &mut self.store
    }

    pub fn usage(&self) -> std::result::Result<StorageUsage, StoreError> {
        self.store.usage(Some(&self.log))
    }

    pub(crate) fn prompt_mut(&mut self) -> &mut dyn Prompt {
        self.prompt.as_mut()
    }

    fn invalid(&self, action: &'static str) -> TrackerError {
        TrackerError::InvalidTransition {
            action,
            state: self.state,
        }
    }

    fn open_watch(&mut self) -> Result<SubscriptionId> {
        self.source
            .subscribe()
            .map_err(|e| TrackerError::NoLocationSupport(e.to_string()))
    }

    fn release_watch(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.source.unsubscribe(id);
            debug!(subscription = %id, "Position watch released");
        }
    }

    fn clear_route(&mut self) {
        self.log.clear();
        self.distance_km = 0.0;
        self.stopwatch.reset();
        self.previous = None;
        self.last_known = None;
        self.read_only = false;
    }

    fn write_backup(&mut self, now: i64) -> std::result::Result<(), StoreError> {
        let backup = BackupSnapshot {
            route_data: self.log.clone(),
            total_distance: self.distance_km,
            elapsed_time: self.stopwatch.elapsed_ms(now),
        };
        self.store.write_backup(&backup)
    }

    /// Idle → Tracking. Clears the previous route and opens a fresh watch.
    pub fn start(&mut self) -> Result<()> {
        if self.state != TrackState::Idle {
            return Err(self.invalid("start"));
        }

        let subscription = self.open_watch()?;
        let now = self.clock.now_ms();

        self.clear_route();
        self.subscription = Some(subscription);
        self.stopwatch.start(now);
        self.backup.arm(now);
        self.state = TrackState::Tracking;

        info!(subscription = %subscription, "Tracking started");
        Ok(())
    }

    /// Feed one fix from subscription `id`.
    pub fn on_position(&mut self, id: SubscriptionId, fix: Fix) -> FixOutcome {
        if self.state != TrackState::Tracking || self.subscription != Some(id) {
            debug!(subscription = %id, state = %self.state, "Ignoring stale position sample");
            return FixOutcome::Stale;
        }

        let verdict = self
            .config
            .filter
            .accept(fix.position, fix.accuracy_m, self.previous);
        if !verdict.is_accepted() {
            debug!(?verdict, accuracy_m = fix.accuracy_m, "Fix rejected");
            return FixOutcome::Rejected(verdict);
        }

        let segment_km = self
            .previous
            .map(|previous| segment_km(previous, fix.position))
            .unwrap_or(0.0);
        self.distance_km += segment_km;
        self.previous = Some(fix.position);
        self.last_known = Some(fix.position);
        self.log.push(RouteEntry::Location {
            timestamp: self.clock.now_ms(),
            coords: fix.position,
        });

        FixOutcome::Accepted {
            segment_km,
            total_km: self.distance_km,
        }
    }

    /// The reader behind subscription `id` stopped. The watch is released so
    /// `is_watching` stays truthful; the route and clock are untouched and
    /// `resume_watch` reattaches.
    pub fn on_position_error(&mut self, id: SubscriptionId, message: &str) {
        if self.subscription != Some(id) {
            return;
        }
        warn!(subscription = %id, error = %message, "GPS error, position watch lost");
        self.release_watch();
        self.previous = None;
    }

    /// Tracking → Paused. The watch is released and a backup written so the
    /// paused route survives a restart.
    pub fn pause(&mut self) -> Result<()> {
        if self.state != TrackState::Tracking {
            return Err(self.invalid("pause"));
        }

        let now = self.clock.now_ms();
        self.release_watch();
        self.stopwatch.freeze(now);
        self.backup.cancel();
        self.state = TrackState::Paused;

        if !self.log.is_empty() {
            if let Err(e) = self.write_backup(now) {
                warn!(error = %e, "Failed to write backup on pause");
            }
        }

        info!(elapsed = %self.elapsed_display(), "Tracking paused");
        Ok(())
    }

    /// Paused → Tracking on a new subscription; the clock continues from
    /// where it was frozen.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != TrackState::Paused {
            return Err(self.invalid("resume"));
        }

        let subscription = self.open_watch()?;
        let now = self.clock.now_ms();

        self.subscription = Some(subscription);
        // Movement while paused is not route distance.
        self.previous = None;
        self.stopwatch.resume(now);
        self.backup.arm(now);
        self.state = TrackState::Tracking;

        info!(subscription = %subscription, "Tracking resumed");
        Ok(())
    }

    /// Attach a live watch to a route restored from backup.
    pub fn resume_watch(&mut self) -> Result<()> {
        if self.state != TrackState::Tracking || self.subscription.is_some() {
            return Err(self.invalid("attach a position watch"));
        }

        let subscription = self.open_watch()?;
        self.subscription = Some(subscription);
        self.previous = None;

        info!(subscription = %subscription, entries = self.log.len(), "Position watch attached to restored route");
        Ok(())
    }

    /// Pin a note to the most recent known position.
    pub fn add_note(&mut self, content: NoteContent) -> Result<()> {
        if !self.state.is_active() {
            return Err(self.invalid("add a note"));
        }
        let coords = self.last_known.ok_or(TrackerError::NoKnownPosition)?;

        let entry = content.into_entry(self.clock.now_ms(), coords);
        info!(kind = entry.kind(), "Note added");
        self.log.push(entry);
        Ok(())
    }

    pub fn add_accessibility(&mut self, answers: AccessibilityAnswers) -> Result<()> {
        if !self.state.is_active() {
            return Err(self.invalid("record accessibility answers"));
        }

        info!(answers = answers.len(), "Accessibility answers recorded");
        self.log.push(RouteEntry::Accessibility {
            timestamp: self.clock.now_ms(),
            content: answers,
        });
        Ok(())
    }

    /// Tracking/Paused → Stopped → save decision.
    ///
    /// Saving persists the route and resets to Idle. Declining (or giving no
    /// name) resumes tracking with the route intact. A failed save keeps the
    /// route, notifies the user, restores the pre-stop state and returns the
    /// error.
    pub fn stop(&mut self) -> Result<StopOutcome> {
        let prior = self.state;
        if !prior.is_active() {
            return Err(self.invalid("stop"));
        }

        let now = self.clock.now_ms();
        let had_watch = self.subscription.is_some();
        self.release_watch();
        self.stopwatch.freeze(now);
        self.backup.cancel();
        self.state = TrackState::Stopped;

        if self.log.is_empty() {
            info!("Stopped with an empty route, nothing to save");
            self.reset();
            return Ok(StopOutcome::NothingToSave);
        }

        let rewatch = had_watch || prior == TrackState::Paused;

        if !self.prompt.confirm(SAVE_QUESTION) {
            info!("Save declined, tracking continues");
            self.unstop(TrackState::Tracking, rewatch);
            return Ok(StopOutcome::Resumed);
        }

        let date = DateTime::<Utc>::from_timestamp_millis(now).unwrap_or_else(Utc::now);
        let default_name = format!("Route {}", date.format("%Y-%m-%d %H:%M"));
        let name = match self.prompt.prompt_text(NAME_QUESTION, &default_name) {
            Some(name) if !name.trim().is_empty() => name.trim().to_string(),
            _ => {
                info!("Save cancelled, no name provided");
                self.unstop(TrackState::Tracking, rewatch);
                return Ok(StopOutcome::Resumed);
            }
        };

        let snapshot = SessionSnapshot::capture(
            name,
            date,
            self.stopwatch.elapsed_ms(now),
            self.distance_km,
            self.log.clone(),
        );

        match self.store.append_session(&snapshot) {
            Ok(index) => {
                if let Err(e) = self.store.remove_backup() {
                    warn!(error = %e, "Failed to remove backup after save");
                }
                info!(
                    distance = %snapshot.distance,
                    time = %snapshot.time,
                    "Route completed"
                );
                self.clear_route();
                self.state = TrackState::Idle;
                Ok(StopOutcome::Saved { index, snapshot })
            }
            Err(e) => {
                error!(error = %e, entries = self.log.len(), "Save failed, route kept in memory");
                self.prompt.notify(SAVE_FAILED_NOTICE);
                self.unstop(prior, had_watch);
                Err(e.into())
            }
        }
    }

    fn unstop(&mut self, target: TrackState, rewatch: bool) {
        self.state = target;
        if target != TrackState::Tracking {
            return;
        }

        let now = self.clock.now_ms();
        if rewatch {
            match self.open_watch() {
                Ok(id) => self.subscription = Some(id),
                Err(e) => warn!(error = %e, "Could not reopen position watch"),
            }
        }
        self.stopwatch.resume(now);
        self.backup.arm(now);
    }

    /// Clear the route and counters from any state and drop the backup.
    pub fn reset(&mut self) {
        self.release_watch();
        self.backup.cancel();
        self.clear_route();
        self.state = TrackState::Idle;

        if let Err(e) = self.store.remove_backup() {
            warn!(error = %e, "Failed to remove backup on reset");
        }
        info!("Session reset");
    }

    /// Called once per second by the event loop. Writes the backup when due.
    pub fn tick(&mut self) -> TickReport {
        let now = self.clock.now_ms();

        let backup = if self.state == TrackState::Tracking
            && !self.log.is_empty()
            && self.backup.fire_if_due(now)
        {
            match self.write_backup(now) {
                Ok(()) => BackupTick::Written,
                Err(e) => {
                    warn!(error = %e, "Auto-backup failed");
                    BackupTick::Failed(e.to_string())
                }
            }
        } else {
            BackupTick::NotDue
        };

        TickReport {
            state: self.state,
            elapsed_ms: self.stopwatch.elapsed_ms(now),
            distance_km: self.distance_km,
            entries: self.log.len(),
            watching: self.subscription.is_some(),
            backup,
        }
    }

    /// Open a saved session for viewing. Only while Idle.
    pub fn view_saved(&mut self, index: usize) -> Result<SessionSnapshot> {
        if self.state != TrackState::Idle {
            return Err(self.invalid("open a saved session"));
        }
        let snapshot = self
            .store
            .session(index)?
            .filter(|snapshot| !snapshot.data.is_empty())
            .ok_or(TrackerError::SessionNotFound(index))?;

        self.load_read_only(
            snapshot.data.clone(),
            snapshot.distance_km(),
            parse_elapsed(&snapshot.time).unwrap_or(0),
        );
        Ok(snapshot)
    }

    pub fn view_most_recent(&mut self) -> Result<Option<SessionSnapshot>> {
        let count = self.store.list_sessions()?.len();
        if count == 0 {
            return Ok(None);
        }
        self.view_saved(count - 1).map(Some)
    }

    pub(crate) fn load_read_only(&mut self, log: RouteLog, distance_km: f64, elapsed_ms: i64) {
        self.release_watch();
        self.backup.cancel();
        self.clear_route();
        self.last_known = log.last_position();
        self.log = log;
        self.distance_km = distance_km;
        self.stopwatch.hold(elapsed_ms);
        self.read_only = true;
        self.state = TrackState::Idle;
    }

    /// Rehydrate from a validated backup: clock and backups resume, the
    /// position watch does not.
    pub(crate) fn restore_backup(&mut self, backup: BackupSnapshot) {
        let now = self.clock.now_ms();
        self.release_watch();
        self.clear_route();

        self.last_known = backup.route_data.last_position();
        self.log = backup.route_data;
        self.distance_km = backup.total_distance;
        self.stopwatch.start_from(backup.elapsed_time, now);
        self.backup.arm(now);
        self.state = TrackState::Tracking;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::StoreError,
        ports::{ManualClock, ManualSource, ScriptedPrompt},
        store::{MemoryStore, BACKUP_KEY},
    };

    struct Harness {
        session: TrackSession<MemoryStore>,
        clock: ManualClock,
        source: ManualSource,
        prompt: ScriptedPrompt,
    }

    fn harness_with(store: MemoryStore) -> Harness {
        let clock = ManualClock::new(1_700_000_000_000);
        let source = ManualSource::new();
        let prompt = ScriptedPrompt::new();
        let session = TrackSession::new(
            TrackingConfig::default(),
            store,
            source.clone(),
            clock.clone(),
            prompt.clone(),
        );
        Harness {
            session,
            clock,
            source,
            prompt,
        }
    }

    fn harness() -> Harness {
        harness_with(MemoryStore::new())
    }

    impl Harness {
        fn feed(&mut self, lat: f64, lng: f64) -> FixOutcome {
            let id = self.source.current().expect("live subscription");
            self.session.on_position(id, Fix::new(lat, lng, 5.0))
        }

        /// Three fixes roughly eleven metres apart along the equator.
        fn walk_three(&mut self) {
            for step in 0..3 {
                let outcome = self.feed(0.0, step as f64 * 0.0001);
                assert!(matches!(outcome, FixOutcome::Accepted { .. }));
            }
        }
    }

    #[test]
    fn test_start_opens_single_watch() {
        let mut h = harness();
        h.session.start().unwrap();
        assert_eq!(h.session.state(), TrackState::Tracking);
        assert_eq!(h.source.active().len(), 1);
        assert!(h.session.start().is_err());
        assert_eq!(h.source.active().len(), 1);
    }

    #[test]
    fn test_start_without_location_support() {
        let mut h = harness();
        let mut session = TrackSession::new(
            TrackingConfig::default(),
            MemoryStore::new(),
            ManualSource::unavailable("no receiver"),
            h.clock.clone(),
            h.prompt.clone(),
        );
        let err = session.start().unwrap_err();
        assert!(matches!(err, TrackerError::NoLocationSupport(_)));
        assert_eq!(session.state(), TrackState::Idle);
        // the harness session is untouched
        h.session.start().unwrap();
    }

    #[test]
    fn test_accepted_fixes_accumulate_distance() {
        let mut h = harness();
        h.session.start().unwrap();
        h.walk_three();

        assert_eq!(h.session.log().len(), 3);
        let expected = 2.0 * segment_km(Position::new(0.0, 0.0), Position::new(0.0, 0.0001));
        assert!((h.session.distance_km() - expected).abs() < 1e-12);
        assert_eq!(h.session.log().path().len(), 3);
    }

    #[test]
    fn test_rejected_fixes_change_nothing() {
        let mut h = harness();
        h.session.start().unwrap();
        h.feed(0.0, 0.0);

        let id = h.source.current().unwrap();
        let low = h.session.on_position(id, Fix::new(0.0, 0.0001, 40.0));
        assert_eq!(low, FixOutcome::Rejected(FilterVerdict::RejectedLowAccuracy));
        let jump = h.session.on_position(id, Fix::new(0.0, 0.01, 5.0));
        assert!(matches!(jump, FixOutcome::Rejected(FilterVerdict::RejectedJump { .. })));

        assert_eq!(h.session.log().len(), 1);
        assert_eq!(h.session.distance_km(), 0.0);
    }

    #[test]
    fn test_non_finite_fix_is_rejected() {
        let mut h = harness();
        h.session.start().unwrap();
        let id = h.source.current().unwrap();

        let first = h.session.on_position(id, Fix::new(f64::NAN, 0.0, 5.0));
        assert_eq!(first, FixOutcome::Rejected(FilterVerdict::RejectedInvalidPosition));
        assert!(h.session.log().is_empty());
        assert_eq!(h.session.last_known_position(), None);

        h.feed(0.0, 0.0);
        let after = h.session.on_position(id, Fix::new(0.0, f64::INFINITY, 5.0));
        assert_eq!(after, FixOutcome::Rejected(FilterVerdict::RejectedInvalidPosition));
        assert!(matches!(h.feed(0.0, 0.0001), FixOutcome::Accepted { .. }));
        assert_eq!(h.session.log().len(), 2);
        assert!(h.session.distance_km().is_finite());

        h.clock.advance(20_000);
        assert_eq!(h.session.tick().backup, BackupTick::Written);
        let raw = h.session.store().read_backup_raw().unwrap().unwrap();
        assert!(BackupSnapshot::parse(&raw).is_ok());
    }

    #[test]
    fn test_source_error_releases_watch() {
        let mut h = harness();
        h.session.start().unwrap();
        h.walk_three();
        let id = h.source.current().unwrap();

        h.session.on_position_error(SubscriptionId(id.0 + 10), "other");
        assert!(h.session.is_watching());

        h.session.on_position_error(id, "gpsd closed the connection");
        assert!(!h.session.is_watching());
        assert!(h.source.active().is_empty());
        assert_eq!(h.session.state(), TrackState::Tracking);
        assert_eq!(h.session.log().len(), 3);
        assert_eq!(h.session.on_position(id, Fix::new(0.0, 0.0003, 5.0)), FixOutcome::Stale);

        h.session.resume_watch().unwrap();
        assert!(h.session.is_watching());
        assert_eq!(h.source.active().len(), 1);
    }

    #[test]
    fn test_jump_is_measured_from_last_accepted_fix() {
        let mut h = harness();
        h.session.start().unwrap();
        h.feed(0.0, 0.0);
        // rejected teleport does not become the new reference
        h.feed(0.0, 0.01);
        assert!(matches!(h.feed(0.0, 0.0001), FixOutcome::Accepted { .. }));
    }

    #[test]
    fn test_pause_resume_elapsed() {
        let mut h = harness();
        h.session.start().unwrap();
        h.clock.advance(5_000);
        h.session.pause().unwrap();
        h.clock.advance(3_000);
        assert_eq!(h.session.elapsed_ms(), 5_000);
        h.session.resume().unwrap();
        h.clock.advance(2_000);
        assert_eq!(h.session.elapsed_ms(), 7_000);
        assert_eq!(h.session.elapsed_display(), "00:00:07");
    }

    #[test]
    fn test_pause_releases_watch_and_ignores_late_fix() {
        let mut h = harness();
        h.session.start().unwrap();
        h.feed(0.0, 0.0);
        let old = h.source.current().unwrap();

        h.session.pause().unwrap();
        assert!(h.source.active().is_empty());
        assert_eq!(h.session.on_position(old, Fix::new(0.0, 0.0001, 5.0)), FixOutcome::Stale);

        h.session.resume().unwrap();
        let new = h.source.current().unwrap();
        assert_ne!(old, new);
        // queued sample from the old subscription is still stale
        assert_eq!(h.session.on_position(old, Fix::new(0.0, 0.0001, 5.0)), FixOutcome::Stale);
        assert_eq!(h.session.log().len(), 1);
    }

    #[test]
    fn test_resume_does_not_count_distance_moved_while_paused() {
        let mut h = harness();
        h.session.start().unwrap();
        h.feed(0.0, 0.0);
        h.session.pause().unwrap();
        h.session.resume().unwrap();
        // a kilometre away: would be a jump relative to the pre-pause fix
        let outcome = h.feed(0.0, 0.009);
        assert_eq!(outcome, FixOutcome::Accepted { segment_km: 0.0, total_km: 0.0 });
    }

    #[test]
    fn test_pause_writes_backup() {
        let mut h = harness();
        h.session.start().unwrap();
        h.feed(0.0, 0.0);
        h.clock.advance(4_000);
        h.session.pause().unwrap();

        let raw = h.session.store().read_backup_raw().unwrap().unwrap();
        let backup = BackupSnapshot::parse(&raw).unwrap();
        assert_eq!(backup.elapsed_time, 4_000);
        assert_eq!(backup.route_data.len(), 1);
    }

    #[test]
    fn test_stop_discard_is_non_destructive() {
        let mut h = harness();
        h.session.start().unwrap();
        h.walk_three();

        h.prompt.push_confirm(false);
        assert_eq!(h.session.stop().unwrap(), StopOutcome::Resumed);
        assert_eq!(h.session.state(), TrackState::Tracking);
        assert_eq!(h.session.log().len(), 3);
        assert_eq!(h.source.active().len(), 1);

        assert!(matches!(h.feed(0.0, 0.0003), FixOutcome::Accepted { .. }));
        assert_eq!(h.session.log().len(), 4);
    }

    #[test]
    fn test_stop_without_name_resumes() {
        let mut h = harness();
        h.session.start().unwrap();
        h.walk_three();
        h.prompt.push_confirm(true).push_text(None);
        assert_eq!(h.session.stop().unwrap(), StopOutcome::Resumed);
        assert_eq!(h.session.log().len(), 3);
        assert!(h.session.store().list_sessions().unwrap().is_empty());
    }

    #[test]
    fn test_stop_from_paused_discard_resumes_tracking() {
        let mut h = harness();
        h.session.start().unwrap();
        h.walk_three();
        h.session.pause().unwrap();
        h.prompt.push_confirm(false);
        assert_eq!(h.session.stop().unwrap(), StopOutcome::Resumed);
        assert_eq!(h.session.state(), TrackState::Tracking);
        assert!(h.session.is_watching());
    }

    #[test]
    fn test_stop_save_persists_and_resets() {
        let mut h = harness();
        h.session.start().unwrap();
        h.walk_three();
        h.clock.advance(65_000);
        assert_eq!(h.session.tick().backup, BackupTick::Written);
        assert!(h.session.store().has_backup().unwrap());

        h.prompt.push_confirm(true).push_text(Some("  Beech wood  "));
        let outcome = h.session.stop().unwrap();
        match outcome {
            StopOutcome::Saved { index, snapshot } => {
                assert_eq!(index, 0);
                assert_eq!(snapshot.name, "Beech wood");
                assert_eq!(snapshot.time, "00:01:05");
                assert_eq!(snapshot.data.len(), 3);
                assert_eq!(snapshot.distance, "0.02");
            }
            other => panic!("expected save, got {:?}", other),
        }

        assert_eq!(h.session.state(), TrackState::Idle);
        assert!(h.session.log().is_empty());
        assert_eq!(h.session.distance_km(), 0.0);
        assert_eq!(h.session.elapsed_ms(), 0);
        assert!(h.source.active().is_empty());
        assert!(!h.session.store().has_backup().unwrap());
        assert_eq!(h.session.store().list_sessions().unwrap().len(), 1);
    }

    #[test]
    fn test_stop_empty_route() {
        let mut h = harness();
        h.session.start().unwrap();
        assert_eq!(h.session.stop().unwrap(), StopOutcome::NothingToSave);
        assert_eq!(h.session.state(), TrackState::Idle);
        assert!(h.prompt.asked().is_empty());
    }

    #[test]
    fn test_quota_failure_keeps_route() {
        let mut h = harness_with(MemoryStore::with_quota(300));
        h.session.start().unwrap();
        h.walk_three();
        h.session
            .add_note(NoteContent::Photo(format!("data:image/jpeg;base64,{}", "A".repeat(400))))
            .unwrap();

        h.prompt.push_confirm(true).push_text(Some("Too big"));
        let err = h.session.stop().unwrap_err();
        assert!(matches!(
            err,
            TrackerError::PersistenceQuotaExceeded(StoreError::QuotaExceeded { .. })
        ));
        assert_eq!(h.session.state(), TrackState::Tracking);
        assert_eq!(h.session.log().len(), 4);
        assert!(h.session.is_watching());
        assert_eq!(h.prompt.notices(), vec![SAVE_FAILED_NOTICE.to_string()]);
    }

    #[test]
    fn test_quota_failure_from_paused_stays_paused() {
        let mut h = harness_with(MemoryStore::with_quota(300));
        h.session.start().unwrap();
        h.feed(0.0, 0.0);
        h.session
            .add_note(NoteContent::Text("x".repeat(400)))
            .unwrap();
        h.session.pause().unwrap();

        h.prompt.push_confirm(true).push_text(Some("Paused route"));
        assert!(h.session.stop().is_err());
        assert_eq!(h.session.state(), TrackState::Paused);
        assert!(!h.session.is_watching());
        assert_eq!(h.session.log().len(), 2);
    }

    #[test]
    fn test_stop_ignores_late_fix() {
        let mut h = harness();
        h.session.start().unwrap();
        h.walk_three();
        let id = h.source.current().unwrap();
        h.prompt.push_confirm(true).push_text(Some("done"));
        h.session.stop().unwrap();
        assert_eq!(h.session.on_position(id, Fix::new(0.0, 0.0003, 5.0)), FixOutcome::Stale);
        assert!(h.session.log().is_empty());
    }

    #[test]
    fn test_notes_use_last_known_position() {
        let mut h = harness();
        h.session.start().unwrap();
        assert!(matches!(
            h.session.add_note(NoteContent::Text("too early".to_string())),
            Err(TrackerError::NoKnownPosition)
        ));

        h.feed(10.0, 20.0);
        let before = h.session.distance_km();
        h.session.add_note(NoteContent::Text("fern".to_string())).unwrap();
        h.session.pause().unwrap();
        h.session
            .add_note(NoteContent::Audio("data:audio/webm;base64,AA".to_string()))
            .unwrap();
        h.session
            .add_accessibility(AccessibilityAnswers::new().with_answer("bench", true))
            .unwrap();

        let entries = h.session.log().entries();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1].coords(), Some(Position::new(10.0, 20.0)));
        assert_eq!(entries[2].kind(), "audio");
        assert_eq!(entries[3].coords(), None);
        assert_eq!(h.session.distance_km(), before);
    }

    #[test]
    fn test_notes_rejected_when_idle() {
        let mut h = harness();
        assert!(h.session.add_note(NoteContent::Text("x".to_string())).is_err());
        assert!(h.session.add_accessibility(AccessibilityAnswers::new()).is_err());
    }

    #[test]
    fn test_reset_from_any_state() {
        let mut h = harness();
        h.session.reset();
        assert_eq!(h.session.state(), TrackState::Idle);

        h.session.start().unwrap();
        h.walk_three();
        h.clock.advance(20_000);
        h.session.tick();
        let id = h.source.current().unwrap();

        h.session.reset();
        assert_eq!(h.session.state(), TrackState::Idle);
        assert!(h.session.log().is_empty());
        assert_eq!(h.session.distance_km(), 0.0);
        assert!(h.source.active().is_empty());
        assert!(h.session.store().inner().get(BACKUP_KEY).unwrap().is_none());
        assert_eq!(h.session.on_position(id, Fix::new(0.0, 0.0, 5.0)), FixOutcome::Stale);
    }

    #[test]
    fn test_backup_every_interval_while_tracking() {
        let mut h = harness();
        h.session.start().unwrap();
        h.feed(0.0, 0.0);

        h.clock.advance(19_000);
        assert_eq!(h.session.tick().backup, BackupTick::NotDue);
        h.clock.advance(1_000);
        let report = h.session.tick();
        assert_eq!(report.backup, BackupTick::Written);
        assert_eq!(report.elapsed_display(), "00:00:20");

        h.feed(0.0, 0.0001);
        h.clock.advance(20_000);
        h.session.tick();
        let raw = h.session.store().read_backup_raw().unwrap().unwrap();
        let backup = BackupSnapshot::parse(&raw).unwrap();
        assert_eq!(backup.route_data.len(), 2);
        assert_eq!(backup.elapsed_time, 40_000);
    }

    #[test]
    fn test_no_backup_while_paused() {
        let mut h = harness();
        h.session.start().unwrap();
        h.feed(0.0, 0.0);
        h.session.pause().unwrap();
        h.session.store_mut().remove_backup().unwrap();
        h.clock.advance(60_000);
        assert_eq!(h.session.tick().backup, BackupTick::NotDue);
        assert!(!h.session.store().has_backup().unwrap());
    }

    #[test]
    fn test_backup_failure_is_reported_not_fatal() {
        let mut h = harness_with(MemoryStore::with_quota(10));
        h.session.start().unwrap();
        h.feed(0.0, 0.0);
        h.clock.advance(20_000);
        assert!(matches!(h.session.tick().backup, BackupTick::Failed(_)));
        assert_eq!(h.session.state(), TrackState::Tracking);
        assert_eq!(h.session.log().len(), 1);
    }

    #[test]
    fn test_view_saved_is_read_only() {
        let mut h = harness();
        h.session.start().unwrap();
        h.walk_three();
        h.clock.advance(3_000);
        h.prompt.push_confirm(true).push_text(Some("Meadow"));
        h.session.stop().unwrap();

        let snapshot = h.session.view_saved(0).unwrap();
        assert_eq!(snapshot.name, "Meadow");
        assert!(h.session.is_read_only());
        assert_eq!(h.session.state(), TrackState::Idle);
        assert_eq!(h.session.log().len(), 3);
        assert_eq!(h.session.elapsed_ms(), 3_000);
        assert!(!h.session.is_watching());
        assert!(matches!(h.session.view_saved(9), Err(TrackerError::SessionNotFound(9))));

        // starting a new route replaces the view
        h.session.start().unwrap();
        assert!(!h.session.is_read_only());
        assert!(h.session.log().is_empty());
    }

    #[test]
    fn test_view_most_recent() {
        let mut h = harness();
        assert_eq!(h.session.view_most_recent().unwrap(), None);
        for name in ["one", "two"] {
            h.session.start().unwrap();
            h.feed(0.0, 0.0);
            h.prompt.push_confirm(true).push_text(Some(name));
            h.session.stop().unwrap();
        }
        assert_eq!(h.session.view_most_recent().unwrap().unwrap().name, "two");
    }

    #[test]
    fn test_resume_watch_only_for_unwatched_tracking() {
        let mut h = harness();
        assert!(h.session.resume_watch().is_err());
        h.session.start().unwrap();
        assert!(h.session.resume_watch().is_err());
    }
}
