// src/store/mod.rs
//! Session persistence over an opaque key-value store

pub mod file;
pub mod memory;

use crate::{
    error::StoreError,
    route::RouteLog,
    snapshot::{BackupSnapshot, SessionSnapshot, SessionSummary},
};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

pub use file::FileStore;
pub use memory::MemoryStore;

pub const SESSIONS_KEY: &str = "sessions";
pub const BACKUP_KEY: &str = "route_backup";
pub const ARCHIVE_KEY: &str = "summary_archive";

/// Every key the tracker writes.
pub const TRACKER_KEYS: [&str; 3] = [SESSIONS_KEY, BACKUP_KEY, ARCHIVE_KEY];

/// Browser local storage gives an origin about five megabytes.
pub const DEFAULT_QUOTA_BYTES: u64 = 5 * 1024 * 1024;

/// Usage above this share of the quota is flagged.
pub const NEAR_QUOTA_PERCENT: f64 = 50.0;

/// String key-value persistence with no schema of its own.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    /// Capacity in bytes, when the store enforces one.
    fn quota_bytes(&self) -> Option<u64> {
        None
    }
}

/// A rendered route summary kept for later viewing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub id: i64,
    pub name: String,
    pub date: DateTime<Utc>,
    pub html: String,
    #[serde(default)]
    pub media: BTreeMap<String, String>,
}

/// Bytes held by the tracker's keys, plus photo weight of a live route.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageUsage {
    pub total_bytes: u64,
    pub quota_bytes: u64,
    pub photo_count: usize,
    pub photo_bytes: u64,
}

impl StorageUsage {
    pub fn available_bytes(&self) -> u64 {
        self.quota_bytes.saturating_sub(self.total_bytes)
    }

    pub fn percent_used(&self) -> f64 {
        if self.quota_bytes == 0 {
            return 100.0;
        }
        self.total_bytes as f64 / self.quota_bytes as f64 * 100.0
    }

    pub fn is_near_quota(&self) -> bool {
        self.percent_used() >= NEAR_QUOTA_PERCENT
    }
}

/// Typed access to sessions, the crash backup and the summary archive.
#[derive(Debug)]
pub struct SessionStore<S: KeyValueStore> {
    inner: S,
}

impl<S: KeyValueStore> SessionStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    fn read_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, StoreError> {
        match self.inner.get(key)? {
            Some(raw) if !raw.trim().is_empty() => Ok(serde_json::from_str(&raw)?),
            _ => Ok(Vec::new()),
        }
    }

    fn write_list<T: Serialize>(&mut self, key: &str, items: &[T]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(items)?;
        self.inner.set(key, &raw)
    }

    // --- saved sessions ---

    pub fn list_sessions(&self) -> Result<Vec<SessionSnapshot>, StoreError> {
        self.read_list(SESSIONS_KEY)
    }

    pub fn summaries(&self) -> Result<Vec<SessionSummary>, StoreError> {
        Ok(self
            .list_sessions()?
            .iter()
            .enumerate()
            .map(|(index, session)| session.summary(index))
            .collect())
    }

    pub fn session(&self, index: usize) -> Result<Option<SessionSnapshot>, StoreError> {
        Ok(self.list_sessions()?.into_iter().nth(index))
    }

    pub fn most_recent(&self) -> Result<Option<SessionSnapshot>, StoreError> {
        Ok(self.list_sessions()?.pop())
    }

    /// Append a saved session and return its index. Nothing is written
    /// when the store rejects the new list.
    pub fn append_session(&mut self, snapshot: &SessionSnapshot) -> Result<usize, StoreError> {
        let mut sessions = self.list_sessions()?;
        sessions.push(snapshot.clone());
        self.write_list(SESSIONS_KEY, &sessions)?;
        info!(
            name = %snapshot.name,
            entries = snapshot.data.len(),
            distance_km = %snapshot.distance,
            "Session saved"
        );
        Ok(sessions.len() - 1)
    }

    /// Remove all saved sessions and any pending backup.
    pub fn clear_sessions(&mut self) -> Result<(), StoreError> {
        self.inner.remove(SESSIONS_KEY)?;
        self.inner.remove(BACKUP_KEY)
    }

    // --- crash backup ---

    pub fn read_backup_raw(&self) -> Result<Option<String>, StoreError> {
        self.inner.get(BACKUP_KEY)
    }

    pub fn has_backup(&self) -> Result<bool, StoreError> {
        Ok(self.read_backup_raw()?.is_some())
    }

    pub fn write_backup(&mut self, backup: &BackupSnapshot) -> Result<(), StoreError> {
        let raw = serde_json::to_string(backup)?;
        self.inner.set(BACKUP_KEY, &raw)?;
        debug!(
            entries = backup.route_data.len(),
            bytes = raw.len(),
            "Auto-saved route progress"
        );
        Ok(())
    }

    pub fn remove_backup(&mut self) -> Result<(), StoreError> {
        self.inner.remove(BACKUP_KEY)
    }

    // --- summary archive ---

    pub fn list_summaries(&self) -> Result<Vec<ArchiveEntry>, StoreError> {
        self.read_list(ARCHIVE_KEY)
    }

    /// Archive a rendered summary; ids are creation timestamps, bumped to
    /// stay unique.
    pub fn save_summary(
        &mut self,
        name: &str,
        html: &str,
        media: BTreeMap<String, String>,
        now: DateTime<Utc>,
    ) -> Result<i64, StoreError> {
        let mut archive = self.list_summaries()?;
        let newest = archive.iter().map(|entry| entry.id).max().unwrap_or(i64::MIN);
        let id = now.timestamp_millis().max(newest.saturating_add(1));

        archive.push(ArchiveEntry {
            id,
            name: name.to_string(),
            date: now,
            html: html.to_string(),
            media,
        });
        self.write_list(ARCHIVE_KEY, &archive)?;
        Ok(id)
    }

    /// Returns whether an entry was removed.
    pub fn delete_summary(&mut self, id: i64) -> Result<bool, StoreError> {
        let mut archive = self.list_summaries()?;
        let before = archive.len();
        archive.retain(|entry| entry.id != id);
        if archive.len() == before {
            return Ok(false);
        }
        self.write_list(ARCHIVE_KEY, &archive)?;
        Ok(true)
    }

    pub fn clear_summaries(&mut self) -> Result<(), StoreError> {
        self.inner.remove(ARCHIVE_KEY)
    }

    /// Drop sessions, archive and backup.
    pub fn clear_all(&mut self) -> Result<(), StoreError> {
        for key in TRACKER_KEYS {
            self.inner.remove(key)?;
        }
        info!("All tracker data cleared");
        Ok(())
    }

    // --- usage ---

    pub fn usage(&self, live: Option<&RouteLog>) -> Result<StorageUsage, StoreError> {
        let mut total_bytes = 0u64;
        for key in TRACKER_KEYS {
            if let Some(value) = self.inner.get(key)? {
                total_bytes += value.len() as u64;
            }
        }

        let (photo_count, photo_bytes) = live.map(RouteLog::photo_usage).unwrap_or((0, 0));

        Ok(StorageUsage {
            total_bytes,
            quota_bytes: self.inner.quota_bytes().unwrap_or(DEFAULT_QUOTA_BYTES),
            photo_count,
            photo_bytes,
        })
    }
}
