// src/snapshot.rs
//! Persisted session records and the transient crash backup

use crate::route::RouteLog;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named route saved on explicit request. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub name: String,
    pub date: DateTime<Utc>,
    /// Elapsed time as displayed when the route was saved, `HH:MM:SS`.
    pub time: String,
    /// Distance in kilometres with two decimals.
    pub distance: String,
    pub data: RouteLog,
}

impl SessionSnapshot {
    pub fn capture(
        name: String,
        date: DateTime<Utc>,
        elapsed_ms: i64,
        distance_km: f64,
        data: RouteLog,
    ) -> Self {
        Self {
            name,
            date,
            time: format_elapsed(elapsed_ms),
            distance: format!("{:.2}", distance_km),
            data,
        }
    }

    /// Parsed distance; falls back to the path length when the stored
    /// string is not a number.
    pub fn distance_km(&self) -> f64 {
        self.distance
            .trim()
            .parse::<f64>()
            .unwrap_or_else(|_| self.data.path_km())
    }

    pub fn summary(&self, index: usize) -> SessionSummary {
        SessionSummary {
            index,
            name: self.name.clone(),
            date: self.date,
            time: self.time.clone(),
            distance: self.distance.clone(),
            entries: self.data.len(),
        }
    }
}

/// Listing row for a saved session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub index: usize,
    pub name: String,
    pub date: DateTime<Utc>,
    pub time: String,
    pub distance: String,
    pub entries: usize,
}

/// Auto-saved copy of the route in progress, overwritten on every backup tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    #[serde(default)]
    pub route_data: RouteLog,
    #[serde(default)]
    pub total_distance: f64,
    #[serde(default)]
    pub elapsed_time: i64,
}

impl BackupSnapshot {
    /// Parse a stored backup, rejecting malformed JSON and empty routes.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let backup: Self = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        backup.validate()?;
        Ok(backup)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.route_data.is_empty() {
            return Err("backup routeData is empty".to_string());
        }
        if !self.total_distance.is_finite() || self.total_distance < 0.0 {
            return Err(format!("backup totalDistance is invalid: {}", self.total_distance));
        }
        if self.elapsed_time < 0 {
            return Err(format!("backup elapsedTime is negative: {}", self.elapsed_time));
        }
        Ok(())
    }
}

/// Format milliseconds as `HH:MM:SS`.
pub fn format_elapsed(elapsed_ms: i64) -> String {
    let total_seconds = elapsed_ms.max(0) / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Parse `HH:MM:SS` back into milliseconds.
pub fn parse_elapsed(display: &str) -> Option<i64> {
    let mut parts = display.trim().split(':');
    let hours: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let seconds: i64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 || hours < 0 || minutes < 0 || seconds < 0 {
        return None;
    }
    Some(((hours * 60 + minutes) * 60 + seconds) * 1000)
}
