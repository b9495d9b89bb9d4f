// src/gps/replay.rs
//! Recorded fixes played back as if they came from a receiver

use crate::{error::SourceError, geo::Fix, route::RouteLog};
use serde::Deserialize;
use std::path::Path;

/// Accuracy assigned to positions taken from an exported route, which
/// only stores coordinates.
pub const ROUTE_REPLAY_ACCURACY_M: f64 = 5.0;

#[derive(Debug, Deserialize)]
struct ReplayFix {
    lat: f64,
    #[serde(alias = "lon")]
    lng: f64,
    #[serde(default = "default_accuracy", alias = "accuracy_m")]
    accuracy: f64,
}

fn default_accuracy() -> f64 {
    ROUTE_REPLAY_ACCURACY_M
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ReplayFile {
    Route(RouteLog),
    Fixes(Vec<ReplayFix>),
}

/// Parse a replay file: either an array of `{lat, lng, accuracy}` objects
/// or an exported route log, whose location entries are replayed in order.
pub fn parse_replay(raw: &str) -> Result<Vec<Fix>, SourceError> {
    let file: ReplayFile = serde_json::from_str(raw)
        .map_err(|e| SourceError::Parse(format!("Failed to parse replay file: {}", e)))?;

    let fixes: Vec<Fix> = match file {
        ReplayFile::Route(log) => log
            .path()
            .into_iter()
            .map(|p| Fix::new(p.lat, p.lng, ROUTE_REPLAY_ACCURACY_M))
            .collect(),
        ReplayFile::Fixes(fixes) => fixes
            .into_iter()
            .map(|f| Fix::new(f.lat, f.lng, f.accuracy))
            .collect(),
    };

    if fixes.is_empty() {
        return Err(SourceError::Parse("replay file contains no positions".to_string()));
    }
    Ok(fixes)
}

pub fn load_replay(path: &Path) -> Result<Vec<Fix>, SourceError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        SourceError::Unsupported(format!("cannot read replay file {}: {}", path.display(), e))
    })?;
    parse_replay(&raw)
}
