// src/route.rs
//! Route log entries recorded along a tracked path

use crate::geo::{path_km, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One record in a route log, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RouteEntry {
    Location {
        timestamp: i64,
        coords: Position,
    },
    Text {
        timestamp: i64,
        coords: Position,
        content: String,
    },
    Photo {
        timestamp: i64,
        coords: Position,
        content: String,
    },
    Audio {
        timestamp: i64,
        coords: Position,
        content: String,
    },
    Video {
        timestamp: i64,
        coords: Position,
        content: String,
    },
    Accessibility {
        timestamp: i64,
        content: AccessibilityAnswers,
    },
}

impl RouteEntry {
    pub fn timestamp(&self) -> i64 {
        match self {
            RouteEntry::Location { timestamp, .. }
            | RouteEntry::Text { timestamp, .. }
            | RouteEntry::Photo { timestamp, .. }
            | RouteEntry::Audio { timestamp, .. }
            | RouteEntry::Video { timestamp, .. }
            | RouteEntry::Accessibility { timestamp, .. } => *timestamp,
        }
    }

    /// Where the entry was recorded; accessibility answers carry no position.
    pub fn coords(&self) -> Option<Position> {
        match self {
            RouteEntry::Location { coords, .. }
            | RouteEntry::Text { coords, .. }
            | RouteEntry::Photo { coords, .. }
            | RouteEntry::Audio { coords, .. }
            | RouteEntry::Video { coords, .. } => Some(*coords),
            RouteEntry::Accessibility { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RouteEntry::Location { .. } => "location",
            RouteEntry::Text { .. } => "text",
            RouteEntry::Photo { .. } => "photo",
            RouteEntry::Audio { .. } => "audio",
            RouteEntry::Video { .. } => "video",
            RouteEntry::Accessibility { .. } => "accessibility",
        }
    }

    pub fn is_location(&self) -> bool {
        matches!(self, RouteEntry::Location { .. })
    }
}

/// Caller-supplied content for a note pinned to the current position.
#[derive(Debug, Clone, PartialEq)]
pub enum NoteContent {
    Text(String),
    /// Data-URL encoded image.
    Photo(String),
    /// Data-URL encoded audio clip.
    Audio(String),
    /// Data-URL encoded video clip.
    Video(String),
}

impl NoteContent {
    pub(crate) fn into_entry(self, timestamp: i64, coords: Position) -> RouteEntry {
        match self {
            NoteContent::Text(content) => RouteEntry::Text { timestamp, coords, content },
            NoteContent::Photo(content) => RouteEntry::Photo { timestamp, coords, content },
            NoteContent::Audio(content) => RouteEntry::Audio { timestamp, coords, content },
            NoteContent::Video(content) => RouteEntry::Video { timestamp, coords, content },
        }
    }
}

/// Accessibility questionnaire answers keyed by question id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessibilityAnswers(BTreeMap<String, serde_json::Value>);

impl AccessibilityAnswers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_answer(mut self, question: &str, answer: impl Into<serde_json::Value>) -> Self {
        self.insert(question, answer);
        self
    }

    pub fn insert(&mut self, question: &str, answer: impl Into<serde_json::Value>) {
        self.0.insert(question.to_string(), answer.into());
    }

    pub fn answer(&self, question: &str) -> Option<&serde_json::Value> {
        self.0.get(question)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.0.iter()
    }
}

/// Append-only, insertion-ordered sequence of route entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RouteLog(Vec<RouteEntry>);

impl RouteLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, entry: RouteEntry) {
        self.0.push(entry);
    }

    pub(crate) fn clear(&mut self) {
        self.0.clear();
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RouteEntry> {
        self.0.iter()
    }

    /// The polyline view: coords of every location entry, in order.
    pub fn path(&self) -> Vec<Position> {
        self.0
            .iter()
            .filter_map(|entry| match entry {
                RouteEntry::Location { coords, .. } => Some(*coords),
                _ => None,
            })
            .collect()
    }

    pub fn path_km(&self) -> f64 {
        path_km(&self.path())
    }

    /// Most recent position of any entry that has one.
    pub fn last_position(&self) -> Option<Position> {
        self.0.iter().rev().find_map(RouteEntry::coords)
    }

    pub fn count_of(&self, kind: &str) -> usize {
        self.0.iter().filter(|entry| entry.kind() == kind).count()
    }

    /// Number of photos and their total encoded size in bytes.
    pub fn photo_usage(&self) -> (usize, u64) {
        self.0
            .iter()
            .filter_map(|entry| match entry {
                RouteEntry::Photo { content, .. } if content.starts_with("data:image/") => {
                    Some(content.len() as u64)
                }
                _ => None,
            })
            .fold((0, 0), |(count, bytes), size| (count + 1, bytes + size))
    }
}

impl From<Vec<RouteEntry>> for RouteLog {
    fn from(entries: Vec<RouteEntry>) -> Self {
        Self(entries)
    }
}

impl<'a> IntoIterator for &'a RouteLog {
    type Item = &'a RouteEntry;
    type IntoIter = std::slice::Iter<'a, RouteEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_of_each() -> RouteLog {
        let here = Position::new(46.5, 7.9);
        RouteLog::from(vec![
            RouteEntry::Location { timestamp: 1_000, coords: here },
            RouteEntry::Text {
                timestamp: 2_000,
                coords: here,
                content: "Marmot by the trail".to_string(),
            },
            RouteEntry::Photo {
                timestamp: 3_000,
                coords: here,
                content: "data:image/jpeg;base64,/9j/4AAQ".to_string(),
            },
            RouteEntry::Audio {
                timestamp: 4_000,
                coords: here,
                content: "data:audio/webm;base64,GkXfo".to_string(),
            },
            RouteEntry::Video {
                timestamp: 5_000,
                coords: here,
                content: "data:video/mp4;base64,AAAAIGZ0".to_string(),
            },
            RouteEntry::Accessibility {
                timestamp: 6_000,
                content: AccessibilityAnswers::new()
                    .with_answer("surface", "gravel")
                    .with_answer("steps", 3)
                    .with_answer("wheelchair", false),
            },
        ])
    }

    #[test]
    fn test_round_trip_all_variants() {
        let log = one_of_each();
        let json = serde_json::to_string(&log).unwrap();
        let back: RouteLog = serde_json::from_str(&json).unwrap();
        assert_eq!(back, log);
    }

    #[test]
    fn test_wire_shape() {
        let log = one_of_each();
        let value = serde_json::to_value(&log).unwrap();
        assert_eq!(value[0]["type"], "location");
        assert_eq!(value[0]["coords"]["lat"], 46.5);
        assert_eq!(value[0]["coords"]["lng"], 7.9);
        assert_eq!(value[1]["content"], "Marmot by the trail");
        assert_eq!(value[5]["type"], "accessibility");
        assert!(value[5].get("coords").is_none());
        assert_eq!(value[5]["content"]["steps"], 3);
    }

    #[test]
    fn test_reads_browser_entry() {
        let json = r#"[{"type":"location","timestamp":1700000000000,"coords":{"lat":51.5,"lng":-0.12}},
                       {"type":"text","timestamp":1700000005000,"coords":{"lat":51.5,"lng":-0.12},"content":"bench"}]"#;
        let log: RouteLog = serde_json::from_str(json).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log.entries()[1].kind(), "text");
    }

    #[test]
    fn test_accessibility_requires_no_coords_but_text_does() {
        let missing = r#"[{"type":"text","timestamp":1,"content":"no coords"}]"#;
        assert!(serde_json::from_str::<RouteLog>(missing).is_err());
    }

    #[test]
    fn test_path_only_uses_locations() {
        let log = one_of_each();
        assert_eq!(log.path(), vec![Position::new(46.5, 7.9)]);
        assert_eq!(log.count_of("photo"), 1);
        assert_eq!(log.last_position(), Some(Position::new(46.5, 7.9)));
    }

    #[test]
    fn test_photo_usage() {
        let log = one_of_each();
        let (count, bytes) = log.photo_usage();
        assert_eq!(count, 1);
        assert_eq!(bytes, "data:image/jpeg;base64,/9j/4AAQ".len() as u64);
    }
}
