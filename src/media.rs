// src/media.rs
//! Media notes read from files and stored inline as data URLs

use crate::{
    error::{Result, TrackerError},
    route::NoteContent,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Audio,
    Video,
}

impl MediaKind {
    pub fn name(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    /// MIME type for a file extension, if this kind accepts it.
    pub fn mime_type(&self, extension: &str) -> Option<&'static str> {
        let extension = extension.to_ascii_lowercase();
        match (self, extension.as_str()) {
            (MediaKind::Photo, "jpg" | "jpeg") => Some("image/jpeg"),
            (MediaKind::Photo, "png") => Some("image/png"),
            (MediaKind::Photo, "webp") => Some("image/webp"),
            (MediaKind::Photo, "gif") => Some("image/gif"),
            (MediaKind::Audio, "webm") => Some("audio/webm"),
            (MediaKind::Audio, "ogg" | "oga") => Some("audio/ogg"),
            (MediaKind::Audio, "mp3") => Some("audio/mpeg"),
            (MediaKind::Audio, "wav") => Some("audio/wav"),
            (MediaKind::Audio, "m4a") => Some("audio/mp4"),
            (MediaKind::Video, "webm") => Some("video/webm"),
            (MediaKind::Video, "mp4") => Some("video/mp4"),
            (MediaKind::Video, "mov") => Some("video/quicktime"),
            _ => None,
        }
    }
}

/// Encode bytes as a `data:<mime>;base64,...` URL.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

/// Read a media file into a note ready to pin to the route.
pub fn note_from_file(kind: MediaKind, path: &Path) -> Result<NoteContent> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let mime = kind.mime_type(extension).ok_or_else(|| {
        TrackerError::UnsupportedMedia(format!("{} is not a supported {} file", path.display(), kind.name()))
    })?;

    let bytes = std::fs::read(path)?;
    let url = data_url(mime, &bytes);
    Ok(match kind {
        MediaKind::Photo => NoteContent::Photo(url),
        MediaKind::Audio => NoteContent::Audio(url),
        MediaKind::Video => NoteContent::Video(url),
    })
}
