// src/export.rs
//! Route exports: the JSON entry array and the media files a summary refers to

use crate::{
    error::Result,
    route::{RouteEntry, RouteLog},
};
use std::collections::BTreeMap;

/// Pretty-printed route log, the same shape that share links and replays read.
pub fn to_json(log: &RouteLog) -> Result<String> {
    Ok(serde_json::to_string_pretty(log)?)
}

/// Base64 media payloads keyed by the relative path an archived summary
/// uses for them: `images/photoN.jpg`, `audio/audioN.webm`,
/// `video/videoN.webm`, numbered from 1 per kind in route order.
pub fn media_files(log: &RouteLog) -> BTreeMap<String, String> {
    let mut media = BTreeMap::new();
    let (mut photos, mut audios, mut videos) = (0, 0, 0);

    for entry in log {
        let (path, content) = match entry {
            RouteEntry::Photo { content, .. } => {
                photos += 1;
                (format!("images/photo{}.jpg", photos), content)
            }
            RouteEntry::Audio { content, .. } => {
                audios += 1;
                (format!("audio/audio{}.webm", audios), content)
            }
            RouteEntry::Video { content, .. } => {
                videos += 1;
                (format!("video/video{}.webm", videos), content)
            }
            _ => continue,
        };
        media.insert(path, data_url_payload(content).to_string());
    }

    media
}

/// Base64 part of a `data:` URL; anything else is returned whole.
fn data_url_payload(content: &str) -> &str {
    match content.strip_prefix("data:").and_then(|rest| rest.split_once(',')) {
        Some((_, payload)) => payload,
        None => content,
    }
}
