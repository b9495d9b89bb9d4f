// src/share.rs
//! Shareable links carrying a whole route log in the URL

use crate::{
    error::{Result, TrackerError},
    route::RouteLog,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use url::Url;

/// Query parameter holding the encoded route.
pub const SHARE_PARAM: &str = "data";

/// Encode a route log as base64 JSON.
pub fn encode_payload(log: &RouteLog) -> Result<String> {
    let json = serde_json::to_string(log)?;
    Ok(STANDARD.encode(json))
}

/// Decode a payload produced by [`encode_payload`]. Empty routes are invalid.
pub fn decode_payload(payload: &str) -> Result<RouteLog> {
    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| TrackerError::InvalidSharePayload(format!("bad base64: {}", e)))?;
    let log: RouteLog = serde_json::from_slice(&bytes)
        .map_err(|e| TrackerError::InvalidSharePayload(format!("bad route JSON: {}", e)))?;

    if log.is_empty() {
        return Err(TrackerError::InvalidSharePayload("shared route is empty".to_string()));
    }
    Ok(log)
}

/// Build a link to `base_url` with the route in its query string.
pub fn share_link(base_url: &str, log: &RouteLog) -> Result<String> {
    let mut url = Url::parse(base_url)
        .map_err(|e| TrackerError::Config(format!("invalid share base URL '{}': {}", base_url, e)))?;
    let payload = encode_payload(log)?;
    url.query_pairs_mut()
        .clear()
        .append_pair(SHARE_PARAM, &payload);
    Ok(url.to_string())
}

/// Pull the payload out of a full link. A bare payload is returned as-is.
pub fn payload_from_url(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    match Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == SHARE_PARAM)
            .map(|(_, value)| value.into_owned()),
        Err(_) => Some(input.to_string()),
    }
}
