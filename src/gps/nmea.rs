// src/gps/nmea.rs
//! NMEA sentence parsing

use crate::{error::SourceError, geo::Fix};

/// Typical user equivalent range error of a consumer receiver, in metres.
/// Horizontal accuracy is estimated as HDOP times this value.
pub const UERE_M: f64 = 5.0;

/// Parse a single NMEA sentence into a fix.
///
/// Only GGA sentences carry what a fix needs (position, fix quality and
/// HDOP); everything else yields `Ok(None)`, as does a GGA without a fix.
pub fn parse_nmea_sentence(line: &str) -> Result<Option<Fix>, SourceError> {
    let line = line.trim();
    if !line.starts_with('$') {
        return Ok(None);
    }
    let body = verify_checksum(line)?;
    let parts: Vec<&str> = body.split(',').collect();

    if parts[0].ends_with("GGA") && parts[0].len() == 5 {
        Ok(parse_gga(&parts))
    } else {
        Ok(None)
    }
}

/// Strip the leading `$` and the `*hh` checksum, verifying it when present.
fn verify_checksum(line: &str) -> Result<&str, SourceError> {
    let line = &line[1..];
    let Some((body, checksum)) = line.split_once('*') else {
        return Ok(line);
    };

    let expected = u8::from_str_radix(checksum.trim(), 16)
        .map_err(|_| SourceError::Parse(format!("bad NMEA checksum field '{}'", checksum)))?;
    let actual = body.bytes().fold(0u8, |acc, b| acc ^ b);
    if actual != expected {
        return Err(SourceError::Parse(format!(
            "NMEA checksum mismatch: expected {:02X}, computed {:02X}",
            expected, actual
        )));
    }
    Ok(body)
}

/// Parse GGA (Global Positioning System Fix Data) fields
fn parse_gga(parts: &[&str]) -> Option<Fix> {
    if parts.len() < 10 {
        return None;
    }

    // Fix quality (field 6), 0 = invalid
    let quality = parts[6].parse::<u8>().ok()?;
    if quality == 0 {
        return None;
    }

    let lat = parse_coordinate(parts[2], parts[3], "S")?;
    let lng = parse_coordinate(parts[4], parts[5], "W")?;

    // HDOP (field 8)
    let hdop = parts[8].parse::<f64>().ok()?;

    Some(Fix::new(lat, lng, hdop * UERE_M))
}

/// Convert `ddmm.mmmm` / `dddmm.mmmm` plus hemisphere into signed degrees.
fn parse_coordinate(value: &str, hemisphere: &str, negative: &str) -> Option<f64> {
    if value.is_empty() || hemisphere.is_empty() {
        return None;
    }
    let raw = value.parse::<f64>().ok().filter(|raw| raw.is_finite())?;
    let degrees = (raw / 100.0).trunc();
    let minutes = raw - degrees * 100.0;
    let coordinate = degrees + minutes / 60.0;
    Some(if hemisphere == negative { -coordinate } else { coordinate })
}
