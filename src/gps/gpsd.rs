// src/gps/gpsd.rs
//! GPSD client implementation

use crate::{error::SourceError, geo::Fix};
use serde::Deserialize;
use std::collections::HashMap;
use tokio::{
    io::{AsyncWriteExt, BufReader},
    net::TcpStream,
};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct GpsdMessage {
    class: String,
    #[serde(flatten)]
    data: HashMap<String, serde_json::Value>,
}

/// Connect to a gpsd daemon and return a stream reader
pub async fn connect_gpsd(host: &str, port: u16) -> Result<BufReader<TcpStream>, SourceError> {
    let mut stream = TcpStream::connect(format!("{}:{}", host, port))
        .await
        .map_err(|e| SourceError::Connection(format!("Failed to connect to gpsd at {}:{}: {}", host, port, e)))?;

    // Send WATCH command to start receiving JSON data
    let watch_cmd = "?WATCH={\"enable\":true,\"json\":true}\n";
    stream
        .write_all(watch_cmd.as_bytes())
        .await
        .map_err(|e| SourceError::Connection(format!("Failed to send WATCH command: {}", e)))?;

    Ok(BufReader::new(stream))
}

/// Parse a single line of gpsd JSON data. Only TPV reports with a 2D or 3D
/// fix and a horizontal error estimate produce a [`Fix`].
pub fn parse_gpsd_json(line: &str) -> Result<Option<Fix>, SourceError> {
    let msg: GpsdMessage = serde_json::from_str(line)
        .map_err(|e| SourceError::Parse(format!("Failed to parse gpsd JSON: {}", e)))?;

    match msg.class.as_str() {
        "TPV" => Ok(parse_tpv_message(&msg.data)),
        "VERSION" => {
            parse_version_message(&msg.data);
            Ok(None)
        }
        "DEVICES" => {
            parse_devices_message(&msg.data);
            Ok(None)
        }
        _ => Ok(None),
    }
}

fn field(msg_data: &HashMap<String, serde_json::Value>, name: &str) -> Option<f64> {
    msg_data.get(name).and_then(|v| v.as_f64())
}

/// Parse TPV (Time Position Velocity) message
fn parse_tpv_message(msg_data: &HashMap<String, serde_json::Value>) -> Option<Fix> {
    let mode = msg_data.get("mode").and_then(|v| v.as_u64()).unwrap_or(0);
    if mode < 2 {
        return None;
    }

    let lat = field(msg_data, "lat")?;
    let lon = field(msg_data, "lon")?;

    // eph is the horizontal error estimate; older daemons only report the
    // per-axis epx/epy.
    let accuracy = field(msg_data, "eph").or_else(|| {
        match (field(msg_data, "epx"), field(msg_data, "epy")) {
            (Some(x), Some(y)) => Some(x.max(y)),
            (x, y) => x.or(y),
        }
    });

    match accuracy {
        Some(accuracy) => Some(Fix::new(lat, lon, accuracy)),
        None => {
            debug!(lat, lon, "TPV without error estimate, skipped");
            None
        }
    }
}

/// Parse VERSION message (informational)
fn parse_version_message(msg_data: &HashMap<String, serde_json::Value>) {
    if let Some(version) = msg_data.get("release").and_then(|v| v.as_str()) {
        info!(version, "Connected to gpsd");
    }
}

/// Parse DEVICES message (informational)
fn parse_devices_message(msg_data: &HashMap<String, serde_json::Value>) {
    if let Some(devices) = msg_data.get("devices").and_then(|v| v.as_array()) {
        let paths: Vec<&str> = devices
            .iter()
            .filter_map(|device| device.get("path").and_then(|v| v.as_str()))
            .collect();
        info!(count = devices.len(), ?paths, "gpsd devices");
    }
}
