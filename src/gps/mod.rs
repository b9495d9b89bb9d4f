// src/gps/mod.rs
//! GPS receivers: NMEA over serial, gpsd and recorded replays

pub mod gpsd;
pub mod nmea;
pub mod replay;
pub mod stream;

pub use stream::{GpsSource, SourceEvent, StreamSource};

use crate::error::Result;

/// List available serial ports as `(name, kind)` pairs
pub fn list_serial_ports() -> Result<Vec<(String, String)>> {
    let ports = tokio_serial::available_ports()?;

    Ok(ports
        .into_iter()
        .map(|port| (port.port_name, format!("{:?}", port.port_type)))
        .collect())
}
