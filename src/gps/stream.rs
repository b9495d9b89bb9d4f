// src/gps/stream.rs
//! Position source backed by background reader tasks

use super::{gpsd, nmea, replay};
use crate::{
    config::TrackerConfig,
    error::{Result, SourceError, TrackerError},
    geo::Fix,
    ports::{PositionSource, SubscriptionId},
};
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// GPS data source configuration
#[derive(Debug, Clone)]
pub enum GpsSource {
    Serial { port: String, baudrate: u32 },
    Gpsd { host: String, port: u16 },
    Replay { fixes: Arc<Vec<Fix>>, interval: Duration },
}

impl GpsSource {
    /// Build the source selected in the config. Replay files are read here.
    pub fn from_config(config: &TrackerConfig) -> Result<Self> {
        match config.source_type.as_str() {
            "serial" => {
                let port = config
                    .serial_port
                    .clone()
                    .ok_or_else(|| TrackerError::Config("serial source needs serial_port".to_string()))?;
                Ok(GpsSource::Serial {
                    port,
                    baudrate: config.serial_baudrate.unwrap_or(9600),
                })
            }
            "gpsd" => Ok(GpsSource::Gpsd {
                host: config.gpsd_host.clone().unwrap_or_else(|| "localhost".to_string()),
                port: config.gpsd_port.unwrap_or(2947),
            }),
            "replay" => {
                let path = config
                    .replay_file
                    .as_deref()
                    .ok_or_else(|| TrackerError::Config("replay source needs replay_file".to_string()))?;
                Ok(GpsSource::Replay {
                    fixes: Arc::new(replay::load_replay(path)?),
                    interval: Duration::from_millis(config.replay_interval_ms.unwrap_or(1000).max(1)),
                })
            }
            other => Err(TrackerError::Config(format!("unknown source_type '{}'", other))),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            GpsSource::Serial { port, baudrate } => format!("serial {} at {} baud", port, baudrate),
            GpsSource::Gpsd { host, port } => format!("gpsd at {}:{}", host, port),
            GpsSource::Replay { fixes, interval } => {
                format!("replay of {} fixes every {} ms", fixes.len(), interval.as_millis())
            }
        }
    }
}

/// Something a subscription produced, tagged with its id so the session can
/// drop samples from cancelled subscriptions.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceEvent {
    Fix { subscription: SubscriptionId, fix: Fix },
    /// The subscription's reader stopped; no more fixes follow from it.
    Error { subscription: SubscriptionId, message: String },
}

/// Every subscription spawns one reader task; all tasks feed the same
/// event channel. Unsubscribing aborts the task.
pub struct StreamSource {
    source: GpsSource,
    events: UnboundedSender<SourceEvent>,
    next_id: u64,
    tasks: HashMap<SubscriptionId, JoinHandle<()>>,
    /// Replay position shared across subscriptions so a resumed watch
    /// continues the walk instead of starting over.
    replay_cursor: Arc<AtomicUsize>,
}

impl StreamSource {
    pub fn new(source: GpsSource) -> (Self, UnboundedReceiver<SourceEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let stream = Self {
            source,
            events,
            next_id: 0,
            tasks: HashMap::new(),
            replay_cursor: Arc::new(AtomicUsize::new(0)),
        };
        (stream, receiver)
    }

    pub fn source(&self) -> &GpsSource {
        &self.source
    }

    pub fn active_subscriptions(&self) -> usize {
        self.tasks.len()
    }
}

impl PositionSource for StreamSource {
    fn subscribe(&mut self) -> std::result::Result<SubscriptionId, SourceError> {
        let id = SubscriptionId(self.next_id + 1);
        let events = self.events.clone();

        let task = match &self.source {
            GpsSource::Serial { port, baudrate } => {
                let serial = tokio_serial::new(port, *baudrate)
                    .timeout(Duration::from_millis(1000))
                    .open_native_async()
                    .map_err(|e| {
                        SourceError::Unsupported(format!("Failed to open serial port {}: {}", port, e))
                    })?;
                tokio::spawn(read_nmea(BufReader::new(serial), id, events))
            }
            GpsSource::Gpsd { host, port } => {
                tokio::spawn(read_gpsd(host.clone(), *port, id, events))
            }
            GpsSource::Replay { fixes, interval } => tokio::spawn(run_replay(
                Arc::clone(fixes),
                *interval,
                Arc::clone(&self.replay_cursor),
                id,
                events,
            )),
        };

        self.next_id += 1;
        self.tasks.insert(id, task);
        debug!(subscription = %id, source = %self.source.describe(), "Subscribed");
        Ok(id)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) {
        if let Some(task) = self.tasks.remove(&id) {
            task.abort();
            debug!(subscription = %id, "Unsubscribed");
        }
    }
}

impl Drop for StreamSource {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

fn send_error(events: &UnboundedSender<SourceEvent>, subscription: SubscriptionId, message: String) {
    let _ = events.send(SourceEvent::Error {
        subscription,
        message,
    });
}

/// Read NMEA sentences line by line until EOF or the receiver goes away.
async fn read_nmea<R>(mut reader: R, subscription: SubscriptionId, events: UnboundedSender<SourceEvent>)
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                send_error(&events, subscription, "serial port closed".to_string());
                break;
            }
            Ok(_) => match nmea::parse_nmea_sentence(&line) {
                Ok(Some(fix)) => {
                    if events.send(SourceEvent::Fix { subscription, fix }).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(error = %e, "Skipping NMEA sentence"),
            },
            Err(e) => {
                warn!(error = %e, "Error reading from serial port");
                send_error(&events, subscription, format!("Error reading from serial port: {}", e));
                break;
            }
        }
    }
}

async fn read_gpsd(host: String, port: u16, subscription: SubscriptionId, events: UnboundedSender<SourceEvent>) {
    let mut reader = match gpsd::connect_gpsd(&host, port).await {
        Ok(reader) => reader,
        Err(e) => {
            send_error(&events, subscription, e.to_string());
            return;
        }
    };
    info!(host = %host, port, "Connected to gpsd");

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                send_error(&events, subscription, "gpsd closed the connection".to_string());
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                match gpsd::parse_gpsd_json(line) {
                    Ok(Some(fix)) => {
                        if events.send(SourceEvent::Fix { subscription, fix }).is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "Error parsing gpsd JSON"),
                }
            }
            Err(e) => {
                send_error(&events, subscription, format!("Error reading from gpsd: {}", e));
                break;
            }
        }
    }
}

async fn run_replay(
    fixes: Arc<Vec<Fix>>,
    interval: Duration,
    cursor: Arc<AtomicUsize>,
    subscription: SubscriptionId,
    events: UnboundedSender<SourceEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        let Some(fix) = fixes.get(index) else {
            info!(fixes = fixes.len(), "Replay finished");
            break;
        };
        if events
            .send(SourceEvent::Fix {
                subscription,
                fix: *fix,
            })
            .is_err()
        {
            break;
        }
    }
}
