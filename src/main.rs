// src/main.rs
//! Nature Tracker - record nature walks from a GPS receiver in the terminal

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use nature_tracker::{
    config::TrackerConfig,
    display::{spawn_stdin_reader, TerminalDisplay, TerminalPrompt},
    export,
    gps::{list_serial_ports, GpsSource, StreamSource},
    ports::{Prompt, SystemClock},
    session::{RecoveryCoordinator, TrackSession},
    share::{payload_from_url, share_link},
    snapshot::SessionSnapshot,
    store::{FileStore, SessionStore},
    tracker::Tracker,
};
use std::{
    io::{self, Write},
    path::PathBuf,
    sync::Arc,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

// ============================================================================
// CLI Types
// ============================================================================

/// Nature Tracker - record routes, notes and media from a GPS receiver
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (defaults to ~/.config/nature-tracker/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for saved routes and backups (overrides config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Record a route interactively
    Track {
        /// GPS source [serial, gpsd, replay]
        #[arg(short, long)]
        source: Option<String>,

        /// Serial port device (e.g. /dev/ttyUSB0, COM3)
        #[arg(short, long)]
        port: Option<String>,

        /// Serial port baud rate
        #[arg(short, long)]
        baud: Option<u32>,

        /// gpsd host
        #[arg(long)]
        host: Option<String>,

        /// gpsd port
        #[arg(long)]
        gpsd_port: Option<u16>,

        /// Replay file with recorded fixes or an exported route
        #[arg(long)]
        replay: Option<PathBuf>,

        /// Milliseconds between replayed fixes
        #[arg(long)]
        interval_ms: Option<u64>,

        /// Open a shared route link (or its bare payload) instead of recovering
        #[arg(long)]
        share: Option<String>,

        /// Write the effective source settings back to the config file
        #[arg(long)]
        save_config: bool,
    },

    /// Browse and manage saved routes
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },

    /// Manage archived route summaries
    Archive {
        #[command(subcommand)]
        action: ArchiveAction,
    },

    /// Show storage usage
    Usage,

    /// Delete all routes, summaries and the backup
    ClearAll {
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// List available serial ports
    Ports,
}

#[derive(Subcommand, Debug)]
enum SessionsAction {
    /// List saved routes
    List,
    /// Show one saved route
    Show { index: usize },
    /// Export a saved route's entries as JSON
    Export {
        index: usize,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print a shareable link for a saved route
    Share { index: usize },
    /// Delete all saved routes
    Clear {
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ArchiveAction {
    /// Archive a rendered summary page for a saved route, with the route's media
    Save {
        index: usize,

        /// Rendered HTML summary
        html: PathBuf,

        /// Summary title (defaults to the route name)
        #[arg(short, long)]
        title: Option<String>,
    },
    /// List archived summaries
    List,
    /// Write an archived summary's HTML
    Show {
        id: i64,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Delete one archived summary
    Delete { id: i64 },
    /// Delete all archived summaries
    Clear {
        #[arg(short, long)]
        yes: bool,
    },
}

// ============================================================================
// Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> std::process::ExitCode {
    init_tracing();

    match run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => TrackerConfig::get_config_path()?,
    };
    let mut config = TrackerConfig::load_from(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    match cli.command {
        Commands::Track {
            source,
            port,
            baud,
            host,
            gpsd_port,
            replay,
            interval_ms,
            share,
            save_config,
        } => {
            if let Some(source) = source {
                config.update_source(&source);
            }
            if let Some(port) = port {
                let baudrate = baud.or(config.serial_baudrate).unwrap_or(9600);
                config.update_serial(port, baudrate);
            } else if let Some(baud) = baud {
                config.serial_baudrate = Some(baud);
            }
            if host.is_some() || gpsd_port.is_some() {
                let host = host.or_else(|| config.gpsd_host.clone()).unwrap_or_else(|| "localhost".to_string());
                let port = gpsd_port.or(config.gpsd_port).unwrap_or(2947);
                config.update_gpsd(host, port);
            }
            if let Some(file) = replay {
                let interval = interval_ms.or(config.replay_interval_ms).unwrap_or(1000);
                config.update_replay(file, interval);
            } else if let Some(interval) = interval_ms {
                config.replay_interval_ms = Some(interval);
            }
            config.validate()?;
            if save_config {
                config.save_to(&config_path)?;
                info!(path = %config_path.display(), "Configuration saved");
            }
            track(config, share).await
        }
        Commands::Sessions { action } => sessions(&config, action),
        Commands::Archive { action } => archive(&config, action),
        Commands::Usage => {
            let store = open_store(&config)?;
            let usage = store.usage(None)?;
            TerminalDisplay::new().render_usage(&mut io::stdout(), &usage)?;
            Ok(())
        }
        Commands::ClearAll { yes } => {
            let mut store = open_store(&config)?;
            if confirm(yes, "This will permanently delete all routes, summaries, and backups. Continue?") {
                store.clear_all()?;
                println!("All app data has been cleared!");
            }
            Ok(())
        }
        Commands::Ports => {
            let ports = list_serial_ports()?;
            if ports.is_empty() {
                println!("No serial ports found.");
            } else {
                println!("Available serial ports:");
                for (name, kind) in ports {
                    println!("  {} - {}", name, kind);
                }
            }
            Ok(())
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn track(config: TrackerConfig, share: Option<String>) -> Result<()> {
    let source = GpsSource::from_config(&config)?;
    let description = source.describe();
    let (stream, events) = StreamSource::new(source);
    let store = open_file_store(&config)?;

    let lines = spawn_stdin_reader();
    let prompt = TerminalPrompt::new(Arc::clone(&lines));
    let mut session = TrackSession::new(config.tracking(), store, stream, SystemClock, prompt);

    let display = TerminalDisplay::new();
    let mut stdout = io::stdout();
    display.render_header(&mut stdout, &description)?;
    info!(source = %description, "Starting tracker");

    let payload = share.as_deref().and_then(payload_from_url);
    let recovery = RecoveryCoordinator::new(payload).recover(&mut session);
    display.render_recovery(&mut stdout, &recovery)?;

    Tracker::new(session, config.share_base_url.clone())
        .run(events, lines, &mut stdout)
        .await?;
    Ok(())
}

fn sessions(config: &TrackerConfig, action: SessionsAction) -> Result<()> {
    let mut store = open_store(config)?;
    let display = TerminalDisplay::new();
    let mut stdout = io::stdout();

    match action {
        SessionsAction::List => display.render_sessions(&mut stdout, &store.summaries()?)?,
        SessionsAction::Show { index } => display.render_session(&mut stdout, &saved(&store, index)?)?,
        SessionsAction::Export { index, output } => {
            let session = saved(&store, index)?;
            write_output(output, &export::to_json(&session.data)?)?;
        }
        SessionsAction::Share { index } => {
            let session = saved(&store, index)?;
            println!("{}", share_link(&config.share_base_url, &session.data)?);
        }
        SessionsAction::Clear { yes } => {
            if confirm(yes, "Are you sure you want to clear all saved routes? This cannot be undone!") {
                store.clear_sessions()?;
                println!("All saved routes have been cleared!");
            }
        }
    }
    Ok(())
}

fn archive(config: &TrackerConfig, action: ArchiveAction) -> Result<()> {
    let mut store = open_store(config)?;

    match action {
        ArchiveAction::Save { index, html, title } => {
            let session = saved(&store, index)?;
            if session.data.path().is_empty() {
                bail!("route #{} has no location data to summarise", index);
            }
            let page = std::fs::read_to_string(&html).with_context(|| format!("reading {}", html.display()))?;
            let title = title.unwrap_or_else(|| session.name.clone());
            let id = store.save_summary(&title, &page, export::media_files(&session.data), Utc::now())?;
            println!("Route summary saved to archive as {}.", id);
        }
        ArchiveAction::List => TerminalDisplay::new().render_archive(&mut io::stdout(), &store.list_summaries()?)?,
        ArchiveAction::Show { id, output } => {
            let entry = store
                .list_summaries()?
                .into_iter()
                .find(|entry| entry.id == id)
                .with_context(|| format!("summary {} not found", id))?;
            write_output(output, &entry.html)?;
        }
        ArchiveAction::Delete { id } => {
            if !store.delete_summary(id)? {
                bail!("summary {} not found", id);
            }
            println!("Summary {} deleted.", id);
        }
        ArchiveAction::Clear { yes } => {
            if confirm(yes, "Clear all archived summaries? This cannot be undone!") {
                store.clear_summaries()?;
                println!("All archived summaries cleared!");
            }
        }
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn open_file_store(config: &TrackerConfig) -> Result<FileStore> {
    let dir = config.resolved_data_dir()?;
    let store = FileStore::open(&dir).with_context(|| format!("opening data directory {}", dir.display()))?;
    Ok(match config.storage_quota_bytes {
        Some(quota) => store.with_quota(quota),
        None => store,
    })
}

fn open_store(config: &TrackerConfig) -> Result<SessionStore<FileStore>> {
    Ok(SessionStore::new(open_file_store(config)?))
}

fn saved(store: &SessionStore<FileStore>, index: usize) -> Result<SessionSnapshot> {
    store
        .session(index)?
        .with_context(|| format!("no saved route at index {}", index))
}

fn write_output(output: Option<PathBuf>, contents: &str) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = io::stdout();
            stdout.write_all(contents.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn confirm(yes: bool, message: &str) -> bool {
    yes || TerminalPrompt::new(spawn_stdin_reader()).confirm(message)
}

// ============================================================================
// Initialization
// ============================================================================

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
