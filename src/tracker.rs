// src/tracker.rs
//! Interactive tracking loop: position events, the display tick and typed commands

use crate::{
    display::{next_line, InputLines, TerminalDisplay},
    error::Result,
    gps::SourceEvent,
    media::{self, MediaKind},
    route::{AccessibilityAnswers, NoteContent},
    session::{BackupTick, FixOutcome, StopOutcome, TrackSession, TrackState},
    share::share_link,
    store::KeyValueStore,
};
use std::{io::Write, path::PathBuf, str::FromStr, time::Duration};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};

pub const HELP: &str = "\
Commands:
  start                 begin a new route
  pause | resume        pause or continue recording
  stop                  finish the route and choose whether to save it
  reset                 discard the current route
  watch                 reconnect GPS to a restored route
  note <text>           pin a text note to the last position
  photo|audio|video <file>
                        pin a media file to the last position
  access <q=a,...>      record accessibility answers
  sessions              list saved routes
  open <n> | open last  view a saved route
  status | usage | share | help | quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Pause,
    Resume,
    Stop,
    Reset,
    Watch,
    Note(String),
    Media(MediaKind, PathBuf),
    Access(AccessibilityAnswers),
    Sessions,
    /// A saved session by index, or the most recent one.
    Open(Option<usize>),
    Status,
    Usage,
    Share,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let needs_arg = |what: &str| -> std::result::Result<(), String> {
            if rest.is_empty() {
                Err(format!("usage: {} {}", word, what))
            } else {
                Ok(())
            }
        };

        match word.to_ascii_lowercase().as_str() {
            "start" => Ok(Command::Start),
            "pause" => Ok(Command::Pause),
            "resume" => Ok(Command::Resume),
            "stop" => Ok(Command::Stop),
            "reset" => Ok(Command::Reset),
            "watch" => Ok(Command::Watch),
            "note" => {
                needs_arg("<text>")?;
                Ok(Command::Note(rest.to_string()))
            }
            "photo" | "audio" | "video" => {
                needs_arg("<file>")?;
                let kind = match word.to_ascii_lowercase().as_str() {
                    "photo" => MediaKind::Photo,
                    "audio" => MediaKind::Audio,
                    _ => MediaKind::Video,
                };
                Ok(Command::Media(kind, PathBuf::from(rest)))
            }
            "access" => {
                needs_arg("<question=answer,...>")?;
                parse_answers(rest).map(Command::Access)
            }
            "sessions" => Ok(Command::Sessions),
            "open" => {
                needs_arg("<index>|last")?;
                if rest.eq_ignore_ascii_case("last") {
                    Ok(Command::Open(None))
                } else {
                    rest.parse()
                        .map(|index| Command::Open(Some(index)))
                        .map_err(|_| format!("'{}' is not a session number", rest))
                }
            }
            "status" => Ok(Command::Status),
            "usage" => Ok(Command::Usage),
            "share" => Ok(Command::Share),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            "" => Err(String::new()),
            other => Err(format!("unknown command '{}', type 'help'", other)),
        }
    }
}

/// Parse `question=answer` pairs separated by commas. Booleans and numbers
/// keep their JSON type; everything else is stored as text.
pub fn parse_answers(input: &str) -> std::result::Result<AccessibilityAnswers, String> {
    let mut answers = AccessibilityAnswers::new();
    for pair in input.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (question, answer) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected question=answer, got '{}'", pair))?;
        let question = question.trim();
        if question.is_empty() {
            return Err(format!("missing question in '{}'", pair));
        }

        let answer = answer.trim();
        let value = match answer.to_ascii_lowercase().as_str() {
            "yes" | "true" => serde_json::Value::Bool(true),
            "no" | "false" => serde_json::Value::Bool(false),
            _ => match answer.parse::<f64>() {
                Ok(number) => serde_json::json!(number),
                Err(_) => serde_json::Value::String(answer.to_string()),
            },
        };
        answers.insert(question, value);
    }

    if answers.is_empty() {
        return Err("no answers given".to_string());
    }
    Ok(answers)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Drives a [`TrackSession`] from source events, a one-second tick and
/// commands typed on the terminal.
pub struct Tracker<S: KeyValueStore> {
    session: TrackSession<S>,
    display: TerminalDisplay,
    share_base_url: String,
}

impl<S: KeyValueStore> Tracker<S> {
    pub fn new(session: TrackSession<S>, share_base_url: impl Into<String>) -> Self {
        Self {
            session,
            display: TerminalDisplay::new(),
            share_base_url: share_base_url.into(),
        }
    }

    pub fn session(&self) -> &TrackSession<S> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut TrackSession<S> {
        &mut self.session
    }

    pub fn handle_event(&mut self, event: SourceEvent) -> Option<FixOutcome> {
        match event {
            SourceEvent::Fix { subscription, fix } => Some(self.session.on_position(subscription, fix)),
            SourceEvent::Error {
                subscription,
                message,
            } => {
                self.session.on_position_error(subscription, &message);
                None
            }
        }
    }

    /// Run one command. Failures are reported on `out` and the loop goes on;
    /// only a failure to write to `out` is returned.
    pub fn execute(&mut self, command: Command, out: &mut impl Write) -> Result<Flow> {
        match self.apply(command, out) {
            Ok(flow) => Ok(flow),
            Err(e) => {
                debug!(error = %e, "Command failed");
                self.display.render_error(out, &e.to_string())?;
                Ok(Flow::Continue)
            }
        }
    }

    fn apply(&mut self, command: Command, out: &mut impl Write) -> Result<Flow> {
        match command {
            Command::Start => {
                self.session.start()?;
                self.display.render_message(out, "Tracking started.")?;
            }
            Command::Pause => {
                self.session.pause()?;
                self.display.render_message(out, "Paused.")?;
            }
            Command::Resume => {
                self.session.resume()?;
                self.display.render_message(out, "Resumed.")?;
            }
            Command::Watch => {
                self.session.resume_watch()?;
                self.display.render_message(out, "GPS reconnected.")?;
            }
            Command::Stop => match self.session.stop()? {
                StopOutcome::Saved { index, snapshot } => {
                    self.display.render_message(
                        out,
                        &format!(
                            "Route completed! Saved '{}' as #{}: {} km in {}.",
                            snapshot.name, index, snapshot.distance, snapshot.time
                        ),
                    )?;
                }
                StopOutcome::Resumed => self.display.render_message(out, "Not saved, still tracking.")?,
                StopOutcome::NothingToSave => self.display.render_message(out, "Nothing recorded yet.")?,
            },
            Command::Reset => {
                self.session.reset();
                self.display.render_message(out, "Route cleared.")?;
            }
            Command::Note(text) => {
                self.session.add_note(NoteContent::Text(text))?;
                self.display.render_message(out, "Note saved.")?;
            }
            Command::Media(kind, path) => {
                let note = media::note_from_file(kind, &path)?;
                self.session.add_note(note)?;
                self.display.render_message(out, &format!("{} saved.", capitalize(kind.name())))?;
            }
            Command::Access(answers) => {
                self.session.add_accessibility(answers)?;
                self.display.render_message(out, "Accessibility answers saved.")?;
            }
            Command::Sessions => {
                let saved = self.session.store().summaries()?;
                self.display.render_sessions(out, &saved)?;
            }
            Command::Open(index) => {
                let snapshot = match index {
                    Some(index) => Some(self.session.view_saved(index)?),
                    None => self.session.view_most_recent()?,
                };
                match snapshot {
                    Some(snapshot) => self.display.render_session(out, &snapshot)?,
                    None => self.display.render_message(out, "No saved sessions.")?,
                }
            }
            Command::Status => {
                let report = self.session.tick();
                self.display.render_status(out, &report)?;
                writeln!(out)?;
            }
            Command::Usage => {
                let usage = self.session.usage()?;
                self.display.render_usage(out, &usage)?;
            }
            Command::Share => {
                if self.session.log().is_empty() {
                    self.display.render_message(out, "No route to share yet.")?;
                } else {
                    let link = share_link(&self.share_base_url, self.session.log())?;
                    self.display.render_message(out, &link)?;
                }
            }
            Command::Help => self.display.render_message(out, HELP)?,
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Leave a backup behind when quitting mid-route so the next start
    /// offers to restore it.
    fn shutdown(&mut self) {
        if self.session.state() == TrackState::Tracking {
            if let Err(e) = self.session.pause() {
                warn!(error = %e, "Could not pause before exit");
            }
        }
        if self.session.state() == TrackState::Paused {
            info!(entries = self.session.log().len(), "Exiting with an unsaved route");
        }
    }

    pub async fn run(
        mut self,
        mut events: UnboundedReceiver<SourceEvent>,
        lines: InputLines,
        out: &mut impl Write,
    ) -> Result<()> {
        let mut tick = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                Some(event) = events.recv() => {
                    if let SourceEvent::Error { subscription, message } = &event {
                        if self.session.subscription() == Some(*subscription) {
                            self.display.render_error(out, &format!("GPS lost: {}. Type 'watch' to reconnect.", message))?;
                        }
                    }
                    self.handle_event(event);
                }
                _ = tick.tick() => {
                    let report = self.session.tick();
                    if let BackupTick::Failed(reason) = &report.backup {
                        self.display.render_error(out, &format!("Auto-backup failed: {}", reason))?;
                    }
                    if report.state.is_active() {
                        self.display.render_status(out, &report)?;
                    }
                }
                line = next_line(&lines) => {
                    let Some(line) = line else {
                        info!("Input closed");
                        break;
                    };
                    match line.parse::<Command>() {
                        Ok(command) => {
                            if self.execute(command, out)? == Flow::Quit {
                                break;
                            }
                        }
                        Err(message) if message.is_empty() => {}
                        Err(message) => self.display.render_error(out, &message)?,
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        self.shutdown();
        writeln!(out, "\nShutting down...")?;
        Ok(())
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
