// src/display/terminal.rs
//! Terminal-based display implementation

use crate::{
    error::Result,
    session::{Recovery, TickReport, TrackState},
    snapshot::{SessionSnapshot, SessionSummary},
    store::{ArchiveEntry, StorageUsage},
};
use crossterm::{
    cursor::MoveToColumn,
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use std::io::Write;

pub struct TerminalDisplay;

impl TerminalDisplay {
    pub fn new() -> Self {
        Self
    }

    fn state_color(state: TrackState) -> Color {
        match state {
            TrackState::Tracking => Color::Green,
            TrackState::Paused => Color::Yellow,
            TrackState::Stopped => Color::Red,
            TrackState::Idle => Color::Grey,
        }
    }

    pub fn render_header(&self, stdout: &mut impl Write, source: &str) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Nature Tracker"),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor,
            Print(format!("Source: {}\n", source)),
            Print("Type 'help' for commands, Ctrl+C to exit\n\n")
        )?;
        Ok(())
    }

    /// Rewrite the current line with the live counters.
    pub fn render_status(&self, stdout: &mut impl Write, report: &TickReport) -> Result<()> {
        let watch = if report.watching { "GPS on" } else { "GPS off" };
        execute!(
            stdout,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(Self::state_color(report.state)),
            Print(format!("[{:>8}]", report.state)),
            ResetColor,
            Print(format!(
                " {}  {:.2} km  {} entries  {}",
                report.elapsed_display(),
                report.distance_km,
                report.entries,
                watch
            ))
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn render_message(&self, stdout: &mut impl Write, message: &str) -> Result<()> {
        execute!(stdout, MoveToColumn(0), Clear(ClearType::CurrentLine), Print(format!("{}\n", message)))?;
        Ok(())
    }

    pub fn render_error(&self, stdout: &mut impl Write, message: &str) -> Result<()> {
        execute!(
            stdout,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::Red),
            Print(format!("{}\n", message)),
            ResetColor
        )?;
        Ok(())
    }

    pub fn render_sessions(&self, stdout: &mut impl Write, sessions: &[SessionSummary]) -> Result<()> {
        if sessions.is_empty() {
            execute!(stdout, Print("No saved sessions.\n"))?;
            return Ok(());
        }

        execute!(
            stdout,
            SetForegroundColor(Color::Yellow),
            Print(format!("{:>3}  {:<24} {:<17} {:>8} {:>9} {:>7}\n", "#", "Name", "Date", "Time", "Distance", "Entries")),
            ResetColor
        )?;
        for session in sessions {
            execute!(
                stdout,
                Print(format!(
                    "{:>3}  {:<24} {:<17} {:>8} {:>6} km {:>7}\n",
                    session.index,
                    truncate(&session.name, 24),
                    session.date.format("%Y-%m-%d %H:%M"),
                    session.time,
                    session.distance,
                    session.entries
                ))
            )?;
        }
        Ok(())
    }

    pub fn render_session(&self, stdout: &mut impl Write, session: &SessionSnapshot) -> Result<()> {
        let log = &session.data;
        execute!(
            stdout,
            SetForegroundColor(Color::Cyan),
            Print(format!("{}\n", session.name)),
            ResetColor,
            Print(format!("  Date:      {}\n", session.date.format("%Y-%m-%d %H:%M:%S UTC"))),
            Print(format!("  Time:      {}\n", session.time)),
            Print(format!("  Distance:  {} km\n", session.distance)),
            Print(format!("  Locations: {}\n", log.count_of("location"))),
            Print(format!(
                "  Notes:     {} text, {} photo, {} audio, {} video\n",
                log.count_of("text"),
                log.count_of("photo"),
                log.count_of("audio"),
                log.count_of("video")
            )),
            Print(format!("  Accessibility answers: {}\n", log.count_of("accessibility")))
        )?;
        Ok(())
    }

    pub fn render_usage(&self, stdout: &mut impl Write, usage: &StorageUsage) -> Result<()> {
        let color = if usage.is_near_quota() { Color::Red } else { Color::Green };
        execute!(
            stdout,
            SetForegroundColor(Color::Magenta),
            Print("STORAGE:\n"),
            ResetColor,
            Print(format!("  Used:      {:>10.1} KB\n", usage.total_bytes as f64 / 1024.0)),
            Print(format!("  Available: {:>10.1} KB\n", usage.available_bytes() as f64 / 1024.0)),
            SetForegroundColor(color),
            Print(format!("  Quota:     {:>10.1} %\n", usage.percent_used())),
            ResetColor,
            Print(format!(
                "  Photos:    {:>10} ({:.1} KB)\n",
                usage.photo_count,
                usage.photo_bytes as f64 / 1024.0
            ))
        )?;
        if usage.is_near_quota() {
            execute!(stdout, Print("  Storage is getting full; export and clear older routes.\n"))?;
        }
        Ok(())
    }

    pub fn render_archive(&self, stdout: &mut impl Write, entries: &[ArchiveEntry]) -> Result<()> {
        if entries.is_empty() {
            execute!(stdout, Print("Archive is empty.\n"))?;
            return Ok(());
        }
        for entry in entries {
            execute!(
                stdout,
                Print(format!(
                    "{:>14}  {:<30} {}  {} media\n",
                    entry.id,
                    truncate(&entry.name, 30),
                    entry.date.format("%Y-%m-%d %H:%M"),
                    entry.media.len()
                ))
            )?;
        }
        Ok(())
    }

    pub fn render_recovery(&self, stdout: &mut impl Write, recovery: &Recovery) -> Result<()> {
        match recovery {
            Recovery::SharedRoute { entries, distance_km } => execute!(
                stdout,
                Print(format!("Viewing shared route: {} entries, {:.2} km\n", entries, distance_km))
            )?,
            Recovery::RestoredBackup { entries, distance_km, .. } => execute!(
                stdout,
                Print(format!(
                    "Restored unsaved route: {} entries, {:.2} km. Type 'watch' to continue recording.\n",
                    entries, distance_km
                ))
            )?,
            Recovery::NoRecovery { saved } if !saved.is_empty() => {
                execute!(stdout, Print("Saved sessions:\n"))?;
                self.render_sessions(stdout, saved)?;
            }
            Recovery::NoRecovery { .. }
            | Recovery::BackupDeclined
            | Recovery::InvalidShare { .. }
            | Recovery::CorruptBackup { .. } => {}
        }
        Ok(())
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::BackupTick;
    use chrono::{TimeZone, Utc};

    fn text(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_status_line() {
        let mut out = Vec::new();
        let report = TickReport {
            state: TrackState::Tracking,
            elapsed_ms: 3_723_000,
            distance_km: 1.234,
            entries: 12,
            watching: true,
            backup: BackupTick::NotDue,
        };
        TerminalDisplay::new().render_status(&mut out, &report).unwrap();
        let line = text(out);
        assert!(line.contains("tracking"));
        assert!(line.contains("01:02:03"));
        assert!(line.contains("1.23 km"));
        assert!(line.contains("GPS on"));
    }

    #[test]
    fn test_session_listing() {
        let mut out = Vec::new();
        let sessions = vec![SessionSummary {
            index: 0,
            name: "A very long name for a morning walk by the lake".to_string(),
            date: Utc.with_ymd_and_hms(2024, 6, 1, 7, 30, 0).unwrap(),
            time: "00:40:00".to_string(),
            distance: "3.10".to_string(),
            entries: 88,
        }];
        TerminalDisplay::new().render_sessions(&mut out, &sessions).unwrap();
        let listing = text(out);
        assert!(listing.contains("2024-06-01 07:30"));
        assert!(listing.contains("3.10 km"));
        assert!(listing.contains('…'));
    }

    #[test]
    fn test_empty_listings() {
        let display = TerminalDisplay::new();
        let mut out = Vec::new();
        display.render_sessions(&mut out, &[]).unwrap();
        display.render_archive(&mut out, &[]).unwrap();
        let listing = text(out);
        assert!(listing.contains("No saved sessions."));
        assert!(listing.contains("Archive is empty."));
    }

    #[test]
    fn test_usage_warns_near_quota() {
        let mut out = Vec::new();
        let usage = StorageUsage {
            total_bytes: 600,
            quota_bytes: 1000,
            photo_count: 2,
            photo_bytes: 512,
        };
        TerminalDisplay::new().render_usage(&mut out, &usage).unwrap();
        let report = text(out);
        assert!(report.contains("60.0 %"));
        assert!(report.contains("getting full"));
    }
}
