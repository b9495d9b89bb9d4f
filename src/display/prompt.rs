// src/display/prompt.rs
//! Line-based prompts on the terminal

use crate::ports::Prompt;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};
use std::{
    io::{self, BufRead, Write},
    sync::Arc,
};
use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{self, UnboundedReceiver},
        Mutex,
    },
};
use tracing::debug;

/// Lines typed on stdin. The event loop reads commands from it and the
/// prompt borrows it while waiting for an answer.
pub type InputLines = Arc<Mutex<UnboundedReceiver<String>>>;

/// Forward stdin lines from a dedicated thread until EOF.
pub fn spawn_stdin_reader() -> InputLines {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "stdin closed");
                    break;
                }
            }
        }
    });
    Arc::new(Mutex::new(rx))
}

/// Next line from the shared input, or `None` once stdin is closed.
pub async fn next_line(lines: &InputLines) -> Option<String> {
    lines.lock().await.recv().await
}

/// Blocking prompt for use inside the multi-threaded runtime.
pub struct TerminalPrompt<W: Write = io::Stdout> {
    lines: InputLines,
    out: W,
}

impl TerminalPrompt {
    pub fn new(lines: InputLines) -> Self {
        Self {
            lines,
            out: io::stdout(),
        }
    }
}

impl<W: Write> TerminalPrompt<W> {
    pub fn with_output(lines: InputLines, out: W) -> Self {
        Self { lines, out }
    }

    fn ask(&mut self, question: &str) -> Option<String> {
        let _ = execute!(
            self.out,
            Print("\n"),
            SetForegroundColor(Color::Cyan),
            Print(question),
            ResetColor,
            Print(" ")
        );
        let _ = self.out.flush();

        let lines = Arc::clone(&self.lines);
        tokio::task::block_in_place(move || Handle::current().block_on(next_line(&lines)))
    }
}

impl<W: Write> Prompt for TerminalPrompt<W> {
    fn confirm(&mut self, message: &str) -> bool {
        match self.ask(&format!("{} [y/N]", message)) {
            Some(answer) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            None => false,
        }
    }

    /// An empty answer takes the default; end of input cancels.
    fn prompt_text(&mut self, message: &str, default: &str) -> Option<String> {
        let answer = self.ask(&format!("{} [{}]", message, default))?;
        let answer = answer.trim();
        if answer.is_empty() {
            Some(default.to_string())
        } else {
            Some(answer.to_string())
        }
    }

    fn notify(&mut self, message: &str) {
        let _ = execute!(
            self.out,
            Print("\n"),
            SetForegroundColor(Color::Yellow),
            Print(message),
            ResetColor,
            Print("\n")
        );
        let _ = self.ask("Press Enter to continue");
    }
}
