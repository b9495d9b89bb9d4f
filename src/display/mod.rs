// src/display/mod.rs
//! Terminal output and prompts

pub mod prompt;
pub mod terminal;

pub use prompt::{next_line, spawn_stdin_reader, InputLines, TerminalPrompt};
pub use terminal::TerminalDisplay;
