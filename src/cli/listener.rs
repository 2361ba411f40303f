// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Output listener for the interactive terminal.

use std::io::{self, Write};
use std::sync::Mutex;

use colored::Colorize;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

use crate::output::{OutputEvent, OutputListener};

/// Prints events to stdout, keeping streamed text and notices on separate
/// lines.
pub(crate) struct CliListener {
    /// True when the cursor sits at column 0.
    at_line_start: Mutex<bool>,
}

impl CliListener {
    pub(crate) fn new() -> Self {
        Self {
            at_line_start: Mutex::new(true),
        }
    }
}

/// Render a notice event as a single line, or `None` for stream events.
fn render_notice(event: &OutputEvent) -> Option<String> {
    let line = match event {
        OutputEvent::Text(_) | OutputEvent::TextEnd => return None,
        OutputEvent::Submitted(text) => format!("{} {}", "❯".bright_black(), text),
        OutputEvent::Queued {
            preview,
            depth,
            position,
        } => format!(
            "{} {} {}",
            format!("⏳ Queued #{}:", position).yellow(),
            preview,
            format!("({} in queue)", depth).bright_black()
        ),
        OutputEvent::ProcessingQueued { preview } => format!(
            "{} {}",
            "▶ Processing queued message:".cyan(),
            preview
        ),
        OutputEvent::Info(message) => message.clone(),
        OutputEvent::Success(message) => format!("{} {}", "✓".green(), message.green()),
        OutputEvent::Warning(message) => format!("{} {}", "!".yellow(), message.yellow()),
        OutputEvent::Error(message) => format!("{} {}", "Error:".red().bold(), message.red()),
        OutputEvent::Interrupted => "Processing interrupted.".yellow().to_string(),
    };
    Some(line)
}

impl OutputListener for CliListener {
    fn on_event(&self, event: &OutputEvent) {
        let mut at_line_start = self.at_line_start.lock().unwrap_or_else(|e| e.into_inner());
        let mut stdout = io::stdout().lock();

        match event {
            OutputEvent::Text(text) => {
                if text.is_empty() {
                    return;
                }
                let _ = write!(stdout, "{}", text);
                *at_line_start = text.ends_with('\n');
            }
            OutputEvent::TextEnd => {
                if !*at_line_start {
                    let _ = writeln!(stdout);
                }
                let _ = writeln!(stdout);
                *at_line_start = true;
            }
            other => {
                let Some(line) = render_notice(other) else {
                    return;
                };
                if *at_line_start {
                    // Erase a spinner frame or a bare prompt.
                    let _ = queue!(stdout, MoveToColumn(0), Clear(ClearType::CurrentLine));
                } else {
                    let _ = writeln!(stdout);
                }
                let _ = writeln!(stdout, "{}", line);
                *at_line_start = true;
            }
        }
        let _ = stdout.flush();
    }
}
