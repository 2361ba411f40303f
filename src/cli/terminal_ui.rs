// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Terminal UI facade used by the session loop: the fast-path queue, the
//! busy indicator and the prompt.

use std::collections::VecDeque;
use std::io::{self, IsTerminal, Write};
use std::sync::{Mutex, MutexGuard};

use colored::Colorize;
use crossterm::cursor::MoveToPreviousLine;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};

use super::spinner::Spinner;
use crate::agent::Phase;
use crate::output::{self, OutputContext, OutputEvent};
use crate::queue::ProcessingState;

/// Longest response tail kept as suggestion context.
const SUGGESTION_CONTEXT_CHARS: usize = 2000;

pub(crate) struct TerminalUi {
    state: ProcessingState,
    fast_queue: Mutex<VecDeque<String>>,
    spinner: Spinner,
    output: OutputContext,
    suggestion_context: Mutex<Option<String>>,
    interactive: bool,
    /// The terminal echoes typed lines, so a direct echo replaces that line.
    terminal_echo: bool,
}

impl TerminalUi {
    pub(crate) fn new(state: ProcessingState, output: OutputContext) -> Self {
        let mut ui = Self::with_spinner(state, output, Spinner::new(), true);
        ui.terminal_echo = io::stdin().is_terminal() && io::stdout().is_terminal();
        ui
    }

    pub(crate) fn with_spinner(
        state: ProcessingState,
        output: OutputContext,
        spinner: Spinner,
        interactive: bool,
    ) -> Self {
        Self {
            state,
            fast_queue: Mutex::new(VecDeque::new()),
            spinner,
            output,
            suggestion_context: Mutex::new(None),
            interactive,
            terminal_echo: false,
        }
    }

    /// For tests: no drawing, no prompt.
    #[cfg(test)]
    pub(crate) fn headless(state: ProcessingState, output: OutputContext) -> Self {
        Self::with_spinner(state, output, Spinner::with_drawing(false), false)
    }

    pub(crate) fn start(&self) {
        self.spinner.start();
    }

    pub(crate) fn stop(&self) {
        self.spinner.stop();
    }

    fn queue(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.fast_queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Push a prompt that must run before anything typed by the user.
    pub(crate) fn add_to_queue(&self, text: impl Into<String>) {
        self.queue().push_back(text.into());
    }

    pub(crate) fn has_queued_messages(&self) -> bool {
        !self.queue().is_empty()
    }

    pub(crate) fn get_next_queued(&self) -> Option<String> {
        self.queue().pop_front()
    }

    pub(crate) fn get_queue_size(&self) -> usize {
        self.queue().len()
    }

    pub(crate) fn clear_queue(&self) -> usize {
        let mut queue = self.queue();
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    pub(crate) fn print_submitted_input(&self, text: &str) {
        self.output.emit(OutputEvent::Submitted(text.to_string()));
    }

    /// Echo a line typed at the prompt, replacing the prompt line the
    /// terminal left behind.
    pub(crate) fn print_direct_input(&self, text: &str) {
        if self.terminal_echo {
            let mut stdout = io::stdout().lock();
            let _ = queue!(stdout, MoveToPreviousLine(1), Clear(ClearType::CurrentLine));
            let _ = stdout.flush();
        }
        self.print_submitted_input(text);
    }

    /// Show the input prompt. Only called while idle, so it never lands in
    /// the middle of a response.
    pub(crate) fn show_prompt(&self) {
        if !self.interactive {
            return;
        }
        let mut stdout = io::stdout().lock();
        let _ = write!(stdout, "{} ", "❯".cyan().bold());
        let _ = stdout.flush();
    }

    pub(crate) fn set_processing(&self, busy: bool) {
        self.state.set(busy);
    }

    pub(crate) fn is_processing(&self) -> bool {
        self.state.get()
    }

    pub(crate) fn start_processing(&self, phase: &Phase) {
        self.set_processing(true);
        self.update_status(phase, "");
    }

    pub(crate) fn stop_processing(&self) {
        self.spinner.hide();
        self.set_processing(false);
    }

    /// Forward an agent phase to the spinner. Streaming hides it so the
    /// response text prints cleanly.
    pub(crate) fn update_status(&self, phase: &Phase, detail: &str) {
        if *phase == Phase::Streaming {
            self.spinner.hide();
            return;
        }
        let label = if detail.is_empty() {
            phase.label()
        } else {
            format!("{}: {}", phase.label(), detail)
        };
        self.spinner.show(&label);
    }

    #[cfg(test)]
    pub(crate) fn spinner_label(&self) -> Option<String> {
        self.spinner.label()
    }

    /// Remember the tail of the last response.
    pub(crate) fn set_suggestion_context(&self, text: &str) {
        let count = text.chars().count();
        let tail: String = text
            .chars()
            .skip(count.saturating_sub(SUGGESTION_CONTEXT_CHARS))
            .collect();
        *self
            .suggestion_context
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(tail);
    }

    #[cfg(test)]
    pub(crate) fn suggestion_context(&self) -> Option<String> {
        self.suggestion_context
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Print a notice about the remaining queued work.
    pub(crate) fn report_pending(&self, pending: usize) {
        if pending > 0 {
            output::emit_info(
                &self.output,
                format!("({} message(s) in queue)", pending)
                    .bright_black()
                    .to_string(),
            );
        }
    }
}
