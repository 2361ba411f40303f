// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Status spinner drawn on the current line by its own task.

use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use colored::Colorize;
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use tokio::sync::watch;
use tokio::task::JoinHandle;

const FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const FRAME_INTERVAL: Duration = Duration::from_millis(80);

struct Shared {
    /// Label while visible, `None` while hidden. Drawing happens with this
    /// lock held so a hide never races a frame.
    label: Mutex<Option<String>>,
    /// Whether anything is on screen that `hide` must erase.
    drawn: Mutex<bool>,
    draw: bool,
}

pub(crate) struct Spinner {
    shared: Arc<Shared>,
    wake: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Spinner {
    /// Draws only when stdout is a terminal.
    pub(crate) fn new() -> Self {
        Self::with_drawing(io::stdout().is_terminal())
    }

    pub(crate) fn with_drawing(draw: bool) -> Self {
        let (wake, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                label: Mutex::new(None),
                drawn: Mutex::new(false),
                draw,
            }),
            wake,
            task: Mutex::new(None),
        }
    }

    /// Spawn the animation task. Requires a tokio runtime; a second call is
    /// a no-op.
    pub(crate) fn start(&self) {
        let mut task = lock(&self.task);
        if task.is_some() {
            return;
        }
        let shared = self.shared.clone();
        let rx = self.wake.subscribe();
        *task = Some(tokio::spawn(spinner_task(shared, rx)));
    }

    /// Hide and stop the animation task.
    pub(crate) fn stop(&self) {
        self.hide();
        if let Some(task) = lock(&self.task).take() {
            task.abort();
        }
    }

    /// Show the spinner with `label`, or change the label if already shown.
    pub(crate) fn show(&self, label: &str) {
        *lock(&self.shared.label) = Some(label.to_string());
        self.wake.send_replace(true);
    }

    /// Hide the spinner and erase it synchronously.
    pub(crate) fn hide(&self) {
        let mut label = lock(&self.shared.label);
        *label = None;
        let mut drawn = lock(&self.shared.drawn);
        if *drawn {
            clear_line();
            *drawn = false;
        }
        drop(drawn);
        drop(label);
        self.wake.send_replace(false);
    }

    #[cfg(test)]
    pub(crate) fn label(&self) -> Option<String> {
        lock(&self.shared.label).clone()
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

fn clear_line() {
    let mut stdout = io::stdout().lock();
    let _ = queue!(stdout, MoveToColumn(0), Clear(ClearType::CurrentLine));
    let _ = stdout.flush();
}

async fn spinner_task(shared: Arc<Shared>, mut wake: watch::Receiver<bool>) {
    let mut frame_idx = 0usize;
    let mut interval = tokio::time::interval(FRAME_INTERVAL);

    loop {
        // Sleep until shown.
        if !*wake.borrow_and_update() {
            if wake.changed().await.is_err() {
                break;
            }
            continue;
        }

        tokio::select! {
            _ = interval.tick() => {
                let label = lock(&shared.label);
                if let Some(label) = label.as_deref() {
                    if shared.draw {
                        let frame = FRAMES[frame_idx % FRAMES.len()];
                        let mut stdout = io::stdout().lock();
                        let _ = queue!(
                            stdout,
                            MoveToColumn(0),
                            Clear(ClearType::CurrentLine),
                            crossterm::style::Print(format!(
                                "{} {}",
                                frame.cyan(),
                                format!("{}...", label).bright_black()
                            ))
                        );
                        let _ = stdout.flush();
                        *lock(&shared.drawn) = true;
                    }
                    frame_idx = frame_idx.wrapping_add(1);
                }
            }
            result = wake.changed() => {
                if result.is_err() {
                    break;
                }
            }
        }
    }
}
