// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Terminal window title: `Dymo Code [model] - session (status)`.

use std::io::{self, IsTerminal, Write};
use std::sync::Mutex;

use crossterm::{execute, terminal::SetTitle};

use crate::version::APP_TITLE;

const SESSION_MAX_CHARS: usize = 30;

#[derive(Default)]
struct TitleState {
    model: Option<String>,
    session: Option<String>,
    status: Option<String>,
}

/// Owned by the session and shared with the agent status callback.
pub(crate) struct TitleUpdater {
    state: Mutex<TitleState>,
    enabled: bool,
}

impl TitleUpdater {
    /// Enabled only when stdout is a terminal.
    pub(crate) fn new() -> Self {
        Self::with_enabled(io::stdout().is_terminal())
    }

    pub(crate) fn with_enabled(enabled: bool) -> Self {
        Self {
            state: Mutex::new(TitleState::default()),
            enabled,
        }
    }

    /// Write `title` as-is. Failures are ignored.
    pub(crate) fn set_title(&self, title: &str) {
        if !self.enabled {
            return;
        }
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, SetTitle(title)) {
            tracing::debug!(error = %e, "failed to set terminal title");
        }
        let _ = stdout.flush();
    }

    /// Update whichever parts are given and redraw.
    pub(crate) fn update(&self, model: Option<&str>, session: Option<&str>, status: Option<&str>) {
        let title = {
            let mut state = self.lock();
            if let Some(model) = model {
                state.model = Some(model.to_string());
            }
            if let Some(session) = session {
                state.session = Some(session.to_string());
            }
            if let Some(status) = status {
                state.status = Some(status.to_string());
            }
            state.render()
        };
        self.set_title(&title);
    }

    pub(crate) fn set_status(&self, status: &str) {
        self.update(None, None, Some(status));
    }

    pub(crate) fn clear_status(&self) {
        let title = {
            let mut state = self.lock();
            state.status = None;
            state.render()
        };
        self.set_title(&title);
    }

    /// Forget everything and show the bare application name.
    pub(crate) fn reset(&self) {
        *self.lock() = TitleState::default();
        self.set_title(APP_TITLE);
    }

    /// The title as it would currently be written.
    #[cfg(test)]
    pub(crate) fn current(&self) -> String {
        self.lock().render()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TitleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl TitleState {
    fn render(&self) -> String {
        format_title(
            self.model.as_deref(),
            self.session.as_deref(),
            self.status.as_deref(),
        )
    }
}

pub(crate) fn format_title(model: Option<&str>, session: Option<&str>, status: Option<&str>) -> String {
    let mut title = APP_TITLE.to_string();

    if let Some(model) = model.filter(|m| !m.is_empty()) {
        title.push_str(&format!(" [{}]", model));
    }
    if let Some(session) = session.filter(|s| !s.is_empty()) {
        let session = session.lines().next().unwrap_or_default();
        title.push_str(" - ");
        title.push_str(&crate::output::preview(session, SESSION_MAX_CHARS));
    }
    if let Some(status) = status.filter(|s| !s.is_empty()) {
        title.push_str(&format!(" ({})", status));
    }

    title
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_title_parts() {
        assert_eq!(format_title(None, None, None), "Dymo Code");
        assert_eq!(
            format_title(Some("llama"), Some("fix bug"), Some("thinking")),
            "Dymo Code [llama] - fix bug (thinking)"
        );
        assert_eq!(format_title(None, None, Some("")), "Dymo Code");
    }

    #[test]
    fn test_format_title_truncates_session() {
        let session = "a".repeat(40);
        assert_eq!(
            format_title(None, Some(&session), None),
            format!("Dymo Code - {}...", "a".repeat(30))
        );
        assert_eq!(
            format_title(None, Some("first line\nsecond"), None),
            "Dymo Code - first line"
        );
    }

    #[test]
    fn test_updater_tracks_state() {
        let title = TitleUpdater::with_enabled(false);
        title.update(Some("m"), Some("s"), None);
        title.set_status("streaming");
        assert_eq!(title.current(), "Dymo Code [m] - s (streaming)");

        title.clear_status();
        assert_eq!(title.current(), "Dymo Code [m] - s");

        title.reset();
        assert_eq!(title.current(), "Dymo Code");
    }
}
