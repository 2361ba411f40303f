// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

use std::sync::Arc;

/// Output events rendered by the active listener.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OutputEvent {
    /// Response text delta
    Text(String),
    /// Response text ended
    TextEnd,
    /// Echo of a line that is about to be processed
    Submitted(String),
    /// A line was queued while the agent was busy
    Queued {
        preview: String,
        depth: usize,
        position: u64,
    },
    /// A queued line is being taken off the queue
    ProcessingQueued { preview: String },
    /// Informational message
    Info(String),
    /// Something went well
    Success(String),
    /// Needs attention but is not an error
    Warning(String),
    /// Error message
    Error(String),
    /// Turn was interrupted
    Interrupted,
}

/// Trait for listening to output events
pub(crate) trait OutputListener: Send + Sync {
    fn on_event(&self, event: &OutputEvent);
}

/// Context for emitting output events. Cheap to clone (Arc internally).
#[derive(Clone)]
pub(crate) struct OutputContext {
    listener: Option<Arc<dyn OutputListener>>,
}

impl OutputContext {
    pub(crate) fn new(listener: Arc<dyn OutputListener>) -> Self {
        Self {
            listener: Some(listener),
        }
    }

    /// Create a null output context that discards all events (for tests)
    #[cfg(test)]
    pub(crate) fn null() -> Self {
        Self { listener: None }
    }

    pub(crate) fn emit(&self, event: OutputEvent) {
        if let Some(listener) = &self.listener {
            listener.on_event(&event);
        }
    }
}

/// Shorten `text` to at most `max_chars` characters, appending `...` when cut.
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}

pub(crate) fn print_text(ctx: &OutputContext, text: &str) {
    ctx.emit(OutputEvent::Text(text.to_string()));
}

pub(crate) fn print_text_end(ctx: &OutputContext) {
    ctx.emit(OutputEvent::TextEnd);
}

pub(crate) fn emit_info(ctx: &OutputContext, message: impl Into<String>) {
    ctx.emit(OutputEvent::Info(message.into()));
}

pub(crate) fn emit_success(ctx: &OutputContext, message: impl Into<String>) {
    ctx.emit(OutputEvent::Success(message.into()));
}

pub(crate) fn emit_warning(ctx: &OutputContext, message: impl Into<String>) {
    ctx.emit(OutputEvent::Warning(message.into()));
}

pub(crate) fn emit_error(ctx: &OutputContext, message: impl Into<String>) {
    ctx.emit(OutputEvent::Error(message.into()));
}

pub(crate) fn emit_interrupted(ctx: &OutputContext) {
    ctx.emit(OutputEvent::Interrupted);
}

/// Listener that records every event, for assertions in tests.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingListener {
    events: std::sync::Mutex<Vec<OutputEvent>>,
}

#[cfg(test)]
impl RecordingListener {
    pub(crate) fn events(&self) -> Vec<OutputEvent> {
        self.events.lock().unwrap().clone()
    }

    /// All Info/Success/Warning/Error text joined by newlines.
    pub(crate) fn messages(&self) -> String {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                OutputEvent::Info(m)
                | OutputEvent::Success(m)
                | OutputEvent::Warning(m)
                | OutputEvent::Error(m) => Some(m),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
impl OutputListener for RecordingListener {
    fn on_event(&self, event: &OutputEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

#[cfg(test)]
pub(crate) fn recording() -> (OutputContext, Arc<RecordingListener>) {
    let listener = Arc::new(RecordingListener::default());
    let ctx = OutputContext::new(listener.clone());
    (ctx, listener)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_text_unchanged() {
        assert_eq!(preview("hello", 50), "hello");
        assert_eq!(preview(&"a".repeat(50), 50), "a".repeat(50));
    }

    #[test]
    fn test_preview_truncates_by_chars() {
        let long = "é".repeat(51);
        assert_eq!(preview(&long, 50), format!("{}...", "é".repeat(50)));
    }

    #[test]
    fn test_recording_listener_collects_messages() {
        let (ctx, listener) = recording();
        emit_info(&ctx, "one");
        emit_error(&ctx, "two");
        print_text(&ctx, "ignored");
        assert_eq!(listener.messages(), "one\ntwo");
        assert_eq!(listener.events().len(), 3);
    }
}
