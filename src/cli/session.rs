// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! The main orchestration loop.
//!
//! Work is taken in fixed priority order: the UI fast-path queue, then the
//! message queue, then the input mailbox. Slash commands are dispatched
//! inline; anything else becomes an agent turn raced against interrupts.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::input::{InputEvent, Submission};
use super::terminal_ui::TerminalUi;
use super::title::TitleUpdater;
use crate::agent::{Agent, Phase, StatusCallback};
use crate::background::BackgroundResults;
use crate::commands::{self, CommandContext, CommandResult};
use crate::config::UserConfig;
use crate::custom_commands::CustomCommand;
use crate::memory::MemoryStore;
use crate::output::{self, OutputContext, OutputEvent};
use crate::queue::MessageQueue;

/// Characters of a queued message shown when it is picked up.
const PROCESSING_PREVIEW_CHARS: usize = 60;

/// A unit of work chosen by the loop.
enum Work {
    FastPath(String),
    Queued(String),
    Direct(Submission),
}

impl Work {
    fn text(&self) -> &str {
        match self {
            Work::FastPath(text) | Work::Queued(text) => text,
            Work::Direct(submission) => &submission.text,
        }
    }

    /// Let the capture thread continue reading.
    fn release(&mut self) {
        if let Work::Direct(submission) = self {
            submission.release();
        }
    }
}

/// Marks one agent turn. Dropping it resets the busy state on every path
/// out of the turn, including unwinding.
struct TurnGuard<'a> {
    ui: &'a TerminalUi,
    title: &'a TitleUpdater,
}

impl<'a> TurnGuard<'a> {
    fn begin(ui: &'a TerminalUi, title: &'a TitleUpdater) -> Self {
        let phase = Phase::Thinking;
        ui.start_processing(&phase);
        title.set_status(phase.as_str());
        Self { ui, title }
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.ui.stop_processing();
        self.title.clear_status();
    }
}

/// Forward agent phases to the spinner and the title while a turn runs.
pub(crate) fn status_callback(ui: Arc<TerminalUi>, title: Arc<TitleUpdater>) -> StatusCallback {
    Arc::new(move |phase: &Phase, detail: &str| {
        // Late updates from an abandoned turn must not resurrect the spinner.
        if !ui.is_processing() {
            return;
        }
        ui.update_status(phase, detail);
        title.set_status(phase.as_str());
    })
}

pub(crate) struct SessionParts<A> {
    pub agent: A,
    pub queue: MessageQueue,
    pub ui: Arc<TerminalUi>,
    pub title: Arc<TitleUpdater>,
    pub config: UserConfig,
    pub memory: MemoryStore,
    pub background: BackgroundResults,
    pub custom_commands: Vec<CustomCommand>,
    pub output: OutputContext,
    pub mailbox: mpsc::Receiver<InputEvent>,
    pub interrupts: mpsc::UnboundedReceiver<()>,
}

pub(crate) struct Session<A> {
    agent: A,
    queue: MessageQueue,
    ui: Arc<TerminalUi>,
    title: Arc<TitleUpdater>,
    config: UserConfig,
    memory: MemoryStore,
    background: BackgroundResults,
    custom_commands: Vec<CustomCommand>,
    output: OutputContext,
    mailbox: mpsc::Receiver<InputEvent>,
    interrupts: mpsc::UnboundedReceiver<()>,
    last_input: Option<String>,
    session_named: bool,
    /// End of input was seen while draining the mailbox mid-turn.
    input_closed: bool,
}

impl<A: Agent> Session<A> {
    pub(crate) fn new(parts: SessionParts<A>) -> Self {
        let mut agent = parts.agent;
        agent.set_status_callback(status_callback(parts.ui.clone(), parts.title.clone()));
        Self {
            agent,
            queue: parts.queue,
            ui: parts.ui,
            title: parts.title,
            config: parts.config,
            memory: parts.memory,
            background: parts.background,
            custom_commands: parts.custom_commands,
            output: parts.output,
            mailbox: parts.mailbox,
            interrupts: parts.interrupts,
            last_input: None,
            session_named: false,
            input_closed: false,
        }
    }

    /// Run until `/exit` or end of input.
    pub(crate) async fn run(&mut self) {
        while let Some(mut work) = self.next_work().await {
            let text = work.text().to_string();
            match work {
                Work::Direct(_) => self.ui.print_direct_input(&text),
                Work::FastPath(_) | Work::Queued(_) => self.ui.print_submitted_input(&text),
            }

            let result = {
                let mut ctx = CommandContext {
                    agent: &mut self.agent,
                    queue: &self.queue,
                    ui: &self.ui,
                    title: &self.title,
                    config: &mut self.config,
                    memory: &mut self.memory,
                    background: &mut self.background,
                    custom_commands: &self.custom_commands,
                    last_input: self.last_input.as_deref(),
                    output: &self.output,
                };
                commands::dispatch(&text, &mut ctx)
            };

            match result {
                CommandResult::Exit => {
                    tracing::info!("exit requested");
                    break;
                }
                CommandResult::Handled => work.release(),
                CommandResult::NotACommand => self.agent_turn(text, work).await,
            }
        }
    }

    /// Pick the next unit of work, waiting on the mailbox if both queues are
    /// empty. `None` means end of input.
    async fn next_work(&mut self) -> Option<Work> {
        if self.ui.has_queued_messages()
            && let Some(text) = self.ui.get_next_queued()
        {
            return Some(Work::FastPath(text));
        }

        if self.queue.has_pending()
            && let Some(message) = self.queue.dequeue()
        {
            tracing::debug!(position = message.position, "processing queued message");
            self.output.emit(OutputEvent::ProcessingQueued {
                preview: output::preview(&message.content, PROCESSING_PREVIEW_CHARS),
            });
            return Some(Work::Queued(message.content));
        }

        if self.input_closed {
            tracing::info!("end of input");
            return None;
        }

        self.ui.show_prompt();
        loop {
            tokio::select! {
                biased;

                event = self.mailbox.recv() => {
                    return match event {
                        Some(InputEvent::Line(submission)) => Some(Work::Direct(submission)),
                        Some(InputEvent::Eof) | None => {
                            tracing::info!("end of input");
                            None
                        }
                    };
                }
                Some(()) = self.interrupts.recv() => {
                    output::emit_warning(&self.output, "Interrupted. Type /exit to quit.");
                    self.ui.show_prompt();
                }
            }
        }
    }

    async fn agent_turn(&mut self, text: String, mut work: Work) {
        if !self.session_named {
            self.title.update(None, Some(&text), None);
            self.session_named = true;
        }

        // Ctrl+C pressed outside a turn (a second press during the last
        // turn, or during a command) must not cancel this one.
        while self.interrupts.try_recv().is_ok() {}

        let ui = Arc::clone(&self.ui);
        let title = Arc::clone(&self.title);
        let guard = TurnGuard::begin(&ui, &title);
        // The busy flag is set; lines typed from here on are queued.
        work.release();
        self.absorb_mailbox();

        let outcome = tokio::select! {
            biased;

            result = self.agent.chat(&text) => Some(result),
            Some(()) = self.interrupts.recv() => None,
        };
        drop(guard);

        match outcome {
            Some(Ok(response)) => self.ui.set_suggestion_context(&response),
            Some(Err(e)) => {
                tracing::warn!(error = %e, "agent turn failed");
                output::emit_error(&self.output, e.display_message());
            }
            None => {
                tracing::info!("turn interrupted");
                output::emit_interrupted(&self.output);
            }
        }

        self.last_input = Some(text);
        self.ui
            .report_pending(self.queue.size() + self.ui.get_queue_size());
    }

    /// Move a line waiting in the mailbox into the message queue. Called
    /// while busy, so the capture thread is not left parked on its
    /// acknowledgement for the whole turn.
    fn absorb_mailbox(&mut self) {
        loop {
            match self.mailbox.try_recv() {
                Ok(InputEvent::Line(mut submission)) => {
                    self.queue.enqueue(&submission.text);
                    submission.release();
                }
                Ok(InputEvent::Eof) => {
                    self.input_closed = true;
                    return;
                }
                Err(_) => return,
            }
        }
    }

    /// Release session resources. Persisted state is flushed best-effort.
    pub(crate) fn shutdown(self) {
        self.ui.stop();
        self.title.reset();
        if let Err(e) = self.memory.close() {
            tracing::warn!(error = %e, "failed to flush memory store");
        }
    }

    #[cfg(test)]
    fn agent(&self) -> &A {
        &self.agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::{MockAgent, Reply};
    use crate::output::RecordingListener;
    use crate::queue::ProcessingState;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Harness {
        _dir: TempDir,
        state: ProcessingState,
        listener: Arc<RecordingListener>,
        mailbox: mpsc::Sender<InputEvent>,
        interrupts: mpsc::UnboundedSender<()>,
        session: Session<MockAgent>,
    }

    fn harness(agent: MockAgent) -> Harness {
        let dir = TempDir::new().unwrap();
        let (output, listener) = output::recording();
        let state = ProcessingState::new();
        let (mailbox_tx, mailbox_rx) = mpsc::channel(8);
        let (interrupt_tx, interrupt_rx) = mpsc::unbounded_channel();

        let session = Session::new(SessionParts {
            agent: agent.observing(state.clone()),
            queue: MessageQueue::new(state.clone(), output.clone()),
            ui: Arc::new(TerminalUi::headless(state.clone(), output.clone())),
            title: Arc::new(TitleUpdater::with_enabled(false)),
            config: UserConfig::load_from(dir.path().join("config.toml")),
            memory: MemoryStore::open(dir.path().join("memory.json")),
            background: BackgroundResults::disabled(),
            custom_commands: Vec::new(),
            output,
            mailbox: mailbox_rx,
            interrupts: interrupt_rx,
        });

        Harness {
            _dir: dir,
            state,
            listener,
            mailbox: mailbox_tx,
            interrupts: interrupt_tx,
            session,
        }
    }

    async fn send(h: &Harness, text: &str) {
        h.mailbox
            .send(InputEvent::Line(Submission::new(text)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_hello_runs_one_turn() {
        let mut h = harness(MockAgent::new().reply(Reply::Text("hi there".into())));
        send(&h, "hello").await;
        h.mailbox.send(InputEvent::Eof).await.unwrap();

        h.session.run().await;

        assert_eq!(h.session.agent().calls, vec!["hello"]);
        assert_eq!(h.session.agent().busy_during_call, vec![true]);
        assert!(!h.state.get());
        assert_eq!(h.session.last_input.as_deref(), Some("hello"));
        assert_eq!(h.session.ui.suggestion_context().as_deref(), Some("hi there"));
        assert_eq!(h.session.ui.spinner_label(), None);
        assert_eq!(h.session.title.current(), "Dymo Code - hello");
        assert!(h.listener.events().contains(&OutputEvent::Submitted("hello".into())));
    }

    #[tokio::test]
    async fn test_failed_turn_resets_state_and_continues() {
        let mut h = harness(MockAgent::new().reply(Reply::Fail("rate limited".into())));
        send(&h, "first").await;
        send(&h, "second").await;
        h.mailbox.send(InputEvent::Eof).await.unwrap();

        h.session.run().await;

        assert_eq!(h.session.agent().calls, vec!["first", "second"]);
        assert_eq!(h.session.agent().busy_during_call, vec![true, true]);
        assert!(!h.state.get());
        assert!(h.listener.messages().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_interrupt_aborts_only_current_turn() {
        let mut h = harness(MockAgent::new().reply(Reply::Hang));
        send(&h, "slow").await;
        send(&h, "next").await;
        h.mailbox.send(InputEvent::Eof).await.unwrap();

        let interrupts = h.interrupts.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            interrupts.send(()).unwrap();
        });

        h.session.run().await;

        assert_eq!(h.session.agent().calls, vec!["slow", "next"]);
        assert!(!h.state.get());
        assert_eq!(h.session.ui.spinner_label(), None);
        assert!(h.listener.events().contains(&OutputEvent::Interrupted));
    }

    #[tokio::test]
    async fn test_extra_interrupts_do_not_cancel_next_turn() {
        let mut h = harness(MockAgent::new().reply(Reply::Hang));
        send(&h, "slow").await;
        send(&h, "next").await;
        h.mailbox.send(InputEvent::Eof).await.unwrap();

        let interrupts = h.interrupts.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            interrupts.send(()).unwrap();
            interrupts.send(()).unwrap();
        });

        h.session.run().await;

        assert_eq!(h.session.agent().calls, vec!["slow", "next"]);
        let interrupted = h
            .listener
            .events()
            .into_iter()
            .filter(|e| *e == OutputEvent::Interrupted)
            .count();
        assert_eq!(interrupted, 1);
        assert_eq!(h.session.ui.suggestion_context().as_deref(), Some("echo: next"));
    }

    #[tokio::test]
    async fn test_waiting_line_is_queued_during_turn() {
        let mut h = harness(MockAgent::new());
        h.session.queue.enqueue("queued");
        let (submission, mut ack) = Submission::with_ack("typed");
        h.mailbox.send(InputEvent::Line(submission)).await.unwrap();
        h.mailbox.send(InputEvent::Eof).await.unwrap();

        h.session.run().await;

        assert_eq!(h.session.agent().calls, vec!["queued", "typed"]);
        assert!(ack.try_recv().is_ok());
        assert!(h.listener.events().contains(&OutputEvent::Queued {
            preview: "typed".into(),
            depth: 1,
            position: 2,
        }));
    }

    #[tokio::test]
    async fn test_idle_interrupt_prints_hint() {
        let mut h = harness(MockAgent::new());
        h.interrupts.send(()).unwrap();
        let mailbox = h.mailbox.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            mailbox.send(InputEvent::Eof).await.unwrap();
        });

        h.session.run().await;

        assert!(h.session.agent().calls.is_empty());
        assert!(
            h.listener
                .messages()
                .contains("Interrupted. Type /exit to quit.")
        );
    }

    #[tokio::test]
    async fn test_fast_path_then_queue_then_mailbox() {
        let mut h = harness(MockAgent::new());
        h.session.queue.enqueue(&"q".repeat(70));
        h.session.ui.add_to_queue("fast");
        send(&h, "direct").await;
        h.mailbox.send(InputEvent::Eof).await.unwrap();

        h.session.run().await;

        assert_eq!(
            h.session.agent().calls,
            vec!["fast".to_string(), "q".repeat(70), "direct".to_string()]
        );
        let events = h.listener.events();
        assert!(events.contains(&OutputEvent::Submitted("fast".into())));
        assert!(events.contains(&OutputEvent::ProcessingQueued {
            preview: format!("{}...", "q".repeat(60)),
        }));
        assert!(h.listener.messages().contains("(1 message(s) in queue)"));
    }

    #[tokio::test]
    async fn test_exit_stops_before_later_input() {
        let mut h = harness(MockAgent::new());
        send(&h, "/exit").await;
        send(&h, "never").await;

        h.session.run().await;

        assert!(h.session.agent().calls.is_empty());
        assert!(h.listener.messages().contains("Goodbye!"));
    }

    #[tokio::test]
    async fn test_commands_do_not_reach_agent() {
        let mut h = harness(MockAgent::new());
        send(&h, "/unknowncmd").await;
        send(&h, "/status").await;
        h.mailbox.send(InputEvent::Eof).await.unwrap();

        h.session.run().await;

        assert!(h.session.agent().calls.is_empty());
        assert!(h.listener.messages().contains("Unknown command: /unknowncmd"));
    }

    #[tokio::test]
    async fn test_retry_resubmits_last_input() {
        let mut h = harness(MockAgent::new());
        send(&h, "explain").await;
        send(&h, "/retry").await;
        h.mailbox.send(InputEvent::Eof).await.unwrap();

        h.session.run().await;

        assert_eq!(h.session.agent().calls, vec!["explain", "explain"]);
    }

    #[test]
    fn test_status_callback_ignored_when_idle() {
        let state = ProcessingState::new();
        let ui = Arc::new(TerminalUi::headless(state.clone(), OutputContext::null()));
        let title = Arc::new(TitleUpdater::with_enabled(false));
        let callback = status_callback(ui.clone(), title.clone());

        callback(&Phase::Thinking, "");
        assert_eq!(ui.spinner_label(), None);
        assert_eq!(title.current(), "Dymo Code");

        state.set(true);
        callback(&Phase::Other("read_file".into()), "");
        assert_eq!(ui.spinner_label().as_deref(), Some("Read file"));
        assert_eq!(title.current(), "Dymo Code (read_file)");
    }

    #[test]
    fn test_turn_guard_cleans_up_on_drop() {
        let state = ProcessingState::new();
        let ui = TerminalUi::headless(state.clone(), OutputContext::null());
        let title = TitleUpdater::with_enabled(false);
        {
            let _guard = TurnGuard::begin(&ui, &title);
            assert!(state.get());
            assert_eq!(title.current(), "Dymo Code (thinking)");
        }
        assert!(!state.get());
        assert_eq!(ui.spinner_label(), None);
        assert_eq!(title.current(), "Dymo Code");
    }

    #[test]
    fn test_turn_guard_cleans_up_on_panic() {
        let state = ProcessingState::new();
        let ui = TerminalUi::headless(state.clone(), OutputContext::null());
        let title = TitleUpdater::with_enabled(false);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = TurnGuard::begin(&ui, &title);
            panic!("agent blew up");
        }));
        assert!(result.is_err());
        assert!(!state.get());
    }
}
