// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Input capture loop.
//!
//! A dedicated thread reads stdin line by line for the whole session. Lines
//! typed while a turn is running go to the message queue; otherwise they are
//! handed to the main loop through a single-slot mailbox, and the thread
//! waits until the main loop has taken ownership before reading again.

use std::io::{self, BufRead};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use tokio::sync::{mpsc, oneshot};

use crate::queue::MessageQueue;

/// A line handed directly to the main loop.
#[derive(Debug)]
pub(crate) struct Submission {
    pub text: String,
    ack: Option<oneshot::Sender<()>>,
}

impl Submission {
    #[cfg(test)]
    pub(crate) fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ack: None,
        }
    }

    /// A submission plus the receiver the capture thread would wait on.
    #[cfg(test)]
    pub(crate) fn with_ack(text: impl Into<String>) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        let submission = Self {
            text: text.into(),
            ack: Some(tx),
        };
        (submission, rx)
    }

    /// Let the capture thread read the next line. Called once the
    /// processing flag reflects this submission; dropping has the same
    /// effect.
    pub(crate) fn release(&mut self) {
        if let Some(ack) = self.ack.take() {
            let _ = ack.send(());
        }
    }
}

#[derive(Debug)]
pub(crate) enum InputEvent {
    Line(Submission),
    /// No more input will arrive.
    Eof,
}

/// Handle to the running capture thread.
pub(crate) struct InputCapture {
    stop: Arc<AtomicBool>,
}

impl InputCapture {
    /// Start reading stdin on a new thread.
    pub(crate) fn spawn(queue: MessageQueue, mailbox: mpsc::Sender<InputEvent>) -> io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        thread::Builder::new()
            .name("input-capture".into())
            .spawn(move || capture_loop(io::stdin().lock(), queue, mailbox, thread_stop))?;
        Ok(Self { stop })
    }

    /// Ask the thread to exit. It notices after its current read returns.
    pub(crate) fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

/// Read `reader` until end of input or until `stop` is set.
pub(crate) fn capture_loop<R: BufRead>(
    mut reader: R,
    queue: MessageQueue,
    mailbox: mpsc::Sender<InputEvent>,
    stop: Arc<AtomicBool>,
) {
    let mut line = String::new();

    while !stop.load(Ordering::SeqCst) {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed, treating as end of input");
                break;
            }
        }

        if stop.load(Ordering::SeqCst) {
            return;
        }

        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        if queue.is_processing() {
            queue.enqueue(text);
            continue;
        }

        let (ack_tx, ack_rx) = oneshot::channel();
        let submission = Submission {
            text: text.to_string(),
            ack: Some(ack_tx),
        };
        if mailbox.blocking_send(InputEvent::Line(submission)).is_err() {
            tracing::debug!("mailbox closed, input capture exiting");
            return;
        }
        // Ok or Err both mean the main loop is done with the hand-off.
        let _ = ack_rx.blocking_recv();
    }

    stop.store(true, Ordering::SeqCst);
    let _ = mailbox.blocking_send(InputEvent::Eof);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputContext;
    use crate::queue::ProcessingState;
    use std::io::{Cursor, Read};

    /// Fails the first `read_line` with `Interrupted`, like a read cut short
    /// by a signal.
    struct InterruptedOnce {
        inner: Cursor<&'static str>,
        interrupted: bool,
    }

    impl Read for InterruptedOnce {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.inner.read(buf)
        }
    }

    impl BufRead for InterruptedOnce {
        fn fill_buf(&mut self) -> io::Result<&[u8]> {
            self.inner.fill_buf()
        }

        fn consume(&mut self, amt: usize) {
            self.inner.consume(amt)
        }

        fn read_line(&mut self, buf: &mut String) -> io::Result<usize> {
            if !self.interrupted {
                self.interrupted = true;
                return Err(io::ErrorKind::Interrupted.into());
            }
            self.inner.read_line(buf)
        }
    }

    fn spawn_loop(input: &'static str, queue: MessageQueue) -> (mpsc::Receiver<InputEvent>, Arc<AtomicBool>) {
        let (tx, rx) = mpsc::channel(1);
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        thread::spawn(move || capture_loop(Cursor::new(input), queue, tx, thread_stop));
        (rx, stop)
    }

    #[tokio::test]
    async fn test_idle_lines_go_to_mailbox_then_eof() {
        let queue = MessageQueue::new(ProcessingState::new(), OutputContext::null());
        let (mut rx, stop) = spawn_loop("hello\n\n   \nworld  \n", queue.clone());

        let mut lines = Vec::new();
        loop {
            match rx.recv().await {
                Some(InputEvent::Line(mut submission)) => {
                    submission.release();
                    lines.push(submission.text);
                }
                Some(InputEvent::Eof) | None => break,
            }
        }

        assert_eq!(lines, vec!["hello", "world"]);
        assert_eq!(queue.size(), 0);
        assert!(stop.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_busy_lines_are_queued() {
        let queue = MessageQueue::new(ProcessingState::new(), OutputContext::null());
        queue.set_processing(true);
        let (mut rx, _stop) = spawn_loop("msg-A\nmsg-B\n", queue.clone());

        assert!(matches!(rx.recv().await, Some(InputEvent::Eof)));
        let queued: Vec<String> = queue.snapshot().into_iter().map(|m| m.content).collect();
        assert_eq!(queued, vec!["msg-A", "msg-B"]);
    }

    #[tokio::test]
    async fn test_next_line_waits_for_release() {
        let state = ProcessingState::new();
        let queue = MessageQueue::new(state.clone(), OutputContext::null());
        let (mut rx, _stop) = spawn_loop("first\nsecond\n", queue.clone());

        let Some(InputEvent::Line(mut first)) = rx.recv().await else {
            panic!("expected a line");
        };
        assert_eq!(first.text, "first");
        // The turn starts before the hand-off is released, so the next
        // line is read while busy and must be queued.
        state.set(true);
        first.release();

        assert!(matches!(rx.recv().await, Some(InputEvent::Eof)));
        assert_eq!(queue.size(), 1);
        assert_eq!(queue.dequeue().unwrap().content, "second");
    }

    #[tokio::test]
    async fn test_stop_flag_ends_loop() {
        let queue = MessageQueue::new(ProcessingState::new(), OutputContext::null());
        let (tx, mut rx) = mpsc::channel(1);
        let stop = Arc::new(AtomicBool::new(true));
        let thread_stop = stop.clone();
        thread::spawn(move || capture_loop(Cursor::new("ignored\n"), queue, tx, thread_stop));

        assert!(matches!(rx.recv().await, Some(InputEvent::Eof)));
    }

    #[tokio::test]
    async fn test_interrupted_read_keeps_reading() {
        let queue = MessageQueue::new(ProcessingState::new(), OutputContext::null());
        let (tx, mut rx) = mpsc::channel(1);
        let reader = InterruptedOnce {
            inner: Cursor::new("after signal\n"),
            interrupted: false,
        };
        thread::spawn(move || capture_loop(reader, queue, tx, Arc::new(AtomicBool::new(false))));

        let Some(InputEvent::Line(mut line)) = rx.recv().await else {
            panic!("expected a line");
        };
        line.release();
        assert_eq!(line.text, "after signal");
        assert!(matches!(rx.recv().await, Some(InputEvent::Eof)));
    }

    #[test]
    fn test_closed_mailbox_exits() {
        let queue = MessageQueue::new(ProcessingState::new(), OutputContext::null());
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        // Returns instead of blocking forever.
        capture_loop(
            Cursor::new("line\n"),
            queue,
            tx,
            Arc::new(AtomicBool::new(false)),
        );
    }
}
