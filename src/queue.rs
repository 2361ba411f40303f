// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Message queue for lines typed while the agent is busy, and the shared
//! processing flag that decides whether a line is queued or dispatched.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};

use crate::output::{self, OutputContext, OutputEvent};

/// Characters shown in the "message queued" notification.
pub(crate) const QUEUED_PREVIEW_CHARS: usize = 50;

/// Shared busy/idle flag for the current agent turn.
///
/// One instance is shared by the message queue, the terminal UI and the
/// input capture loop, so there is a single source of truth. Reads may be a
/// cycle stale; that is acceptable for deciding enqueue vs dispatch.
#[derive(Clone, Default)]
pub(crate) struct ProcessingState {
    busy: Arc<AtomicBool>,
}

impl ProcessingState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn set(&self, busy: bool) {
        self.busy.store(busy, Ordering::SeqCst);
    }

    pub(crate) fn get(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }
}

/// A message waiting in the queue.
#[derive(Debug, Clone)]
pub(crate) struct QueuedMessage {
    pub content: String,
    pub timestamp: DateTime<Local>,
    pub position: u64,
}

#[derive(Default)]
struct Inner {
    items: VecDeque<QueuedMessage>,
    counter: u64,
}

/// Thread-safe FIFO of messages submitted while a turn is in progress.
#[derive(Clone)]
pub(crate) struct MessageQueue {
    inner: Arc<Mutex<Inner>>,
    state: ProcessingState,
    output: OutputContext,
}

impl MessageQueue {
    pub(crate) fn new(state: ProcessingState, output: OutputContext) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            state,
            output,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the deque half-updated.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a message and return its position.
    pub(crate) fn enqueue(&self, content: &str) -> u64 {
        let (position, depth) = {
            let mut inner = self.lock();
            inner.counter += 1;
            let position = inner.counter;
            inner.items.push_back(QueuedMessage {
                content: content.to_string(),
                timestamp: Local::now(),
                position,
            });
            (position, inner.items.len())
        };

        tracing::debug!(position, depth, "message queued");
        self.output.emit(OutputEvent::Queued {
            preview: output::preview(content, QUEUED_PREVIEW_CHARS),
            depth,
            position,
        });
        position
    }

    /// Pop the oldest message. Never blocks; `None` means nothing to do.
    pub(crate) fn dequeue(&self) -> Option<QueuedMessage> {
        self.lock().items.pop_front()
    }

    pub(crate) fn size(&self) -> usize {
        self.lock().items.len()
    }

    pub(crate) fn has_pending(&self) -> bool {
        !self.lock().items.is_empty()
    }

    /// Drop all pending messages and reset the position counter.
    /// Returns the number of messages dropped.
    pub(crate) fn clear(&self) -> usize {
        let mut inner = self.lock();
        let dropped = inner.items.len();
        inner.items.clear();
        inner.counter = 0;
        dropped
    }

    /// Copies of the pending messages, oldest first.
    pub(crate) fn snapshot(&self) -> Vec<QueuedMessage> {
        self.lock().items.iter().cloned().collect()
    }

    pub(crate) fn set_processing(&self, busy: bool) {
        self.state.set(busy);
    }

    pub(crate) fn is_processing(&self) -> bool {
        self.state.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn queue() -> MessageQueue {
        MessageQueue::new(ProcessingState::new(), OutputContext::null())
    }

    #[test]
    fn test_fifo_order() {
        let q = queue();
        let items = ["m1", "m2", "m3", "m4"];
        for item in items {
            q.enqueue(item);
        }

        let drained: Vec<String> = std::iter::from_fn(|| q.dequeue().map(|m| m.content)).collect();
        assert_eq!(drained, items);
        assert!(q.dequeue().is_none());
    }

    #[test]
    fn test_positions_increase_until_clear() {
        let q = queue();
        assert_eq!(q.enqueue("a"), 1);
        assert_eq!(q.enqueue("b"), 2);
        q.dequeue();
        assert_eq!(q.enqueue("c"), 3);

        assert_eq!(q.clear(), 2);
        assert_eq!(q.size(), 0);
        assert_eq!(q.enqueue("d"), 1);
    }

    #[test]
    fn test_empty_dequeue_is_idempotent() {
        let q = queue();
        for _ in 0..5 {
            assert!(q.dequeue().is_none());
        }
        assert!(!q.has_pending());
        assert_eq!(q.size(), 0);
    }

    #[test]
    fn test_processing_flag_round_trip() {
        let q = queue();
        assert!(!q.is_processing());
        q.set_processing(true);
        assert!(q.is_processing());
        q.set_processing(false);
        assert!(!q.is_processing());
    }

    #[test]
    fn test_processing_flag_shared_between_owners() {
        let state = ProcessingState::new();
        let q = MessageQueue::new(state.clone(), OutputContext::null());
        state.set(true);
        assert!(q.is_processing());
        q.set_processing(false);
        assert!(!state.get());
    }

    #[test]
    fn test_concurrent_enqueue_keeps_every_message() {
        let q = queue();
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let q = q.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        q.enqueue(&format!("{}-{}", t, i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(q.size(), 200);
        let mut positions: Vec<u64> = q.snapshot().iter().map(|m| m.position).collect();
        positions.sort_unstable();
        positions.dedup();
        assert_eq!(positions.len(), 200);
        assert_eq!(positions.first(), Some(&1));
        assert_eq!(positions.last(), Some(&200));
    }

    #[test]
    fn test_queued_while_busy_notification() {
        let (ctx, listener) = output::recording();
        let q = MessageQueue::new(ProcessingState::new(), ctx);
        q.set_processing(true);

        let long = "x".repeat(60);
        assert_eq!(q.enqueue("msg-A"), 1);
        assert_eq!(q.size(), 1);
        q.enqueue(&long);

        let events = listener.events();
        assert_eq!(
            events[0],
            OutputEvent::Queued {
                preview: "msg-A".into(),
                depth: 1,
                position: 1,
            }
        );
        assert_eq!(
            events[1],
            OutputEvent::Queued {
                preview: format!("{}...", "x".repeat(50)),
                depth: 2,
                position: 2,
            }
        );
    }
}
