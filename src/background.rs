// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Fire-and-forget startup tasks: the version check and command-path setup.
//!
//! Each task delivers at most one result through a oneshot channel. The
//! session polls the receivers without waiting, so a slow network never
//! delays the prompt.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::setup::{self, SetupOutcome};
use crate::upgrade::{self, UpdateInfo};

/// How long the session waits before the first poll.
pub(crate) const GRACE_DELAY: Duration = Duration::from_millis(300);

/// What the background tasks should do.
#[derive(Debug, Clone)]
pub(crate) struct BackgroundOptions {
    pub check_updates: bool,
    pub version_url: String,
    pub update_timeout: Duration,
    pub auto_setup: bool,
}

/// Latest known state of one background result.
#[derive(Debug)]
enum Slot<T> {
    Pending(oneshot::Receiver<Option<T>>),
    Ready(Option<T>),
}

impl<T: Clone> Slot<T> {
    fn poll(&mut self) -> Option<T> {
        if let Slot::Pending(rx) = self {
            match rx.try_recv() {
                Ok(value) => *self = Slot::Ready(value),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Closed) => *self = Slot::Ready(None),
            }
        }
        match self {
            Slot::Ready(value) => value.clone(),
            Slot::Pending(_) => None,
        }
    }

    fn is_pending(&self) -> bool {
        matches!(self, Slot::Pending(_))
    }
}

/// Receivers for the two background tasks.
pub(crate) struct BackgroundResults {
    update: Slot<UpdateInfo>,
    setup: Slot<SetupOutcome>,
}

impl BackgroundResults {
    /// Build from raw receivers.
    pub(crate) fn new(
        update: oneshot::Receiver<Option<UpdateInfo>>,
        setup: oneshot::Receiver<Option<SetupOutcome>>,
    ) -> Self {
        Self {
            update: Slot::Pending(update),
            setup: Slot::Pending(setup),
        }
    }

    /// Results for when nothing was started.
    pub(crate) fn disabled() -> Self {
        Self {
            update: Slot::Ready(None),
            setup: Slot::Ready(None),
        }
    }

    /// Non-blocking. `None` while the check is running or when there is
    /// nothing newer.
    pub(crate) fn update(&mut self) -> Option<UpdateInfo> {
        self.update.poll()
    }

    pub(crate) fn update_pending(&mut self) -> bool {
        self.update.poll();
        self.update.is_pending()
    }

    pub(crate) fn setup(&mut self) -> Option<SetupOutcome> {
        self.setup.poll()
    }
}

/// Spawn the enabled tasks on the current runtime.
pub(crate) fn spawn(options: BackgroundOptions) -> BackgroundResults {
    let (update_tx, update_rx) = oneshot::channel();
    let (setup_tx, setup_rx) = oneshot::channel();

    if options.check_updates {
        let url = options.version_url.clone();
        let timeout = options.update_timeout;
        tokio::spawn(async move {
            let result = match upgrade::check_for_update(&url, timeout).await {
                Ok(update) => update,
                Err(e) => {
                    tracing::debug!(error = %e, "version check failed");
                    None
                }
            };
            let _ = update_tx.send(result);
        });
    } else {
        let _ = update_tx.send(None);
    }

    if options.auto_setup {
        tokio::spawn(async move {
            let result = match tokio::task::spawn_blocking(setup::setup_command).await {
                Ok(Ok(outcome)) => Some(outcome),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "command setup failed");
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "command setup task panicked");
                    None
                }
            };
            let _ = setup_tx.send(result);
        });
    } else {
        let _ = setup_tx.send(None);
    }

    BackgroundResults::new(update_rx, setup_rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn update_info() -> UpdateInfo {
        UpdateInfo {
            latest: "9.9.9".into(),
            current: "0.3.0".into(),
            url: "https://example.com".into(),
        }
    }

    #[test]
    fn test_poll_before_and_after_send() {
        let (update_tx, update_rx) = oneshot::channel();
        let (_setup_tx, setup_rx) = oneshot::channel();
        let mut results = BackgroundResults::new(update_rx, setup_rx);

        assert!(results.update_pending());
        assert_eq!(results.update(), None);

        update_tx.send(Some(update_info())).unwrap();
        assert_eq!(results.update(), Some(update_info()));
        // Re-polling keeps the cached value.
        assert_eq!(results.update(), Some(update_info()));
        assert!(!results.update_pending());
        assert_eq!(results.setup(), None);
    }

    #[test]
    fn test_dropped_sender_becomes_none() {
        let (update_tx, update_rx) = oneshot::channel::<Option<UpdateInfo>>();
        let (setup_tx, setup_rx) = oneshot::channel();
        let mut results = BackgroundResults::new(update_rx, setup_rx);

        drop(update_tx);
        setup_tx
            .send(Some(SetupOutcome::AlreadyInstalled {
                location: PathBuf::from("/usr/bin/dymo-code"),
            }))
            .unwrap();

        assert_eq!(results.update(), None);
        assert!(!results.update_pending());
        assert!(results.setup().is_some());
    }

    #[tokio::test]
    async fn test_spawn_with_everything_disabled() {
        let mut results = spawn(BackgroundOptions {
            check_updates: false,
            version_url: String::new(),
            update_timeout: Duration::from_secs(1),
            auto_setup: false,
        });
        assert!(!results.update_pending());
        assert_eq!(results.update(), None);
        assert_eq!(results.setup(), None);
    }

    #[tokio::test]
    async fn test_failed_check_is_swallowed() {
        let mut results = spawn(BackgroundOptions {
            check_updates: true,
            version_url: "not a url".into(),
            update_timeout: Duration::from_secs(1),
            auto_setup: false,
        });
        for _ in 0..50 {
            if !results.update_pending() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!results.update_pending());
        assert_eq!(results.update(), None);
    }

    #[test]
    fn test_disabled_results() {
        let mut results = BackgroundResults::disabled();
        assert!(!results.update_pending());
        assert_eq!(results.setup(), None);
    }
}
