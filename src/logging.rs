// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! File logging. Nothing is written to the terminal.

use std::fs;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::version::APP_NAME;

/// Environment variable holding the log filter, e.g. `DYMO_LOG=debug`.
pub(crate) const LOG_ENV: &str = "DYMO_LOG";
const DEFAULT_FILTER: &str = "dymo_code=info";

/// Install a subscriber writing to `<dir>/dymo-code.log`.
///
/// Returns the writer guard, which must be held until exit so buffered
/// lines are flushed. Returns `None` if the directory cannot be created or
/// a subscriber is already installed.
pub(crate) fn init(dir: &Path) -> Option<WorkerGuard> {
    if let Err(e) = fs::create_dir_all(dir) {
        eprintln!("warning: logging disabled, cannot create {}: {}", dir.display(), e);
        return None;
    }

    let appender = tracing_appender::rolling::never(dir, format!("{}.log", APP_NAME));
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .ok()?;

    Some(guard)
}
