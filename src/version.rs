// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Version and naming constants for Dymo Code.

/// The version string from Cargo.toml (e.g., "0.3.0")
pub(crate) const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the installed command and of the per-user config/data directories.
pub(crate) const APP_NAME: &str = "dymo-code";

/// Base window title.
pub(crate) const APP_TITLE: &str = "Dymo Code";
