// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Makes the `dymo-code` command available on PATH.
//!
//! On unix the running executable is symlinked into `/usr/local/bin`, or
//! `~/.local/bin` when the system directory is not writable. On Windows a
//! `dymo-code.cmd` wrapper is written into the data directory's `bin`.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::version::APP_NAME;

/// Result of a setup run that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SetupOutcome {
    /// The command already resolves on PATH.
    AlreadyInstalled { location: PathBuf },
    /// A link or wrapper was created.
    Installed { location: PathBuf, on_path: bool },
}

impl SetupOutcome {
    /// One line for the user.
    pub(crate) fn note(&self) -> String {
        match self {
            SetupOutcome::AlreadyInstalled { location } => format!(
                "Command '{}' is already available at {}",
                APP_NAME,
                location.display()
            ),
            SetupOutcome::Installed {
                location,
                on_path: true,
            } => format!(
                "Command '{}' installed at {}. Restart your terminal to use it.",
                APP_NAME,
                location.display()
            ),
            SetupOutcome::Installed {
                location,
                on_path: false,
            } => {
                let dir = location.parent().unwrap_or(location);
                format!(
                    "Command '{}' installed at {}. Add {} to your PATH to use it.",
                    APP_NAME,
                    location.display(),
                    dir.display()
                )
            }
        }
    }

    pub(crate) fn is_fresh_install(&self) -> bool {
        matches!(self, SetupOutcome::Installed { .. })
    }
}

/// Where and what to install.
#[derive(Debug, Clone)]
pub(crate) struct SetupPlan {
    pub exe: PathBuf,
    /// Candidate directories, tried in order.
    pub targets: Vec<PathBuf>,
    /// Value of `PATH` used for lookups.
    pub path_var: OsString,
}

impl SetupPlan {
    /// Plan for the current process and platform.
    pub(crate) fn for_current_process() -> Result<Self> {
        let exe = std::env::current_exe()?;
        let path_var = std::env::var_os("PATH").unwrap_or_default();

        let mut targets = Vec::new();
        if cfg!(windows) {
            targets.push(crate::config::data_dir().join("bin"));
        } else {
            targets.push(PathBuf::from("/usr/local/bin"));
            if let Some(home) = dirs::home_dir() {
                targets.push(home.join(".local").join("bin"));
            }
        }

        Ok(Self {
            exe,
            targets,
            path_var,
        })
    }

    pub(crate) fn run(&self) -> Result<SetupOutcome> {
        if let Some(location) = find_on_path(&command_file_name(), &self.path_var) {
            return Ok(SetupOutcome::AlreadyInstalled { location });
        }

        let mut last_error = None;
        for dir in &self.targets {
            match install_into(&self.exe, dir) {
                Ok(location) => {
                    tracing::info!(location = %location.display(), "installed command");
                    let on_path = std::env::split_paths(&self.path_var).any(|p| p == *dir);
                    return Ok(SetupOutcome::Installed { location, on_path });
                }
                Err(e) => {
                    tracing::debug!(dir = %dir.display(), error = %e, "cannot install here");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .map(Error::Io)
            .unwrap_or_else(|| Error::Other("no install location available".into())))
    }
}

/// Run setup for the current process.
pub(crate) fn setup_command() -> Result<SetupOutcome> {
    SetupPlan::for_current_process()?.run()
}

fn command_file_name() -> String {
    if cfg!(windows) {
        format!("{}.cmd", APP_NAME)
    } else {
        APP_NAME.to_string()
    }
}

/// First PATH entry containing `name`.
fn find_on_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

#[cfg(unix)]
fn install_into(exe: &Path, dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let link = dir.join(APP_NAME);
    if link.symlink_metadata().is_ok() {
        fs::remove_file(&link)?;
    }
    std::os::unix::fs::symlink(exe, &link)?;
    Ok(link)
}

#[cfg(not(unix))]
fn install_into(exe: &Path, dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let wrapper = dir.join(format!("{}.cmd", APP_NAME));
    fs::write(&wrapper, format!("@echo off\r\n\"{}\" %*\r\n", exe.display()))?;
    Ok(wrapper)
}
