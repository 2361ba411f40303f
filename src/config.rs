// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Persistent user configuration.
//!
//! Stored as TOML in the platform config directory, e.g.
//! `~/.config/dymo-code/config.toml` on Linux.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::version::APP_NAME;

const CONFIG_FILE: &str = "config.toml";

pub(crate) const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub(crate) const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub(crate) const DEFAULT_KEY_ENV: &str = "GROQ_API_KEY";
pub(crate) const DEFAULT_VERSION_URL: &str =
    "https://github.com/TPEOficial/dymo-code/raw/refs/heads/main/static-api/version.json";
const DEFAULT_UPDATE_TIMEOUT_SECS: u64 = 5;

/// Per-user config directory, e.g. `~/.config/dymo-code`.
pub(crate) fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Per-user data directory, e.g. `~/.local/share/dymo-code`.
pub(crate) fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

pub(crate) fn logs_dir() -> PathBuf {
    data_dir().join("logs")
}

/// Color theme for terminal output.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Theme {
    #[default]
    Default,
    Mono,
}

impl Theme {
    pub(crate) const ALL: &'static [Theme] = &[Theme::Default, Theme::Mono];

    pub(crate) fn name(self) -> &'static str {
        match self {
            Theme::Default => "default",
            Theme::Mono => "mono",
        }
    }

    pub(crate) fn description(self) -> &'static str {
        match self {
            Theme::Default => "Colored output",
            Theme::Mono => "Plain output without colors",
        }
    }

    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Apply the theme to all subsequent `colored` output.
    pub(crate) fn apply(self) {
        match self {
            Theme::Default => colored::control::unset_override(),
            Theme::Mono => colored::control::set_override(false),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub(crate) struct ApiConfig {
    /// OpenAI-compatible base URL (without `/chat/completions`).
    pub base_url: String,
    /// Environment variable holding the API key.
    pub key_env: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            key_env: DEFAULT_KEY_ENV.to_string(),
        }
    }
}

/// On-disk representation of the user config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub(crate) struct ConfigFile {
    pub first_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Local>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Local>>,
    pub theme: Theme,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Check for a newer release in the background at startup.
    pub check_updates: bool,
    /// Install the `dymo-code` command on PATH in the background at startup.
    pub auto_setup: bool,
    pub version_url: String,
    pub update_timeout_secs: u64,
    pub api: ApiConfig,
    /// Stored API keys, keyed by environment variable name.
    pub api_keys: BTreeMap<String, String>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            first_run: true,
            user_name: None,
            created_at: None,
            last_seen: None,
            theme: Theme::default(),
            model: None,
            check_updates: true,
            auto_setup: true,
            version_url: DEFAULT_VERSION_URL.to_string(),
            update_timeout_secs: DEFAULT_UPDATE_TIMEOUT_SECS,
            api: ApiConfig::default(),
            api_keys: BTreeMap::new(),
        }
    }
}

impl ConfigFile {
    pub(crate) fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// User configuration bound to the file it was loaded from.
pub(crate) struct UserConfig {
    path: PathBuf,
    file: ConfigFile,
    load_error: Option<String>,
}

impl UserConfig {
    /// Load from the default location, falling back to defaults.
    pub(crate) fn load() -> Self {
        Self::load_from(config_dir().join(CONFIG_FILE))
    }

    /// Load from an explicit path. A missing or unreadable file yields
    /// defaults; the read error is kept for [`Self::load_error`].
    pub(crate) fn load_from(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (file, load_error) = match read_config_file(&path) {
            Ok(Some(file)) => (file, None),
            Ok(None) => (ConfigFile::default(), None),
            Err(e) => (ConfigFile::default(), Some(e.to_string())),
        };
        Self {
            path,
            file,
            load_error,
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Why the file was ignored, if it was. Config loads before logging
    /// starts, so the caller reports this once a subscriber exists.
    pub(crate) fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub(crate) fn settings(&self) -> &ConfigFile {
        &self.file
    }

    pub(crate) fn is_first_run(&self) -> bool {
        self.file.first_run
    }

    pub(crate) fn user_name(&self) -> Option<&str> {
        self.file
            .user_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
    }

    pub(crate) fn complete_first_run(&mut self, name: &str) -> Result<()> {
        let now = Local::now();
        self.update(|file| {
            file.first_run = false;
            file.user_name = Some(name.to_string());
            file.created_at = Some(now);
            file.last_seen = Some(now);
        })
    }

    pub(crate) fn update_last_seen(&mut self) -> Result<()> {
        self.update(|file| file.last_seen = Some(Local::now()))
    }

    /// Apply a change and persist it.
    pub(crate) fn update(&mut self, change: impl FnOnce(&mut ConfigFile)) -> Result<()> {
        change(&mut self.file);
        self.save()
    }

    /// Export stored API keys into the process environment.
    ///
    /// Variables that are already set win over stored keys. Returns the
    /// number of variables exported.
    ///
    /// Must be called before any other thread is spawned.
    pub(crate) fn load_api_keys_to_env(&self) -> usize {
        let mut exported = 0;
        for (name, value) in &self.file.api_keys {
            if name.is_empty() || value.is_empty() || std::env::var_os(name).is_some() {
                continue;
            }
            // SAFETY: called from `main` before the runtime and any other
            // thread exist, so nothing can read the environment concurrently.
            unsafe { std::env::set_var(name, value) };
            exported += 1;
        }
        exported
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.file)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<Option<ConfigFile>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let file: ConfigFile = toml::from_str(&content)?;
    if file.update_timeout_secs == 0 {
        return Err(Error::Config("update_timeout_secs must be positive".into()));
    }
    Ok(Some(file))
}
