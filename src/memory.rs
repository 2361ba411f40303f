// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Long-term user memory: profile entries and remembered facts.
//!
//! Persisted as a single JSON document in the data directory. Every mutation
//! is written through; a failed write marks the store dirty so `close` can
//! retry it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::Result;

const MEMORY_FILE: &str = "memory.json";
const MAX_CONTEXT_FACTS: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ProfileEntry {
    pub value: String,
    pub category: String,
    pub updated_at: DateTime<Local>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Fact {
    pub id: u64,
    pub content: String,
    pub category: String,
    pub created_at: DateTime<Local>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct MemoryData {
    #[serde(default)]
    profile: BTreeMap<String, ProfileEntry>,
    #[serde(default)]
    facts: Vec<Fact>,
}

pub(crate) struct MemoryStore {
    path: PathBuf,
    data: MemoryData,
    dirty: bool,
}

impl MemoryStore {
    pub(crate) fn open_default() -> Self {
        Self::open(config::data_dir().join(MEMORY_FILE))
    }

    pub(crate) fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "memory file corrupted, starting empty");
                MemoryData::default()
            }),
            Err(_) => MemoryData::default(),
        };
        Self {
            path,
            data,
            dirty: false,
        }
    }

    pub(crate) fn get_profile(&self, key: &str) -> Option<&str> {
        self.data.profile.get(key).map(|entry| entry.value.as_str())
    }

    pub(crate) fn profile(&self) -> impl Iterator<Item = (&str, &ProfileEntry)> {
        self.data.profile.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn set_profile(&mut self, key: &str, value: &str, category: &str) -> Result<()> {
        self.data.profile.insert(
            key.to_string(),
            ProfileEntry {
                value: value.to_string(),
                category: category.to_string(),
                updated_at: Local::now(),
            },
        );
        self.persist()
    }

    /// Remember a fact. Returns its id.
    pub(crate) fn add_fact(&mut self, content: &str, category: &str) -> Result<u64> {
        let id = self.data.facts.iter().map(|f| f.id).max().unwrap_or(0) + 1;
        self.data.facts.push(Fact {
            id,
            content: content.to_string(),
            category: category.to_string(),
            created_at: Local::now(),
        });
        self.persist()?;
        Ok(id)
    }

    pub(crate) fn facts(&self) -> &[Fact] {
        &self.data.facts
    }

    /// Delete the fact with `id`. Returns `false` if there was none.
    pub(crate) fn forget(&mut self, id: u64) -> Result<bool> {
        let before = self.data.facts.len();
        self.data.facts.retain(|fact| fact.id != id);
        if self.data.facts.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Build the memory section appended to the agent's system prompt.
    /// Returns `None` when nothing is stored.
    pub(crate) fn get_context_for_ai(&self) -> Option<String> {
        let mut sections = Vec::new();

        if !self.data.profile.is_empty() {
            let mut section = String::from("## User Information");
            for (key, entry) in &self.data.profile {
                section.push_str(&format!("\n- {}: {}", key, entry.value));
            }
            sections.push(section);
        }

        if !self.data.facts.is_empty() {
            let mut section = String::from("## Known Facts About User");
            for fact in self.data.facts.iter().rev().take(MAX_CONTEXT_FACTS) {
                section.push_str(&format!("\n- {}", fact.content));
            }
            sections.push(section);
        }

        if sections.is_empty() {
            None
        } else {
            Some(sections.join("\n\n"))
        }
    }

    /// Flush any write that previously failed.
    pub(crate) fn close(mut self) -> Result<()> {
        if self.dirty {
            self.write()?;
            self.dirty = false;
        }
        Ok(())
    }

    fn persist(&mut self) -> Result<()> {
        match self.write() {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(e) => {
                self.dirty = true;
                Err(e)
            }
        }
    }

    fn write(&self) -> Result<()> {
        write_json(&self.path, &self.data)
    }
}

fn write_json(path: &Path, data: &MemoryData) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(data)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_store_has_no_context() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStore::open(dir.path().join(MEMORY_FILE));
        assert!(store.get_context_for_ai().is_none());
        assert_eq!(store.get_profile("name"), None);
    }

    #[test]
    fn test_profile_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MEMORY_FILE);

        let mut store = MemoryStore::open(&path);
        store.set_profile("name", "Ada", "identity").unwrap();
        store.close().unwrap();

        let store = MemoryStore::open(&path);
        assert_eq!(store.get_profile("name"), Some("Ada"));
        let (_, entry) = store.profile().next().unwrap();
        assert_eq!(entry.category, "identity");
    }

    #[test]
    fn test_fact_ids_increase() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::open(dir.path().join(MEMORY_FILE));
        assert_eq!(store.add_fact("likes rust", "user_input").unwrap(), 1);
        assert_eq!(store.add_fact("uses linux", "user_input").unwrap(), 2);
        assert_eq!(store.facts().len(), 2);
    }

    #[test]
    fn test_forget_removes_only_that_fact() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MEMORY_FILE);
        let mut store = MemoryStore::open(&path);
        store.add_fact("likes rust", "user_input").unwrap();
        store.add_fact("uses linux", "user_input").unwrap();

        assert!(store.forget(1).unwrap());
        assert!(!store.forget(1).unwrap());
        assert!(!store.forget(42).unwrap());

        let store = MemoryStore::open(&path);
        let remaining: Vec<u64> = store.facts().iter().map(|f| f.id).collect();
        assert_eq!(remaining, vec![2]);
    }

    #[test]
    fn test_context_includes_profile_and_recent_facts() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::open(dir.path().join(MEMORY_FILE));
        store.set_profile("name", "Ada", "identity").unwrap();
        for i in 0..12 {
            store.add_fact(&format!("fact {}", i), "user_input").unwrap();
        }

        let context = store.get_context_for_ai().unwrap();
        assert!(context.starts_with("## User Information\n- name: Ada"));
        assert!(context.contains("## Known Facts About User"));
        assert!(context.contains("- fact 11"));
        assert!(context.contains("- fact 2"));
        assert!(!context.contains("- fact 1\n"));
        assert!(!context.ends_with("- fact 1"));
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MEMORY_FILE);
        fs::write(&path, "{not json").unwrap();
        let store = MemoryStore::open(&path);
        assert!(store.get_context_for_ai().is_none());
    }
}
