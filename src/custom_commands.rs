// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! User-defined slash commands.
//!
//! Every `*.md` file under `.dymo/commands/` (project) or
//! `<config_dir>/dymo-code/commands/` (user) becomes a command named after
//! its path relative to that directory, so `git/review.md` is `/git/review`.
//! The body is a prompt template; `$ARGUMENTS` is replaced by the argument
//! string and `$1`, `$2`, ... by individual (quote-aware) arguments.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use crate::config;

/// A command loaded from a markdown file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CustomCommand {
    pub name: String,
    pub description: String,
    pub template: String,
    /// Where the command came from, e.g. `project` or `user`.
    pub source: &'static str,
}

impl CustomCommand {
    /// Render the prompt for the given argument string.
    pub(crate) fn expand(&self, args: &str) -> String {
        substitute_variables(&self.template, args.trim())
    }
}

#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    description: Option<String>,
}

/// Directories searched for commands, in priority order.
pub(crate) fn command_dirs() -> Vec<(PathBuf, &'static str)> {
    vec![
        (PathBuf::from(".dymo").join("commands"), "project"),
        (config::config_dir().join("commands"), "user"),
    ]
}

/// Load commands from the default directories.
pub(crate) fn load_custom_commands() -> Vec<CustomCommand> {
    load_from_dirs(&command_dirs())
}

/// Load commands from `dirs`. Earlier directories shadow later ones when two
/// files map to the same name. Unreadable files are skipped.
pub(crate) fn load_from_dirs(dirs: &[(PathBuf, &'static str)]) -> Vec<CustomCommand> {
    let mut commands: Vec<CustomCommand> = Vec::new();

    for (dir, source) in dirs {
        if !dir.is_dir() {
            continue;
        }

        let mut found: Vec<CustomCommand> = WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "md"))
            .filter_map(|e| load_file(dir, e.path(), source))
            .filter(|cmd| !commands.iter().any(|c| c.name == cmd.name))
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        commands.extend(found);
    }

    commands
}

fn load_file(root: &Path, path: &Path, source: &'static str) -> Option<CustomCommand> {
    let relative = path.strip_prefix(root).ok()?.with_extension("");
    let name = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_lowercase())
        .collect::<Vec<_>>()
        .join("/");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::debug!(path = %path.display(), error = %e, "skipping command file");
            return None;
        }
    };

    let (description, template) = parse_command_file(&content);
    Some(CustomCommand {
        name,
        description,
        template,
        source,
    })
}

/// Split a command file into (description, template).
///
/// The description comes from front matter when present, otherwise from the
/// first line of the body.
fn parse_command_file(content: &str) -> (String, String) {
    let content = content.trim();
    let (frontmatter, body) = match split_frontmatter(content) {
        Some((fm, body)) => (fm, body),
        None => (Frontmatter::default(), content),
    };

    let description = frontmatter
        .description
        .unwrap_or_else(|| body.lines().next().unwrap_or_default().trim().to_string());
    (description, body.to_string())
}

/// Parse `---` YAML or `+++` TOML front matter. Malformed front matter is
/// treated as empty but still stripped from the body.
fn split_frontmatter(content: &str) -> Option<(Frontmatter, &str)> {
    let (fence, is_yaml) = if content.starts_with("---") {
        ("---", true)
    } else if content.starts_with("+++") {
        ("+++", false)
    } else {
        return None;
    };

    let after_fence = &content[fence.len()..];
    let after_open = after_fence
        .strip_prefix("\r\n")
        .or_else(|| after_fence.strip_prefix('\n'))?;
    let (raw, body) = if let Some(body) = after_open.strip_prefix(fence) {
        ("", body)
    } else {
        let close = format!("\n{}", fence);
        let end = after_open.find(&close)?;
        (&after_open[..end], &after_open[end + close.len()..])
    };

    let frontmatter = if raw.trim().is_empty() {
        Frontmatter::default()
    } else if is_yaml {
        serde_yaml_ng::from_str(raw).unwrap_or_default()
    } else {
        toml::from_str(raw).unwrap_or_default()
    };

    Some((frontmatter, body.trim_start()))
}

/// Split arguments on whitespace, keeping single- or double-quoted runs
/// together.
fn parse_arguments(args: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in args.chars() {
        match (quote, c) {
            (None, '"' | '\'') => quote = Some(c),
            (Some(q), _) if q == c => quote = None,
            (None, ' ' | '\t') => {
                if !current.is_empty() {
                    result.push(std::mem::take(&mut current));
                }
            }
            _ => current.push(c),
        }
    }
    if !current.is_empty() {
        result.push(current);
    }

    result
}

/// Replace `$ARGUMENTS` and `$N` in one pass over the template, so
/// substituted text is never rescanned. `$N` without a matching argument is
/// left as written.
fn substitute_variables(template: &str, args: &str) -> String {
    let positional = parse_arguments(args);
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(at) = rest.find('$') {
        result.push_str(&rest[..at]);
        let tail = &rest[at + 1..];
        if let Some(after) = tail.strip_prefix("ARGUMENTS") {
            result.push_str(args);
            rest = after;
            continue;
        }

        let digits = tail.bytes().take_while(u8::is_ascii_digit).count();
        let value = tail[..digits]
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| positional.get(i));
        match value {
            Some(value) => result.push_str(value),
            None => {
                result.push('$');
                result.push_str(&tail[..digits]);
            }
        }
        rest = &tail[digits..];
    }
    result.push_str(rest);

    result
}
