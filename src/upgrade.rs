// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Checks a remote version descriptor for a newer release.

use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::version::{APP_NAME, VERSION};

const RELEASES_PAGE: &str = "https://github.com/TPEOficial/dymo-code/releases";

#[derive(Debug, Deserialize)]
struct VersionDescriptor {
    version: String,
    #[serde(default)]
    url: Option<String>,
}

/// A newer version than the running one is available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UpdateInfo {
    pub latest: String,
    pub current: String,
    pub url: String,
}

/// Fetch the descriptor at `url` and compare it with the running version.
///
/// Returns `Ok(None)` when already up to date.
pub(crate) async fn check_for_update(url: &str, timeout: Duration) -> Result<Option<UpdateInfo>> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    let response = client
        .get(url)
        .header("User-Agent", format!("{}/{}", APP_NAME, VERSION))
        .header("Accept", "application/json")
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(Error::Api {
            status: response.status().as_u16(),
            message: format!("version check failed for {}", url),
        });
    }

    let body = response.text().await?;
    compare_descriptor(&body, VERSION)
}

fn compare_descriptor(body: &str, current: &str) -> Result<Option<UpdateInfo>> {
    let descriptor: VersionDescriptor = serde_json::from_str(body)?;

    // Strip 'v' prefix if present for comparison
    let latest = descriptor.version.trim().trim_start_matches('v');
    let current = current.trim_start_matches('v');

    if is_newer_version(latest, current) {
        Ok(Some(UpdateInfo {
            latest: latest.to_string(),
            current: current.to_string(),
            url: descriptor.url.unwrap_or_else(|| RELEASES_PAGE.to_string()),
        }))
    } else {
        Ok(None)
    }
}

/// Compare two semantic version strings.
/// Returns true if `latest` is newer than `current`.
fn is_newer_version(latest: &str, current: &str) -> bool {
    let parse_version = |v: &str| -> Vec<u32> {
        v.split(['.', '-', '+'])
            .map_while(|part| part.parse::<u32>().ok())
            .collect()
    };

    let latest_parts = parse_version(latest);
    let current_parts = parse_version(current);

    for (l, c) in latest_parts.iter().zip(current_parts.iter()) {
        match l.cmp(c) {
            std::cmp::Ordering::Greater => return true,
            std::cmp::Ordering::Less => return false,
            std::cmp::Ordering::Equal => continue,
        }
    }

    // Equal prefix: an extra non-zero component is newer ("1.0.1" vs "1.0")
    latest_parts
        .get(current_parts.len()..)
        .is_some_and(|rest| rest.iter().any(|&p| p > 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_newer_version() {
        // Newer versions
        assert!(is_newer_version("1.0.0", "0.1.0"));
        assert!(is_newer_version("0.2.0", "0.1.0"));
        assert!(is_newer_version("0.1.1", "0.1.0"));
        assert!(is_newer_version("2.0.0", "1.99.99"));
        assert!(is_newer_version("1.0.1", "1.0"));

        // Same version
        assert!(!is_newer_version("0.1.0", "0.1.0"));
        assert!(!is_newer_version("1.0.0", "1.0"));

        // Older versions
        assert!(!is_newer_version("0.1.0", "0.2.0"));
        assert!(!is_newer_version("0.0.9", "0.1.0"));
    }

    #[test]
    fn test_is_newer_version_ignores_suffixes() {
        assert!(is_newer_version("0.4.0-beta.1", "0.3.0"));
        assert!(!is_newer_version("0.3.0+build5", "0.3.0"));
    }

    #[test]
    fn test_compare_descriptor() {
        let update = compare_descriptor(r#"{"version":"v9.0.0"}"#, "0.3.0")
            .unwrap()
            .unwrap();
        assert_eq!(update.latest, "9.0.0");
        assert_eq!(update.current, "0.3.0");
        assert_eq!(update.url, RELEASES_PAGE);

        let custom = compare_descriptor(
            r#"{"version":"1.0.0","url":"https://example.com/dl"}"#,
            "0.3.0",
        )
        .unwrap()
        .unwrap();
        assert_eq!(custom.url, "https://example.com/dl");

        assert_eq!(
            compare_descriptor(r#"{"version":"0.3.0"}"#, "0.3.0").unwrap(),
            None
        );
        assert!(compare_descriptor("<html>", "0.3.0").is_err());
    }
}
