// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse config: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns a concise message suitable for printing after a failed turn.
    /// For API errors the body is shown with the status code after it; if the
    /// body is JSON with an `error.message` field, only that is shown.
    pub(crate) fn display_message(&self) -> String {
        match self {
            Error::Api { status, message } => {
                let detail = serde_json::from_str::<serde_json::Value>(message)
                    .ok()
                    .and_then(|json| {
                        json.pointer("/error/message")
                            .and_then(|m| m.as_str())
                            .map(str::to_string)
                    })
                    .unwrap_or_else(|| message.clone());
                format!("{} ({})", detail, status)
            }
            other => other.to_string(),
        }
    }
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_message_extracts_json_error() {
        let err = Error::Api {
            status: 401,
            message: r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#
                .into(),
        };
        assert_eq!(err.display_message(), "Invalid API Key (401)");
    }

    #[test]
    fn test_display_message_plain_body() {
        let err = Error::Api {
            status: 503,
            message: "upstream unavailable".into(),
        };
        assert_eq!(err.display_message(), "upstream unavailable (503)");
    }

    #[test]
    fn test_display_message_other_variants() {
        let err = Error::Config("no key".into());
        assert_eq!(err.display_message(), "Config error: no key");
    }
}
