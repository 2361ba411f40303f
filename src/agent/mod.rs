// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! The chat agent interface consumed by the session loop.

mod openai_compat;

pub(crate) use openai_compat::OpenAiCompatAgent;

use std::future::Future;
use std::sync::Arc;

use crate::error::Result;

/// Progress phase reported by an agent while a turn runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Request sent, waiting for the first token.
    Thinking,
    /// Response text is arriving.
    Streaming,
    /// Response complete, wrapping up.
    Finishing,
    /// Anything else an agent wants to surface, e.g. a tool name.
    Other(String),
}

impl Phase {
    /// Short machine name, used in the window title.
    pub(crate) fn as_str(&self) -> &str {
        match self {
            Phase::Thinking => "thinking",
            Phase::Streaming => "streaming",
            Phase::Finishing => "finishing",
            Phase::Other(name) => name,
        }
    }

    /// Human label shown next to the spinner.
    pub(crate) fn label(&self) -> String {
        match self {
            Phase::Thinking => "Thinking".to_string(),
            Phase::Streaming => "Generating response".to_string(),
            Phase::Finishing => "Finishing".to_string(),
            Phase::Other(name) => {
                let mut words = name.replace('_', " ");
                if let Some(first) = words.get(..1) {
                    let upper = first.to_uppercase();
                    words.replace_range(..1, &upper);
                }
                words
            }
        }
    }
}

/// Receives `(phase, detail)` updates from inside `Agent::chat`.
pub(crate) type StatusCallback = Arc<dyn Fn(&Phase, &str) + Send + Sync>;

pub(crate) trait Agent: Send {
    /// Send one user message and return the full response text.
    ///
    /// Dropping the returned future abandons the turn; implementations must
    /// leave their history as it was before the call in that case.
    fn chat(&mut self, text: &str) -> impl Future<Output = Result<String>> + Send;

    fn set_status_callback(&mut self, callback: StatusCallback);

    /// Append long-term memory to the system prompt. An empty string removes
    /// it.
    fn add_memory_context(&mut self, context: &str);

    fn model_key(&self) -> &str;

    fn set_model(&mut self, model: &str);

    fn clear_history(&mut self);
}
