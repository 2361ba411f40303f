// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

//! Streaming chat agent for OpenAI-compatible `/chat/completions` endpoints
//! (Groq by default).

use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Agent, Phase, StatusCallback};
use crate::config::ConfigFile;
use crate::error::{Error, Result};
use crate::output::{self, OutputContext};
use crate::sse::SseStream;

const SYSTEM_PROMPT: &str = "You are Dymo Code, a helpful command-line assistant for software \
developers. Be concise and practical. Prefer short answers with code when code is asked for.";

#[derive(Debug, Clone, Serialize, PartialEq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

impl ChatMessage {
    fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }

    fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant",
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
}

#[derive(Deserialize, Default)]
struct ChunkDelta {
    content: Option<String>,
}

/// Extract the text delta from one streamed JSON chunk.
fn chunk_text(data: &str) -> Result<Option<String>> {
    let chunk: ChatChunk = serde_json::from_str(data)?;
    Ok(chunk
        .choices
        .into_iter()
        .filter_map(|c| c.delta.content)
        .reduce(|mut acc, s| {
            acc.push_str(&s);
            acc
        })
        .filter(|s| !s.is_empty()))
}

pub(crate) struct OpenAiCompatAgent {
    client: Client,
    base_url: String,
    key_env: String,
    model: String,
    memory_context: Option<String>,
    history: Vec<ChatMessage>,
    status: Option<StatusCallback>,
    output: OutputContext,
}

impl OpenAiCompatAgent {
    pub(crate) fn new(settings: &ConfigFile, output: OutputContext) -> Self {
        Self {
            client: Client::new(),
            base_url: settings.api.base_url.clone(),
            key_env: settings.api.key_env.clone(),
            model: settings.model().to_string(),
            memory_context: None,
            history: Vec::new(),
            status: None,
            output,
        }
    }

    fn report(&self, phase: Phase, detail: &str) {
        if let Some(callback) = &self.status {
            callback(&phase, detail);
        }
    }

    fn system_prompt(&self) -> String {
        let cwd = std::env::current_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "?".to_string());
        let mut prompt = format!(
            "{}\n\n## Environment\n- OS: {}\n- Working Directory: {}",
            SYSTEM_PROMPT,
            std::env::consts::OS,
            cwd
        );
        if let Some(memory) = &self.memory_context {
            prompt.push_str("\n\n");
            prompt.push_str(memory);
        }
        prompt
    }

    fn build_messages(&self, text: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(ChatMessage::system(self.system_prompt()));
        messages.extend(self.history.iter().cloned());
        messages.push(ChatMessage::user(text));
        messages
    }

    async fn stream_response(&self, text: &str) -> Result<String> {
        let api_key = std::env::var(&self.key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} is not set; export it or add it under [api_keys] in the config file",
                    self.key_env
                ))
            })?;

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = ChatRequest {
            model: &self.model,
            messages: self.build_messages(text),
            stream: true,
        };

        self.report(Phase::Thinking, "");
        tracing::debug!(%url, model = %self.model, "sending chat request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Api { status, message });
        }

        let mut sse = SseStream::new(response.bytes_stream());
        let mut full = String::new();

        while let Some(event) = sse.next_event().await {
            let data = event?;
            let Some(delta) = chunk_text(&data)? else {
                continue;
            };
            if full.is_empty() {
                self.report(Phase::Streaming, "");
            }
            output::print_text(&self.output, &delta);
            full.push_str(&delta);
        }

        if !full.is_empty() {
            output::print_text_end(&self.output);
        }
        self.report(Phase::Finishing, "");
        Ok(full)
    }
}

impl Agent for OpenAiCompatAgent {
    async fn chat(&mut self, text: &str) -> Result<String> {
        let reply = self.stream_response(text).await?;
        self.history.push(ChatMessage::user(text));
        self.history.push(ChatMessage::assistant(reply.clone()));
        Ok(reply)
    }

    fn set_status_callback(&mut self, callback: StatusCallback) {
        self.status = Some(callback);
    }

    fn add_memory_context(&mut self, context: &str) {
        self.memory_context = Some(context.to_string()).filter(|c| !c.is_empty());
    }

    fn model_key(&self) -> &str {
        &self.model
    }

    fn set_model(&mut self, model: &str) {
        self.model = model.to_string();
    }

    fn clear_history(&mut self) {
        self.history.clear();
    }
}
