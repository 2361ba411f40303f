// SPDX-License-Identifier: MIT
// Copyright (c) 2025 Jason Ish

use futures::Stream;
use futures::StreamExt;

/// Incremental decoder for `text/event-stream` bodies.
///
/// Bytes are buffered until a full line is available, so multi-byte UTF-8
/// sequences split across network chunks decode correctly.
#[derive(Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return the `data:` payloads of every completed line.
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        while let Some(newline_pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            if let Some(data) = parse_data_line(&line) {
                payloads.push(data);
            }
        }
        payloads
    }

    /// Decode a trailing line that was not newline-terminated.
    pub(crate) fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        parse_data_line(&line)
    }
}

fn parse_data_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim_end_matches(['\n', '\r']);
    let data = line.strip_prefix("data:")?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    if data == "[DONE]" || data.is_empty() {
        return None;
    }
    Some(data.to_string())
}

/// Pull the next `data:` payload from a byte stream.
pub(crate) struct SseStream<S> {
    stream: S,
    decoder: SseDecoder,
    pending: std::collections::VecDeque<String>,
    finished: bool,
}

impl<S> SseStream<S> {
    pub(crate) fn new(stream: S) -> Self {
        Self {
            stream,
            decoder: SseDecoder::new(),
            pending: std::collections::VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, B, E> SseStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    pub(crate) async fn next_event(&mut self) -> Option<Result<String, E>> {
        loop {
            if let Some(data) = self.pending.pop_front() {
                return Some(Ok(data));
            }
            if self.finished {
                return None;
            }

            match self.stream.next().await {
                Some(Ok(chunk)) => self.pending.extend(self.decoder.feed(chunk.as_ref())),
                Some(Err(e)) => return Some(Err(e)),
                None => {
                    self.finished = true;
                    self.pending.extend(self.decoder.finish());
                }
            }
        }
    }
}
