//! Streaming chat completion client.
//!
//! One request per user turn: POST the conversation with `stream: true`,
//! then pull SSE-framed chunks off the response body one at a time. The
//! sequence is lazy, single-pass, and non-restartable; the caller drives
//! it by awaiting [`ChatStream::next_event`] until the terminal
//! [`StreamEvent::Completed`] arrives. Dropping the stream closes the
//! connection, which is how a user interrupt cancels an in-flight request.

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt;

use memchr::memchr;

use crate::api::{ChatMessage, ChatRequest, ChatResponse, TokenUsage};
use crate::utils::url::construct_api_url;

/// Errors raised by a streaming request.
#[derive(Debug)]
pub enum ProviderError {
    /// The request could not be sent or the connection dropped mid-body.
    Network(reqwest::Error),

    /// The endpoint answered with a non-success status.
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    /// The stream carried a payload that does not follow the chunk
    /// framing, including in-stream error objects.
    Stream(String),

    /// The stream terminated without ever reporting token usage.
    MissingUsage,
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Network(source) => write!(f, "network error: {source}"),
            ProviderError::Api { status, message } => {
                write!(f, "API request failed with status {status}: {message}")
            }
            ProviderError::Stream(message) => write!(f, "malformed response stream: {message}"),
            ProviderError::MissingUsage => {
                write!(f, "stream ended without a usage record")
            }
        }
    }
}

impl StdError for ProviderError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ProviderError::Network(source) => Some(source),
            _ => None,
        }
    }
}

/// One element of the response sequence: a text fragment to render, or
/// the terminal usage record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Delta(String),
    Completed(TokenUsage),
}

/// Incremental SSE frame decoder. Bytes go in as they arrive; complete
/// events come out. Pure state machine, no I/O, so the framing rules are
/// testable without a network.
#[derive(Default)]
struct SseParser {
    buffer: Vec<u8>,
    usage: Option<TokenUsage>,
    done: bool,
}

impl SseParser {
    /// Consume a chunk of body bytes, appending decoded events to `out`.
    fn feed(
        &mut self,
        bytes: &[u8],
        out: &mut VecDeque<StreamEvent>,
    ) -> Result<(), ProviderError> {
        self.buffer.extend_from_slice(bytes);

        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line = String::from_utf8_lossy(&self.buffer[..newline_pos])
                .trim()
                .to_string();
            self.buffer.drain(..=newline_pos);

            self.handle_line(&line, out)?;
            if self.done {
                break;
            }
        }
        Ok(())
    }

    /// The body ended; verify the stream terminated properly.
    fn finish(&self) -> Result<(), ProviderError> {
        if self.done {
            Ok(())
        } else {
            Err(ProviderError::Stream(
                "connection closed before the stream completed".to_string(),
            ))
        }
    }

    fn handle_line(
        &mut self,
        line: &str,
        out: &mut VecDeque<StreamEvent>,
    ) -> Result<(), ProviderError> {
        // Non-data lines (comments, event names, blanks) carry nothing here
        let Some(payload) = line.strip_prefix("data:").map(str::trim_start) else {
            return Ok(());
        };

        if payload == "[DONE]" {
            self.done = true;
            return match self.usage.take() {
                Some(usage) => {
                    out.push_back(StreamEvent::Completed(usage));
                    Ok(())
                }
                None => Err(ProviderError::MissingUsage),
            };
        }

        if payload.is_empty() {
            return Ok(());
        }

        match serde_json::from_str::<ChatResponse>(payload) {
            Ok(response) => {
                if let Some(content) = response
                    .choices
                    .first()
                    .and_then(|choice| choice.delta.content.as_ref())
                {
                    if !content.is_empty() {
                        out.push_back(StreamEvent::Delta(content.clone()));
                    }
                }
                // OpenRouter reports usage on the final chunk before [DONE]
                if let Some(usage) = response.usage {
                    self.usage = Some(usage);
                }
                Ok(())
            }
            Err(_) => Err(ProviderError::Stream(summarize_error(payload))),
        }
    }
}

/// Extract a short human-readable summary from an error body, which is
/// usually JSON shaped like `{"error": {"message": ...}}` but can be a
/// bare string or arbitrary text.
fn summarize_error(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty response>".to_string();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let summary = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .or_else(|| {
                value.get("error").and_then(|v| match v {
                    serde_json::Value::String(s) => Some(s.clone()),
                    _ => None,
                })
            })
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str().map(str::to_owned))
            });
        if let Some(summary) = summary {
            let collapsed = summary.split_whitespace().collect::<Vec<_>>().join(" ");
            if !collapsed.is_empty() {
                return collapsed;
            }
        }
    }

    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A single in-flight streaming request.
pub struct ChatStream {
    response: reqwest::Response,
    parser: SseParser,
    pending: VecDeque<StreamEvent>,
    // Framing error held back until already-decoded events are delivered
    deferred_error: Option<ProviderError>,
    finished: bool,
}

impl ChatStream {
    /// Send the request and return the response sequence. A non-success
    /// status is reported here, before any event is produced.
    pub async fn open(
        client: &reqwest::Client,
        base_url: &str,
        api_key: &str,
        model: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<Self, ProviderError> {
        let request = ChatRequest {
            model: model.to_string(),
            messages,
            stream: true,
        };

        let chat_url = construct_api_url(base_url, "chat/completions");
        let response = client
            .post(chat_url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await
            .map_err(ProviderError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            return Err(ProviderError::Api {
                status,
                message: summarize_error(&body),
            });
        }

        Ok(Self {
            response,
            parser: SseParser::default(),
            pending: VecDeque::new(),
            deferred_error: None,
            finished: false,
        })
    }

    /// Pull the next event, suspending on network I/O as needed. Returns
    /// `Ok(None)` once the terminal [`StreamEvent::Completed`] has been
    /// delivered.
    pub async fn next_event(&mut self) -> Result<Option<StreamEvent>, ProviderError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if matches!(event, StreamEvent::Completed(_)) {
                    self.finished = true;
                }
                return Ok(Some(event));
            }
            if let Some(error) = self.deferred_error.take() {
                self.finished = true;
                return Err(error);
            }
            if self.finished {
                return Ok(None);
            }

            match self.response.chunk().await.map_err(ProviderError::Network)? {
                Some(bytes) => {
                    if let Err(error) = self.parser.feed(&bytes, &mut self.pending) {
                        self.deferred_error = Some(error);
                    }
                }
                None => {
                    self.finished = true;
                    self.parser.finish()?;
                    return Ok(None);
                }
            }
        }
    }
}
