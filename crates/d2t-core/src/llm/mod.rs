//! Chat-completion client used to turn questions into SQL and to explain SQL.
//!
//! [`LlmClient`] is the seam the pipeline talks to; [`ChatClient`] is the
//! HTTPS implementation for OpenAI-compatible `chat/completions` endpoints.

mod client;
mod prompt;
mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{ChatClient, DEFAULT_TIMEOUT};
pub use prompt::{build_messages, ModeKind, PromptMode};
pub use types::{ChatMessage, ChatRequest, ChatResponse, Role};

/// Errors produced while building, sending or decoding a chat request.
#[derive(Debug, Error)]
pub enum LlmError {
    /// A mode name outside `nl2sql`, `nl2sql_with_schema` and `analyze`.
    #[error("unknown mode: {0}")]
    UnknownMode(String),

    /// Schema-augmented mode was requested with an empty schema.
    #[error("schema is required for nl2sql_with_schema mode")]
    MissingSchema,

    /// Transport-level failure, including timeouts.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a non-2xx status.
    #[error("API request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not JSON.
    #[error("failed to parse response: {source}; body: {body}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
        body: String,
    },

    /// `choices[0].message.content` was absent or not a string.
    #[error("could not extract content from response: {body}")]
    MissingContent { body: String },
}

/// Anything that can answer a single-turn chat request in one of the
/// [`PromptMode`]s.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send `input` in the given mode and return the first choice's text.
    async fn complete(&self, input: &str, mode: PromptMode<'_>) -> Result<String, LlmError>;
}
