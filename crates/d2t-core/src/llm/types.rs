//! Wire types for OpenAI-compatible chat completions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::LlmError;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single message in the request conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Request body for `POST …/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    /// Model identifier, e.g. `"deepseek-chat"`.
    pub model: String,
    /// Ordered conversation.
    pub messages: Vec<ChatMessage>,
}

/// The part of a chat-completion response this crate cares about.
///
/// Everything except the first choice's message text is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    pub content: String,
}

impl ChatResponse {
    /// Parse a raw response body, extracting `choices[0].message.content`.
    ///
    /// The raw body is carried in the error so failures can be diagnosed
    /// from the logs.
    pub fn parse(body: &str) -> Result<Self, LlmError> {
        let value: Value = serde_json::from_str(body).map_err(|source| LlmError::InvalidJson {
            source,
            body: body.to_owned(),
        })?;

        tracing::debug!(choices = %value.get("choices").unwrap_or(&serde_json::Value::Null), "chat response");

        value
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(|content| Self { content: content.to_owned() })
            .ok_or_else(|| LlmError::MissingContent { body: body.to_owned() })
    }
}

#[cfg(test)]
mod test {
    use tracing_test::traced_test;

    use super::*;

    #[test]
    fn request_serialises_lowercase_roles() {
        let req = ChatRequest {
            model: "deepseek-chat".into(),
            messages: vec![ChatMessage::system("be terse"), ChatMessage::user("hi")],
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "deepseek-chat");
        assert_eq!(v["messages"][0]["role"], "system");
        assert_eq!(v["messages"][1]["role"], "user");
        assert_eq!(v["messages"][1]["content"], "hi");
    }

    #[test]
    fn parse_extracts_first_choice() {
        let body = r#"{"id":"x","choices":[{"message":{"role":"assistant","content":"SELECT 1"}},{"message":{"content":"other"}}]}"#;
        assert_eq!(ChatResponse::parse(body).unwrap().content, "SELECT 1");
    }

    #[test]
    #[traced_test]
    fn parse_logs_choices_at_debug() {
        let body = r#"{"choices":[{"message":{"content":"SELECT 2"}}]}"#;
        assert_eq!(ChatResponse::parse(body).unwrap().content, "SELECT 2");
        assert!(logs_contain("chat response"));
        assert!(logs_contain("SELECT 2"));
    }

    #[test]
    #[traced_test]
    fn parse_without_choices_logs_null() {
        assert!(ChatResponse::parse(r#"{"id":"x"}"#).is_err());
        assert!(logs_contain("choices=null"));
    }

    #[test]
    fn parse_without_choices_keeps_raw_body() {
        let body = r#"{"error":{"message":"quota"}}"#;
        match ChatResponse::parse(body) {
            Err(LlmError::MissingContent { body: raw }) => assert_eq!(raw, body),
            other => panic!("expected MissingContent, got {other:?}"),
        }
    }

    #[test]
    fn parse_non_string_content_is_missing() {
        let body = r#"{"choices":[{"message":{"content":null}}]}"#;
        assert!(matches!(ChatResponse::parse(body), Err(LlmError::MissingContent { .. })));
    }

    #[test]
    fn parse_rejects_non_json() {
        assert!(matches!(
            ChatResponse::parse("<html>bad gateway</html>"),
            Err(LlmError::InvalidJson { .. })
        ));
    }
}
