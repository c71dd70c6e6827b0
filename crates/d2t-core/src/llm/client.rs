use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::{debug, info};

use super::prompt::{build_messages, PromptMode};
use super::types::{ChatRequest, ChatResponse};
use super::{LlmClient, LlmError};

/// Request timeout used when the caller does not configure one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// HTTPS client for an OpenAI-compatible chat-completion endpoint.
///
/// One underlying [`reqwest::Client`] is built up front and reused, so the
/// timeout is fixed for the lifetime of the value.
#[derive(Clone)]
pub struct ChatClient {
    endpoint: String,
    model: String,
    api_key: String,
    timeout: Duration,
    http: Client,
}

impl fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    /// `endpoint` is the full `…/chat/completions` URL.
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, LlmError> {
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);
        let http = Client::builder()
            .user_agent(concat!("d2t/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
            http,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl LlmClient for ChatClient {
    async fn complete(&self, input: &str, mode: PromptMode<'_>) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: build_messages(input, mode)?,
        };

        debug!(
            mode = %mode.kind(),
            payload = %serde_json::to_string(&request).unwrap_or_default(),
            "chat request payload"
        );
        info!(mode = %mode.kind(), timeout_secs = self.timeout.as_secs(), "sending chat request");

        let resp = self
            .http
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(LlmError::Status { status: status.as_u16(), body });
        }

        Ok(ChatResponse::parse(&body)?.content)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    /// Bind a throw-away chat endpoint on an ephemeral port and return its URL.
    async fn spawn_stub(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/chat/completions")
    }

    /// Echoes what it received back through `choices[0].message.content`.
    async fn echo(headers: HeaderMap, Json(req): Json<Value>) -> Json<Value> {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();
        let roles: Vec<&str> = req["messages"]
            .as_array()
            .map(|m| m.iter().filter_map(|m| m["role"].as_str()).collect())
            .unwrap_or_default();
        let content = format!("{}|{}|{}", auth, req["model"].as_str().unwrap_or(""), roles.join(","));
        Json(json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }))
    }

    fn client(url: String) -> ChatClient {
        ChatClient::new(url, "deepseek-chat", "sk-test", Some(Duration::from_secs(5))).unwrap()
    }

    #[tokio::test]
    async fn sends_bearer_token_model_and_messages() {
        let url = spawn_stub(Router::new().route("/chat/completions", post(echo))).await;
        let out = client(url)
            .complete("list customers", PromptMode::WithSchema("Customers(cust_id)"))
            .await
            .unwrap();
        assert_eq!(out, "Bearer sk-test|deepseek-chat|system,user");
    }

    #[tokio::test]
    async fn non_success_status_carries_code_and_body() {
        let url = spawn_stub(Router::new().route(
            "/chat/completions",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid api key") }),
        ))
        .await;
        match client(url).complete("SELECT 1", PromptMode::Analyze).await {
            Err(LlmError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_content_is_reported_with_body() {
        let url = spawn_stub(Router::new().route(
            "/chat/completions",
            post(|| async { Json(json!({ "choices": [] })) }),
        ))
        .await;
        match client(url).complete("q", PromptMode::Basic).await {
            Err(LlmError::MissingContent { body }) => assert!(body.contains("choices")),
            other => panic!("expected MissingContent, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_schema_fails_before_any_request() {
        // Nothing listens on this port; reaching the network would yield Http.
        let c = client("http://127.0.0.1:9/chat/completions".into());
        assert!(matches!(
            c.complete("q", PromptMode::WithSchema("")).await,
            Err(LlmError::MissingSchema)
        ));
    }

    #[test]
    fn default_timeout_applies_when_unset() {
        let c = ChatClient::new("http://localhost", "m", "k", None).unwrap();
        assert_eq!(c.timeout(), DEFAULT_TIMEOUT);
        assert!(!format!("{c:?}").contains("\"k\""));
    }
}
