//! DeepSeek LLM Provider
//!
//! Implementation of `LlmProvider` for the DeepSeek chat-completions API
//! (OpenAI-compatible wire format).

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    message::{Message, Role},
    provider::{
        Completion, FinishReason, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo,
        TokenUsage,
    },
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";

/// Delay before the first retry; doubles on each further attempt
const BASE_BACKOFF_MS: u64 = 500;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// DeepSeek provider configuration
#[derive(Clone)]
pub struct DeepSeekConfig {
    pub api_key: String,

    /// API root, without the trailing `/chat/completions`
    pub base_url: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Extra attempts after a retryable failure
    pub max_retries: u32,
}

impl std::fmt::Debug for DeepSeekConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeepSeekConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl DeepSeekConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: 120,
            max_retries: 2,
        }
    }

    /// Read `DEEPSEEK_API_KEY` (required) and `DEEPSEEK_BASE_URL`
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("DEEPSEEK_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AgentError::Config("DEEPSEEK_API_KEY not set".into()))?;

        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("DEEPSEEK_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    choices: Vec<ChatChoice>,
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<WireModel>,
}

#[derive(Debug, Deserialize)]
struct WireModel {
    id: String,
    owned_by: Option<String>,
}

// ============================================================================
// Provider
// ============================================================================

/// DeepSeek LLM provider
pub struct DeepSeekProvider {
    client: Client,
    config: DeepSeekConfig,
}

impl DeepSeekProvider {
    pub fn from_config(config: DeepSeekConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(DeepSeekConfig::from_env()?)
    }

    pub const fn config(&self) -> &DeepSeekConfig {
        &self.config
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    /// Convert agent messages to the wire format.
    ///
    /// Tool results are sent as user turns since calls are parsed from text.
    fn convert_messages(messages: &[Message]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: match m.role {
                    Role::System => "system",
                    Role::User | Role::Tool => "user",
                    Role::Assistant => "assistant",
                },
                content: &m.content,
            })
            .collect()
    }

    fn build_request<'a>(messages: &'a [Message], options: &'a GenerationOptions) -> ChatRequest<'a> {
        ChatRequest {
            model: &options.model,
            messages: Self::convert_messages(messages),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            stop: &options.stop_sequences,
            stream: false,
        }
    }

    fn convert_completion(response: ChatResponse, requested_model: &str) -> Result<Completion> {
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AgentError::Parse("No choices in response".into()))?;

        Ok(Completion {
            content: choice.message.content.unwrap_or_default(),
            model: response.model.unwrap_or_else(|| requested_model.to_string()),
            usage: response.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            finish_reason: choice.finish_reason.as_deref().map(FinishReason::from_wire),
        })
    }

    fn status_error(status: StatusCode, body: &str) -> AgentError {
        let detail = format!("HTTP {}: {}", status.as_u16(), body.trim());
        match status.as_u16() {
            401 | 403 => AgentError::Auth(detail),
            429 => AgentError::RateLimited(detail),
            500..=599 => AgentError::ProviderUnavailable(detail),
            _ => AgentError::Provider(detail),
        }
    }

    fn transport_error(err: &reqwest::Error) -> AgentError {
        if err.is_timeout() || err.is_connect() {
            AgentError::ProviderUnavailable(err.to_string())
        } else if err.is_decode() {
            AgentError::Parse(err.to_string())
        } else {
            AgentError::Provider(err.to_string())
        }
    }

    async fn send_chat(&self, request: &ChatRequest<'_>) -> Result<Completion> {
        let response = self
            .client
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, &body));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        Self::convert_completion(body, request.model)
    }
}

/// Wait before retry number `attempt` (1-based), capped at `MAX_BACKOFF`
fn backoff_delay(attempt: u32) -> Duration {
    let factor = 2_u64.checked_pow(attempt.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(BASE_BACKOFF_MS.saturating_mul(factor)).min(MAX_BACKOFF)
}

#[async_trait]
impl LlmProvider for DeepSeekProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();

        Ok(ProviderInfo {
            name: "DeepSeek".into(),
            models,
            supports_tools: false, // tool calls are parsed from text
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("DeepSeek health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<Completion> {
        let request = Self::build_request(messages, options);
        let mut attempt = 0;

        loop {
            match self.send_chat(&request).await {
                Ok(completion) => {
                    if let Some(usage) = &completion.usage {
                        tracing::debug!(
                            model = %completion.model,
                            prompt_tokens = usage.prompt_tokens,
                            completion_tokens = usage.completion_tokens,
                            "Completion received"
                        );
                    }
                    return Ok(completion);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    tracing::warn!(attempt, error = %e, "Retrying DeepSeek request in {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let response = self
            .client
            .get(self.endpoint("models"))
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| Self::transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, &body));
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| AgentError::Parse(e.to_string()))?;

        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                owned_by: m.owned_by,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::State,
        http::HeaderMap,
        response::{IntoResponse, Response},
        routing::{get, post},
    };
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn spawn_mock(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });
        format!("http://{addr}")
    }

    fn provider(base_url: &str) -> DeepSeekProvider {
        DeepSeekProvider::from_config(DeepSeekConfig::new("sk-test").with_base_url(base_url)).unwrap()
    }

    async fn echo_chat(headers: HeaderMap, Json(body): Json<Value>) -> Response {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer sk-test") {
            return (axum::http::StatusCode::UNAUTHORIZED, "bad key").into_response();
        }
        let last = body["messages"].as_array().and_then(|m| m.last()).cloned().unwrap_or_default();
        Json(json!({
            "model": body["model"],
            "choices": [{
                "message": {"role": "assistant", "content": format!("{}: {}", last["role"].as_str().unwrap_or(""), last["content"].as_str().unwrap_or(""))},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        }))
        .into_response()
    }

    #[test]
    fn test_config_defaults() {
        let config = DeepSeekConfig::new("sk-secret");
        assert_eq!(config.base_url, "https://api.deepseek.com");
        assert_eq!(config.max_retries, 2);
        assert!(!format!("{config:?}").contains("sk-secret"));
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            Message::system("You are helpful."),
            Message::user("Hello"),
            Message::tool("[Tool 'multiply' returned]\n42", None),
        ];

        let converted = DeepSeekProvider::convert_messages(&messages);
        let roles: Vec<_> = converted.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "user"]);
    }

    #[test]
    fn test_request_omits_unset_fields() {
        let messages = vec![Message::user("hi")];
        let options = GenerationOptions::default();
        let request = serde_json::to_value(DeepSeekProvider::build_request(&messages, &options)).unwrap();

        assert_eq!(request["model"], "deepseek-chat");
        assert_eq!(request["stream"], false);
        assert!(request.get("max_tokens").is_none());
        assert!(request.get("stop").is_none());
    }

    #[tokio::test]
    async fn test_complete_round_trip() {
        let base = spawn_mock(Router::new().route("/chat/completions", post(echo_chat))).await;

        let completion = provider(&base)
            .complete(&[Message::user("ping")], &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.content, "user: ping");
        assert_eq!(completion.model, "deepseek-chat");
        assert_eq!(completion.finish_reason, Some(FinishReason::Stop));
        assert_eq!(completion.usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn test_bad_key_is_auth_error() {
        let base = spawn_mock(Router::new().route("/chat/completions", post(echo_chat))).await;
        let provider = DeepSeekProvider::from_config(DeepSeekConfig::new("sk-wrong").with_base_url(&base)).unwrap();

        let err = provider
            .complete(&[Message::user("ping")], &GenerationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        async fn flaky(State(hits): State<Arc<AtomicUsize>>, headers: HeaderMap, body: Json<Value>) -> Response {
            if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                return (axum::http::StatusCode::SERVICE_UNAVAILABLE, "busy").into_response();
            }
            echo_chat(headers, body).await
        }

        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route("/chat/completions", post(flaky))
            .with_state(hits.clone());
        let base = spawn_mock(router).await;

        let completion = provider(&base)
            .complete(&[Message::user("again")], &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.content, "user: again");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    async fn spawn_counting(status: axum::http::StatusCode, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                "/chat/completions",
                post(move |State(hits): State<Arc<AtomicUsize>>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    (status, body)
                }),
            )
            .with_state(hits.clone());
        (spawn_mock(router).await, hits)
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_max_retries() {
        let (base, hits) = spawn_counting(axum::http::StatusCode::TOO_MANY_REQUESTS, "slow").await;
        let provider = provider(&base);

        let err = provider
            .complete(&[Message::user("ping")], &GenerationOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::RateLimited(ref msg) if msg.contains("429")));
        let expected = 1 + usize::try_from(provider.config().max_retries).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), expected);
    }

    #[tokio::test]
    async fn test_client_error_is_provider_error_and_not_retried() {
        let (base, hits) = spawn_counting(axum::http::StatusCode::BAD_REQUEST, "bad model").await;

        let err = provider(&base)
            .complete(&[Message::user("ping")], &GenerationOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Provider(ref msg) if msg.contains("bad model")));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_doubles_and_is_capped() {
        assert_eq!(backoff_delay(1), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_millis(1000));
        assert_eq!(backoff_delay(3), Duration::from_millis(2000));
        assert_eq!(backoff_delay(60), MAX_BACKOFF);
        assert_eq!(backoff_delay(u32::MAX), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_list_models_and_health() {
        let router = Router::new().route(
            "/models",
            get(|| async {
                Json(json!({"object": "list", "data": [{"id": "deepseek-chat", "object": "model", "owned_by": "deepseek"}]}))
            }),
        );
        let base = spawn_mock(router).await;
        let provider = provider(&base);

        let models = provider.list_models().await.unwrap();
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "deepseek-chat");
        assert!(provider.health_check().await.unwrap());
    }
}
