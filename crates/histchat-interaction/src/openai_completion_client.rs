//! OpenAiCompletionClient - Direct REST client for OpenAI-compatible chat APIs.
//!
//! Configuration priority for the API key: ~/.config/histchat/secret.json >
//! environment variables (`OPENAI_API_KEY` / `OPENROUTER_API_KEY`).

use async_trait::async_trait;
use histchat_core::completion::{Completion, CompletionRequest, CompletionService, TokenUsage};
use histchat_core::config::{LlmConfig, LlmProvider};
use histchat_core::error::{HistchatError, Result};
use histchat_infrastructure::storage::SecretStorage;
use reqwest::{Client, StatusCode, header::HeaderValue};
use serde::Deserialize;
use std::env;
use std::time::Duration;

const SERVICE: &str = "completion";
const DEFAULT_REFERER: &str = "http://localhost:8000";
const DEFAULT_TITLE: &str = "histchat";

/// Completion service that talks to the OpenAI or OpenRouter HTTP API.
#[derive(Clone)]
pub struct OpenAiCompletionClient {
    client: Client,
    provider: LlmProvider,
    endpoint: String,
    api_key: String,
    referer: String,
    title: String,
}

impl OpenAiCompletionClient {
    /// Creates a client for `provider` rooted at `api_base`.
    ///
    /// `timeout` bounds the whole request, connect included.
    pub fn new(
        provider: LlmProvider,
        api_base: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| HistchatError::config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            provider,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            api_key: api_key.into(),
            referer: DEFAULT_REFERER.to_string(),
            title: DEFAULT_TITLE.to_string(),
        })
    }

    /// Builds a client from config, resolving the key via `SecretStorage`.
    ///
    /// OpenRouter identification headers come from `OPENROUTER_HTTP_REFERER`
    /// and `OPENROUTER_X_TITLE` when set.
    pub fn from_config(config: &LlmConfig, secrets: &SecretStorage) -> Result<Self> {
        let api_key = secrets.resolve_api_key(config.provider)?;
        let mut client = Self::new(config.provider, config.api_base(), api_key, config.timeout())?;

        if let Ok(referer) = env::var("OPENROUTER_HTTP_REFERER") {
            client.referer = referer;
        }
        if let Ok(title) = env::var("OPENROUTER_X_TITLE") {
            client.title = title;
        }
        Ok(client)
    }

    /// Overrides the OpenRouter identification headers.
    pub fn with_identification(
        mut self,
        referer: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        self.referer = referer.into();
        self.title = title.into();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_request(&self, body: &CompletionRequest) -> Result<Completion> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("content-type", "application/json");

        if self.provider == LlmProvider::OpenRouter {
            request = request
                .header("HTTP-Referer", &self.referer)
                .header("X-Title", &self.title);
        }

        let response = request.json(body).send().await.map_err(|err| {
            let retryable = err.is_connect() || err.is_timeout();
            HistchatError::upstream(SERVICE, describe("request failed", &err, retryable))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let retry_after = parse_retry_after(response.headers().get("retry-after"));
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(map_http_error(status, body_text, retry_after));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|err| {
            HistchatError::upstream(SERVICE, format!("Failed to parse response: {err}"))
        })?;

        extract_completion(parsed, &body.model)
    }
}

#[async_trait]
impl CompletionService for OpenAiCompletionClient {
    async fn generate(&self, request: &CompletionRequest) -> Result<Completion> {
        tracing::debug!(
            "Requesting completion from {:?} (model={}, messages={})",
            self.provider,
            request.model,
            request.messages.len()
        );
        self.send_request(request).await
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<TokenUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn extract_completion(response: ChatCompletionResponse, requested_model: &str) -> Result<Completion> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| HistchatError::upstream(SERVICE, "Provider returned no content"))?;

    Ok(Completion {
        text,
        model: response
            .model
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| requested_model.to_string()),
        usage: response.usage.unwrap_or_default(),
    })
}

fn describe(what: &str, err: &dyn std::fmt::Display, retryable: bool) -> String {
    if retryable {
        format!("{what}: {err} (retryable)")
    } else {
        format!("{what}: {err}")
    }
}

fn map_http_error(status: StatusCode, body: String, retry_after: Option<Duration>) -> HistchatError {
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|wrapper| wrapper.error.message)
        .unwrap_or(body);

    let is_retryable = matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    );

    let mut detail = describe(&format!("HTTP {}", status.as_u16()), &message, is_retryable);
    if let Some(delay) = retry_after {
        detail.push_str(&format!(", retry after {}s", delay.as_secs()));
    }
    HistchatError::upstream(SERVICE, detail)
}

fn parse_retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let value = header?.to_str().ok()?;
    // HTTP-date values are ignored
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base() {
        let client = OpenAiCompletionClient::new(
            LlmProvider::OpenRouter,
            "https://openrouter.ai/api/v1/",
            "key",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.endpoint(), "https://openrouter.ai/api/v1/chat/completions");
    }

    #[test]
    fn test_http_error_mapping() {
        let err = map_http_error(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error": {"message": "slow down"}}"#.to_string(),
            Some(Duration::from_secs(7)),
        );
        let HistchatError::UpstreamUnavailable { service, message } = err else {
            panic!("expected upstream error");
        };
        assert_eq!(service, "completion");
        assert_eq!(message, "HTTP 429: slow down (retryable), retry after 7s");

        let err = map_http_error(StatusCode::UNAUTHORIZED, "bad key".to_string(), None);
        assert_eq!(err, HistchatError::upstream("completion", "HTTP 401: bad key"));
    }

    #[test]
    fn test_missing_usage_and_model_fall_back() {
        let response: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": "Hello"}}]}"#).unwrap();
        let completion = extract_completion(response, "gpt-4o-mini").unwrap();
        assert_eq!(completion.text, "Hello");
        assert_eq!(completion.model, "gpt-4o-mini");
        assert_eq!(completion.usage, TokenUsage::default());
    }

    #[test]
    fn test_empty_choices_is_upstream_error() {
        let response: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(extract_completion(response, "m").unwrap_err().is_retryable());
    }
}
