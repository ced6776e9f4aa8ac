//! OpenRouter chat-completion client
//!
//! Blocking and SSE-streaming completions plus model listing. The client
//! applies the configured per-call timeout and maps HTTP failures onto the
//! retryable/fatal taxonomy; it never retries internally, because retrying
//! a completion has user-visible latency and cost that belong to the
//! caller's policy.

use futures_util::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::chat::ChatMessage;
use crate::config::OpenRouterConfig;
use crate::errors::{ApiErrorKind, BotError, Result};
use crate::rag::embedding::{status_error_kind, transport_error_kind};

/// HTTP client for the OpenRouter API
pub struct OpenRouterClient {
    client: Client,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

/// One parsed server-sent event line
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseEvent {
    Token(String),
    Done,
}

impl OpenRouterClient {
    /// Build a client from configuration. Auth and the optional
    /// attribution headers are fixed at construction.
    pub fn new(config: &OpenRouterConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let bearer = format!("Bearer {}", config.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&bearer)
                .map_err(|_| BotError::Config("API key contains invalid characters".to_string()))?,
        );
        if let Some(referer) = &config.referer {
            if let Ok(value) = HeaderValue::from_str(referer) {
                headers.insert("HTTP-Referer", value);
            }
        }
        if let Some(title) = &config.title {
            if let Ok(value) = HeaderValue::from_str(title) {
                headers.insert("X-Title", value);
            }
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Request one completion for an ordered message list and return the
    /// assistant text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        if messages.is_empty() {
            return Err(BotError::Completion {
                kind: ApiErrorKind::Other,
                message: "message list must not be empty".to_string(),
            });
        }

        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        tracing::info!(model = %self.model, message_count = messages.len(), "querying completion API");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BotError::Completion {
                kind: transport_error_kind(&e),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .map(|v| v.to_string());
            let body = response.text().await.unwrap_or_default();
            let mut message = format!("HTTP {}: {}", status, body);
            if let Some(after) = retry_after {
                message = format!("{} (retry after {}s)", message, after);
            }
            return Err(BotError::Completion {
                kind: status_error_kind(status),
                message,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| BotError::Completion {
            kind: ApiErrorKind::Other,
            message: format!("unparseable response: {}", e),
        })?;

        if let Some(usage) = &parsed.usage {
            tracing::info!(model = %self.model, total_tokens = usage.total_tokens, "completion succeeded");
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(BotError::Completion {
                kind: ApiErrorKind::Other,
                message: "response contained no choices or empty content".to_string(),
            });
        }
        Ok(content)
    }

    /// Stream a completion as content deltas. Malformed SSE lines are
    /// skipped; `data: [DONE]` ends the event flow.
    pub async fn stream_completion(
        &self,
        messages: &[ChatMessage],
    ) -> Result<impl Stream<Item = Result<String>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BotError::Completion {
                kind: transport_error_kind(&e),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::Completion {
                kind: status_error_kind(status),
                message: format!("HTTP {}: {}", status, body),
            });
        }

        // SSE events may split across byte chunks; buffer up to each
        // newline and parse complete lines only.
        let stream = response
            .bytes_stream()
            .scan(String::new(), |buffer, chunk| {
                let tokens: Vec<Result<String>> = match chunk {
                    Ok(bytes) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                        let mut out = Vec::new();
                        while let Some(pos) = buffer.find('\n') {
                            let line: String = buffer.drain(..=pos).collect();
                            match parse_sse_line(line.trim()) {
                                Some(SseEvent::Token(token)) => out.push(Ok(token)),
                                Some(SseEvent::Done) | None => {}
                            }
                        }
                        out
                    }
                    Err(e) => vec![Err(BotError::Completion {
                        kind: transport_error_kind(&e),
                        message: e.to_string(),
                    })],
                };
                futures_util::future::ready(Some(futures_util::stream::iter(tokens)))
            })
            .flatten();

        Ok(stream)
    }

    /// List model identifiers available on OpenRouter.
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BotError::Completion {
                kind: transport_error_kind(&e),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Completion {
                kind: status_error_kind(status),
                message: format!("HTTP {}", status),
            });
        }

        let parsed: ModelsResponse = response.json().await.map_err(|e| BotError::Completion {
            kind: ApiErrorKind::Other,
            message: format!("unparseable model list: {}", e),
        })?;

        Ok(parsed.data.into_iter().map(|m| m.id).collect())
    }
}

/// Parse one SSE line into an event. Non-data lines and undecodable JSON
/// payloads yield `None`.
pub(crate) fn parse_sse_line(line: &str) -> Option<SseEvent> {
    let payload = line.strip_prefix("data: ")?.trim();
    if payload == "[DONE]" {
        return Some(SseEvent::Done);
    }
    let value: serde_json::Value = serde_json::from_str(payload).ok()?;
    let content = value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()?;
    if content.is_empty() {
        return None;
    }
    Some(SseEvent::Token(content.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;

    fn test_config() -> OpenRouterConfig {
        OpenRouterConfig {
            api_key: "sk-test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_client_creation() {
        let client = OpenRouterClient::new(&test_config()).unwrap();
        assert_eq!(client.model(), "openai/gpt-4o-mini");
        assert_eq!(client.base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![ChatMessage::system("prompt"), ChatMessage::user("question")];
        let request = ChatRequest {
            model: "openrouter/auto",
            messages: &messages,
            max_tokens: 512,
            temperature: 0.5,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "openrouter/auto");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "question");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_response_parsing() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "42"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 1, "total_tokens": 11}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.role, Role::Assistant);
        assert_eq!(parsed.choices[0].message.content, "42");
        assert_eq!(parsed.usage.unwrap().total_tokens, 11);
    }

    #[test]
    fn test_parse_sse_token_line() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(parse_sse_line(line), Some(SseEvent::Token("Hel".to_string())));
    }

    #[test]
    fn test_parse_sse_done_line() {
        assert_eq!(parse_sse_line("data: [DONE]"), Some(SseEvent::Done));
    }

    #[test]
    fn test_parse_sse_ignores_noise() {
        assert_eq!(parse_sse_line(""), None);
        assert_eq!(parse_sse_line(": keep-alive"), None);
        assert_eq!(parse_sse_line("data: {not json"), None);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{}}]}"#),
            None
        );
    }
}
