//! LLM client: every model call goes through here.
//!
//! No other module may call the model API directly.
//! Speaks the OpenAI-compatible chat completions protocol in JSON-object mode.

use std::time::Duration;

use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, warn};

pub mod prompts;

const TEMPERATURE: f32 = 0.1;
const MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model call timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {source}")]
    Parse {
        source: serde_json::Error,
        raw: String,
    },

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Outcome of one failed attempt: whether another attempt may help.
enum Retry {
    Transient(LlmError),
    Fatal(LlmError),
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl LlmResponse {
    /// Text content of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Wraps the chat completions API with bounded retry and JSON output helpers.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    model: String,
    endpoint: String,
    timeout: Duration,
    retry_base_delay: Duration,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: &str, timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            model,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            timeout,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
        }
    }

    #[cfg(test)]
    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Makes a raw call to the model, returning the full response object.
    /// Retries on 429, 5xx and connection failures with exponential backoff.
    /// A timed-out call is reported immediately and never retried.
    pub async fn call(&self, prompt: &str, system: &str) -> Result<LlmResponse, LlmError> {
        let request_body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let error = match self.send_once(&request_body).await {
                Ok(response) => return Ok(response),
                Err(Retry::Fatal(e)) => return Err(e),
                Err(Retry::Transient(e)) => e,
            };
            if attempt >= MAX_RETRIES {
                warn!("LLM call failed after {attempt} attempts: {error}");
                return Err(error);
            }

            let delay = self.retry_base_delay * (1 << (attempt - 1));
            warn!(
                "LLM call attempt {} failed ({}), retrying after {}ms...",
                attempt,
                error,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn send_once(&self, request_body: &ChatRequest<'_>) -> Result<LlmResponse, Retry> {
        let response = match self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request_body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(Retry::Fatal(LlmError::Timeout(self.timeout))),
            Err(e) => return Err(Retry::Transient(LlmError::Http(e))),
        };

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("LLM API returned {}: {}", status, body);
            return Err(Retry::Transient(LlmError::Api {
                status: status.as_u16(),
                message: body,
            }));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Retry::Fatal(LlmError::Api {
                status: status.as_u16(),
                message,
            }));
        }

        let llm_response: LlmResponse = response.json().await.map_err(|e| {
            Retry::Fatal(if e.is_timeout() {
                LlmError::Timeout(self.timeout)
            } else {
                LlmError::Http(e)
            })
        })?;

        if let Some(usage) = &llm_response.usage {
            debug!(
                "LLM call succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(llm_response)
    }

    /// Calls the model and deserializes its text reply as JSON.
    /// The raw reply is logged and kept on the error when it does not parse.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        prompt: &str,
        system: &str,
    ) -> Result<T, LlmError> {
        let response = self.call(prompt, system).await?;

        let text = response.text().ok_or(LlmError::EmptyContent)?;
        let text = strip_json_fences(text);

        serde_json::from_str(text).map_err(|source| {
            error!("Unparseable model reply: {text}");
            LlmError::Parse {
                source,
                raw: text.to_string(),
            }
        })
    }
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Client pointed at a mock server with no backoff delay.
#[cfg(test)]
pub fn test_client(base_url: &str) -> LlmClient {
    LlmClient::new(
        "test-key".to_string(),
        "test-model".to_string(),
        base_url,
        Duration::from_secs(5),
    )
    .with_retry_base_delay(Duration::ZERO)
}

/// A chat completions response body whose message content is `content`.
#[cfg(test)]
pub fn completion_body(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{"message": {"role": "assistant", "content": content}}],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5}
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n{\"key\": \"value\"}\n```";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "{\"key\": \"value\"}";
        assert_eq!(strip_json_fences(input), "{\"key\": \"value\"}");
    }

    #[tokio::test]
    async fn test_call_json_sends_bearer_and_parses_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion_body(r#"{"a": "b"}"#)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let value: serde_json::Value = client.call_json("prompt", "system").await.unwrap();
        assert_eq!(value["a"], "b");
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("{}")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let value: serde_json::Value = client.call_json("p", "s").await.unwrap();
        assert!(value.as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(serde_json::json!({"error": {"message": "bad key"}})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.call("p", "s").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 401, ref message } if message == "bad key"));
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_gives_up() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .expect(u64::from(MAX_RETRIES))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.call("p", "s").await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 429, .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(completion_body("{}"))
                    .set_delay(Duration::from_secs(2)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = LlmClient::new(
            "test-key".to_string(),
            "test-model".to_string(),
            &server.uri(),
            Duration::from_millis(200),
        )
        .with_retry_base_delay(Duration::ZERO);
        let err = client.call("p", "s").await.unwrap_err();
        assert!(matches!(err, LlmError::Timeout(d) if d == Duration::from_millis(200)));
    }

    #[tokio::test]
    async fn test_unparseable_reply_keeps_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("not json")))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .call_json::<serde_json::Value>("p", "s")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse { ref raw, .. } if raw == "not json"));
    }
}
