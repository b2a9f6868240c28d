//! OpenAI-compatible chat completions client (Groq, Together, OpenRouter, ...).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ensure_success, ModelClient, ProviderError};
use crate::config::ApiKey;

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 2048;

/// Client for any endpoint speaking `POST {base_url}/chat/completions`.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiCompatClient {
    pub fn new(name: &str, base_url: &str, http: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }
}

#[async_trait]
impl ModelClient for OpenAiCompatClient {
    async fn complete(
        &self,
        api_key: &ApiKey,
        model: &str,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatCompletionRequest {
            model,
            messages: [
                Message {
                    role: "system",
                    content: system_instruction,
                },
                Message {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider: self.name.clone(),
                source: e,
            })?;
        let response = ensure_success(&self.name, response).await?;

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderError::EmptyReply {
                provider: self.name.clone(),
            })
    }
}

// ── Wire types ──

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiCompatClient {
        OpenAiCompatClient::new("groq", &server.uri(), reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer gsk_test"))
            .and(body_partial_json(serde_json::json!({
                "model": "llama-3.3-70b-versatile",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "2+2?"}
                ],
                "max_tokens": 2048
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "4"},
                    "finish_reason": "stop"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server)
            .complete(
                &ApiKey::from("gsk_test"),
                "llama-3.3-70b-versatile",
                "2+2?",
                "be brief",
            )
            .await
            .unwrap();
        assert_eq!(reply, "4");
    }

    #[tokio::test]
    async fn test_complete_429_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"message": "Please try again in 2s.", "type": "tokens"}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(&ApiKey::from("gsk_test"), "m", "hi", "sys")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Status { .. }));
        assert!(err.is_rate_limited(), "{}", err);
    }

    #[tokio::test]
    async fn test_complete_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(&ApiKey::from("gsk_test"), "m", "hi", "sys")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyReply { .. }));
    }

    #[tokio::test]
    async fn test_complete_invalid_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(&ApiKey::from("gsk_test"), "m", "hi", "sys")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Decode { .. }));
        assert!(!err.is_rate_limited());
    }
}
