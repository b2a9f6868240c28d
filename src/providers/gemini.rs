//! Google Gemini `generateContent` client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ensure_success, ModelClient, ProviderError};
use crate::config::ApiKey;

pub struct GeminiClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(name: &str, base_url: &str, http: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }
}

fn build_prompt(prompt: &str, system_instruction: &str) -> String {
    format!(
        "System Instruction: {}\n\nUser Message: {}",
        system_instruction, prompt
    )
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn complete(
        &self,
        api_key: &ApiKey,
        model: &str,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, ProviderError> {
        // Key goes in a header so it never shows up in URLs or transport errors
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let text = build_prompt(prompt, system_instruction);
        let body = GenerateContentRequest {
            contents: vec![GeminiContent {
                role: "user",
                parts: vec![GeminiPart { text: &text }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider: self.name.clone(),
                source: e,
            })?;
        let response = ensure_success(&self.name, response).await?;

        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::EmptyReply {
                provider: self.name.clone(),
            });
        }
        Ok(text)
    }
}

// ── Gemini wire types ──

#[derive(Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    role: &'a str,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> GeminiClient {
        GeminiClient::new("gemini", &server.uri(), reqwest::Client::new())
    }

    #[tokio::test]
    async fn test_complete_joins_text_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-flash-latest:generateContent"))
            .and(header("x-goog-api-key", "AIza-test"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [{"text": "System Instruction: sys\n\nUser Message: hi"}]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Hello"}, {"text": ", world"}]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = client(&server)
            .complete(&ApiKey::from("AIza-test"), "gemini-flash-latest", "hi", "sys")
            .await
            .unwrap();
        assert_eq!(reply, "Hello, world");
    }

    #[tokio::test]
    async fn test_blocked_prompt_is_empty_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "promptFeedback": {"blockReason": "SAFETY"}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(&ApiKey::from("AIza-test"), "gemini-flash-latest", "hi", "sys")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyReply { .. }));
    }

    #[tokio::test]
    async fn test_resource_exhausted_is_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
                "error": {"code": 429, "message": "Resource has been exhausted (e.g. check quota).", "status": "RESOURCE_EXHAUSTED"}
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(&ApiKey::from("AIza-test"), "gemini-flash-latest", "hi", "sys")
            .await
            .unwrap_err();
        assert!(err.is_rate_limited());
    }
}
