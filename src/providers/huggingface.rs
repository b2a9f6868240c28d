//! Hugging Face Inference API text-generation client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ensure_success, ModelClient, ProviderError};
use crate::config::ApiKey;

const TEMPERATURE: f32 = 0.7;
const MAX_NEW_TOKENS: u32 = 2048;

/// Client for `POST {base_url}/{model}` text generation.
pub struct HuggingFaceClient {
    name: String,
    base_url: String,
    http: reqwest::Client,
}

impl HuggingFaceClient {
    pub fn new(name: &str, base_url: &str, http: reqwest::Client) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }
}

/// Text-generation endpoints take one flat prompt, so the instruction is inlined.
fn build_prompt(prompt: &str, system_instruction: &str) -> String {
    format!("{}\n\nUser: {}\nAssistant:", system_instruction, prompt)
}

#[async_trait]
impl ModelClient for HuggingFaceClient {
    async fn complete(
        &self,
        api_key: &ApiKey,
        model: &str,
        prompt: &str,
        system_instruction: &str,
    ) -> Result<String, ProviderError> {
        let url = format!("{}/{}", self.base_url, model);
        let inputs = build_prompt(prompt, system_instruction);
        let body = GenerationRequest {
            inputs: &inputs,
            parameters: GenerationParameters {
                max_new_tokens: MAX_NEW_TOKENS,
                temperature: TEMPERATURE,
                return_full_text: false,
            },
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

        let generations: Vec<Generation> =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: self.name.clone(),
                message: e.to_string(),
            })?;

        generations
            .into_iter()
            .next()
            .map(|g| g.generated_text)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| ProviderError::EmptyReply {
                provider: self.name.clone(),
            })
    }
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    inputs: &'a str,
    parameters: GenerationParameters,
}

#[derive(Serialize)]
struct GenerationParameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Deserialize)]
struct Generation {
    generated_text: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "meta-llama/Meta-Llama-3-70B-Instruct";

    #[test]
    fn test_build_prompt() {
        assert_eq!(
            build_prompt("Fix this", "You fix grammar."),
            "You fix grammar.\n\nUser: Fix this\nAssistant:"
        );
    }

    #[tokio::test]
    async fn test_complete_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("/{}", MODEL)))
            .and(header("authorization", "Bearer hf_test"))
            .and(body_partial_json(serde_json::json!({
                "inputs": "sys\n\nUser: hello\nAssistant:",
                "parameters": {"max_new_tokens": 2048, "return_full_text": false}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {"generated_text": " Hi there! "}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = HuggingFaceClient::new("huggingface", &server.uri(), reqwest::Client::new());
        let reply = client
            .complete(&ApiKey::from("hf_test"), MODEL, "hello", "sys")
            .await
            .unwrap();
        assert_eq!(reply, " Hi there! ");
    }

    #[tokio::test]
    async fn test_model_loading_is_not_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": "Model is currently loading",
                "estimated_time": 20.0
            })))
            .mount(&server)
            .await;

        let client = HuggingFaceClient::new("huggingface", &server.uri(), reqwest::Client::new());
        let err = client
            .complete(&ApiKey::from("hf_test"), MODEL, "hello", "sys")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(!err.is_rate_limited());
    }

    #[tokio::test]
    async fn test_empty_generation_list() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = HuggingFaceClient::new("huggingface", &server.uri(), reqwest::Client::new());
        let err = client
            .complete(&ApiKey::from("hf_test"), MODEL, "hello", "sys")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyReply { .. }));
    }
}
