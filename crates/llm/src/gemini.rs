use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use novacite_core::{Prompt, TextGenerator};
use novacite_retrieval::EmbeddingModel;
use reqwest::Client;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::retry::{is_retryable_status, RetryPolicy};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("request to text-generation service failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("text-generation service returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("text-generation service returned no text")]
    EmptyResponse,
    #[error("unexpected response shape: {0}")]
    Decode(String),
}

/// Shared HTTP handle for the Gemini `generateContent` and `embedContent` endpoints.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        retry: RetryPolicy,
    ) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(Duration::from_secs(30))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            retry,
        })
    }

    pub fn chat(&self, model: impl Into<String>, temperature: f32) -> GeminiChat {
        GeminiChat {
            client: self.clone(),
            model: model.into(),
            temperature,
        }
    }

    pub fn embedder(&self, model: impl Into<String>) -> GeminiEmbedder {
        GeminiEmbedder {
            client: self.clone(),
            model: model.into(),
        }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/v1beta/{}:{}", self.base_url, model_path(model), method)
    }

    async fn post_json(&self, url: &str, payload: &Value) -> Result<Value, LlmError> {
        let mut attempt = 0usize;
        loop {
            let sent = self
                .http
                .post(url)
                .header("x-goog-api-key", &self.api_key)
                .json(payload)
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(err) if self.retry.should_retry(attempt) => {
                    warn!(attempt, error = %err, "gemini request failed, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.retry.interval).await;
                    continue;
                }
                Err(err) => return Err(LlmError::Http(err)),
            };

            let status = response.status().as_u16();
            if response.status().is_success() {
                return Ok(response.json::<Value>().await?);
            }

            if is_retryable_status(status) && self.retry.should_retry(attempt) {
                warn!(attempt, status, "gemini returned retryable status");
                attempt += 1;
                tokio::time::sleep(self.retry.interval).await;
                continue;
            }

            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }
    }
}

fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{model}")
    }
}

/// One chat model at a fixed sampling temperature.
#[derive(Clone)]
pub struct GeminiChat {
    client: GeminiClient,
    model: String,
    temperature: f32,
}

#[async_trait]
impl TextGenerator for GeminiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let mut payload = json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt.user } ] }
            ],
            "generationConfig": { "temperature": self.temperature }
        });
        if let (Some(system), Some(obj)) = (prompt.system.as_ref(), payload.as_object_mut()) {
            obj.insert(
                "systemInstruction".to_string(),
                json!({ "parts": [ { "text": system } ] }),
            );
        }

        let url = self.client.endpoint(&self.model, "generateContent");
        let body = self.client.post_json(&url, &payload).await?;
        let text = extract_candidate_text(&body).ok_or(LlmError::EmptyResponse)?;
        debug!(model = %self.model, chars = text.len(), "gemini generation complete");
        Ok(text)
    }
}

fn extract_candidate_text(body: &Value) -> Option<String> {
    let parts = body
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;

    let text = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect::<String>();

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[derive(Clone)]
pub struct GeminiEmbedder {
    client: GeminiClient,
    model: String,
}

#[async_trait]
impl EmbeddingModel for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let payload = json!({
            "model": model_path(&self.model),
            "content": { "parts": [ { "text": text } ] }
        });

        let url = self.client.endpoint(&self.model, "embedContent");
        let body = self.client.post_json(&url, &payload).await?;
        let values = body
            .get("embedding")
            .and_then(|embedding| embedding.get("values"))
            .and_then(Value::as_array)
            .ok_or_else(|| LlmError::Decode("missing embedding.values".to_string()))?;

        let vector = values
            .iter()
            .map(|value| value.as_f64().map(|v| v as f32))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| LlmError::Decode("non-numeric embedding value".to_string()))?;

        if vector.is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

    fn candidate(text: &str) -> Value {
        json!({ "candidates": [ { "content": { "parts": [ { "text": text } ] } } ] })
    }

    fn client(server: &MockServer, retry: RetryPolicy) -> GeminiClient {
        GeminiClient::new(server.uri(), "test-key", retry).unwrap()
    }

    #[tokio::test]
    async fn sends_system_instruction_and_temperature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_partial_json(json!({
                "systemInstruction": { "parts": [ { "text": "persona" } ] },
                "contents": [ { "role": "user", "parts": [ { "text": "Who are you?" } ] } ],
                "generationConfig": { "temperature": 0.5 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("I am NovaCite.")))
            .expect(1)
            .mount(&server)
            .await;

        let chat = client(&server, RetryPolicy::none()).chat("gemini-2.0-flash", 0.5);
        let reply = chat
            .generate(&Prompt::with_system("persona", "Who are you?"))
            .await
            .unwrap();
        assert_eq!(reply, "I am NovaCite.");
    }

    #[tokio::test]
    async fn retries_unavailable_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("identity")))
            .mount(&server)
            .await;

        let chat = client(&server, RetryPolicy::fixed(2, Duration::from_millis(1)))
            .chat("gemini-2.0-flash", 0.0);
        assert_eq!(chat.generate(&Prompt::user("q")).await.unwrap(), "identity");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let chat = client(&server, RetryPolicy::fixed(3, Duration::from_millis(1)))
            .chat("gemini-2.0-flash", 0.0);
        let err = chat.generate(&Prompt::user("q")).await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn empty_candidates_are_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GENERATE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
            .mount(&server)
            .await;

        let chat = client(&server, RetryPolicy::none()).chat("gemini-2.0-flash", 0.0);
        assert!(chat.generate(&Prompt::user("q")).await.is_err());
    }

    #[tokio::test]
    async fn embeds_with_prefixed_model_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/embedding-001:embedContent"))
            .and(body_partial_json(json!({ "model": "models/embedding-001" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "embedding": { "values": [0.25, -0.5, 1.0] } })),
            )
            .mount(&server)
            .await;

        let embedder = client(&server, RetryPolicy::none()).embedder("models/embedding-001");
        assert_eq!(embedder.embed("physics hod").await.unwrap(), vec![0.25, -0.5, 1.0]);
    }
}
