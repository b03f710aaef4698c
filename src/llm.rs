// 🤖 Language Model Client - OpenAI-compatible chat completions (Groq)
//
// Callers depend on the `LlmClient` trait; the HTTP server holds an
// `Arc<dyn LlmClient>` and tests substitute a scripted fake.

use crate::config::LlmConfig;
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

const SERVICE: &str = "Groq";
const TEMPERATURE: f32 = 0.7;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// One-shot completion: a system instruction plus a single user prompt
    async fn complete(&self, system: &str, prompt: &str) -> AppResult<String>;
}

/// Groq chat-completions client
#[derive(Debug, Clone)]
pub struct GroqClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: Client,
}

impl GroqClient {
    pub fn new(config: &LlmConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(GroqClient {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    async fn complete(&self, system: &str, prompt: &str) -> AppResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::config("GROQ_API_KEY is not set"))?;

        debug!(model = %self.model, prompt_len = prompt.len(), "requesting completion");

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "language model request failed");
                AppError::external_service(SERVICE, format!("network error: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = error_message(&text);
            error!(status = %status, error = %message, "language model returned an error");
            return Err(AppError::external_service(
                SERVICE,
                format!("HTTP {}: {}", status.as_u16(), message),
            ));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            AppError::external_service(SERVICE, format!("unreadable response: {}", e))
        })?;

        first_choice(parsed)
    }
}

// ============================================================================
// WIRE FORMAT
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

fn first_choice(response: ChatResponse) -> AppResult<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| AppError::external_service(SERVICE, "response contained no choices"))
}

/// `{"error": {"message": ...}}` when the body has that shape, else the raw body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.message,
        Err(_) if body.trim().is_empty() => "empty error body".to_string(),
        Err(_) => body.trim().to_string(),
    }
}
