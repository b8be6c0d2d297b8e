use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{AppError, Result};

const OPENROUTER_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// A single text-generation call.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String>;
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Clone)]
pub struct OpenRouterClient {
    client: Client,
    api_key: String,
    model: String,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionClient for OpenRouterClient {
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".into(),
                content: prompt.into(),
            }],
            temperature,
        };

        info!(model = %self.model, prompt_chars = prompt.chars().count(), "calling completion API");
        let llm_start = std::time::Instant::now();

        let res = self
            .client
            .post(OPENROUTER_URL)
            .bearer_auth(&self.api_key)
            .header("X-Title", "Job Applications Tracker")
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LlmError(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let json: serde_json::Value = res
            .json()
            .await
            .map_err(|e| AppError::LlmError(e.to_string()))?;

        let reply = reply_text(&json)?;
        debug!(reply = %reply, "completion reply");
        info!(
            elapsed_ms = llm_start.elapsed().as_millis() as u64,
            "completion API call finished"
        );
        Ok(reply)
    }
}

// Error bodies are JSON from the API itself but HTML or plain text from gateways.
fn api_error(status: u16, body: &str) -> AppError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| {
            let text = body.trim();
            if text.is_empty() {
                "unknown error".to_string()
            } else {
                text.chars().take(200).collect()
            }
        });
    AppError::LlmError(format!("API error (status {}): {}", status, message))
}

fn reply_text(json: &serde_json::Value) -> Result<String> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::LlmError("Invalid response format from LLM".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_reply_text() {
        let body = json!({
            "choices": [{ "message": { "role": "assistant", "content": "Company Name: Acme" } }]
        });
        assert_eq!(reply_text(&body).unwrap(), "Company Name: Acme");
    }

    #[test]
    fn test_reply_text_missing_content() {
        let body = json!({ "choices": [] });
        assert!(matches!(reply_text(&body), Err(AppError::LlmError(_))));
    }

    #[test]
    fn test_api_error_from_json_body() {
        let err = api_error(429, r#"{"error": {"message": "Rate limit exceeded"}}"#);
        assert_eq!(
            err.to_string(),
            "LLM processing error: API error (status 429): Rate limit exceeded"
        );
    }

    #[test]
    fn test_api_error_keeps_status_for_html_body() {
        let err = api_error(502, "<html><body>Bad Gateway</body></html>");
        let message = err.to_string();
        assert!(message.contains("status 502"));
        assert!(message.contains("Bad Gateway"));

        let err = api_error(503, "");
        assert!(err.to_string().ends_with("(status 503): unknown error"));
    }

    #[test]
    fn test_request_carries_temperature() {
        let body = ChatRequest {
            model: "m".into(),
            messages: vec![],
            temperature: 0.2,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert!((value["temperature"].as_f64().unwrap() - 0.2).abs() < 1e-6);
    }
}
