use tracing::{info, warn};

use crate::error::Result;
use crate::llm::CompletionClient;

/// Only the head of a posting is sent to the model.
pub const MAX_PAGE_CHARS: usize = 4000;

pub const EXTRACTION_TEMPERATURE: f32 = 0.2;

pub fn build_prompt(page_text: &str) -> String {
    let content: String = page_text.chars().take(MAX_PAGE_CHARS).collect();

    let mut result = String::with_capacity(content.len() + 300);
    result.push_str(
        "Extract the following fields from this job listing:\n\
         - Company Name\n\
         - Job Title\n\n\
         Answer with exactly one line per field in the form \"Field: value\". \
         If a field cannot be determined, answer \"Not found\" for it.\n\n\
         Job listing:\n",
    );
    result.push_str(&content);
    result
}

/// Asks the completion collaborator for the company and title lines.
pub async fn extract(page_text: &str, completion: &dyn CompletionClient) -> Result<String> {
    let prompt = build_prompt(page_text);
    info!(prompt_chars = prompt.chars().count(), "extracting listing fields");

    completion
        .complete(&prompt, EXTRACTION_TEMPERATURE)
        .await
        .inspect_err(|e| warn!(error = %e, "field extraction failed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Recording {
        prompts: Mutex<Vec<(String, f32)>>,
        reply: std::result::Result<String, String>,
    }

    #[async_trait]
    impl CompletionClient for Recording {
        async fn complete(&self, prompt: &str, temperature: f32) -> Result<String> {
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), temperature));
            self.reply.clone().map_err(AppError::LlmError)
        }
    }

    #[test]
    fn test_prompt_truncates_to_limit() {
        let page = "x".repeat(MAX_PAGE_CHARS + 500);
        let prompt = build_prompt(&page);
        let embedded = prompt.split("Job listing:\n").nth(1).unwrap();
        assert_eq!(embedded.chars().count(), MAX_PAGE_CHARS);
        assert!(embedded.chars().all(|c| c == 'x'));
        assert!(prompt.contains("Company Name"));
        assert!(prompt.contains("Job Title"));
        assert!(prompt.contains("Not found"));
    }

    #[test]
    fn test_prompt_truncates_on_char_boundary() {
        let page = "é".repeat(MAX_PAGE_CHARS + 1);
        let prompt = build_prompt(&page);
        assert_eq!(prompt.matches('é').count(), MAX_PAGE_CHARS);
    }

    #[tokio::test]
    async fn test_extract_uses_low_temperature() {
        let client = Recording {
            prompts: Mutex::new(Vec::new()),
            reply: Ok("Company Name: Acme\nJob Title: Engineer".to_string()),
        };

        let reply = extract("Acme is hiring an Engineer", &client).await.unwrap();
        assert_eq!(reply, "Company Name: Acme\nJob Title: Engineer");

        let prompts = client.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].0.ends_with("Acme is hiring an Engineer"));
        assert_eq!(prompts[0].1, EXTRACTION_TEMPERATURE);
    }

    #[tokio::test]
    async fn test_extract_failure_is_an_error() {
        let client = Recording {
            prompts: Mutex::new(Vec::new()),
            reply: Err("quota exceeded".to_string()),
        };

        let result = extract("page", &client).await;
        assert!(matches!(result, Err(AppError::LlmError(msg)) if msg == "quota exceeded"));
    }
}
