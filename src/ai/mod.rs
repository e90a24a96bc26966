//! AI module for query-plan generation.
//!
//! Uses the Anthropic Claude API to translate a natural-language
//! question about a loaded spreadsheet into a structured query plan.
//! The response is schema-validated before it is ever interpreted;
//! generated text is never executed.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sheetsift::ai::AiClient;
//! use sheetsift::sheet::load_bytes;
//!
//! let sheet = load_bytes(&bytes, None)?;
//! let client = AiClient::from_env()?;
//! let generated = client.generate_plan(&sheet, "carbon above 0.06").await?;
//! println!("{}", generated.plan.to_json()?);
//! ```

pub mod prompt;

use serde::Deserialize;
use std::env;

use crate::error::{AiError, AiResult};
use crate::query::QueryPlan;
use crate::sheet::LoadedSheet;
use crate::validation::validate_plan;

pub use prompt::{system_prompt, user_prompt};

/// Anthropic API client.
#[derive(Clone)]
pub struct AiClient {
    api_key: String,
    model: String,
    max_tokens: u32,
}

/// A generated plan plus the context it was generated from, kept for
/// user-facing diagnosis.
#[derive(Debug, Clone)]
pub struct GeneratedPlan {
    /// The validated query plan.
    pub plan: QueryPlan,
    /// The user prompt that was sent.
    pub prompt: String,
    /// The raw model response text.
    pub raw_response: String,
}

/// Anthropic API response structure.
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Anthropic API error response.
#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Default number of retries.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds.
const RETRY_DELAY_MS: u64 = 1000;

impl AiClient {
    /// Create a new client with an explicit API key.
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            model: "claude-sonnet-4-20250514".to_string(),
            max_tokens: 1024,
        }
    }

    /// Create a client from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> AiResult<Self> {
        // Try loading .env file
        let _ = dotenvy::dotenv();

        let api_key = env::var("ANTHROPIC_API_KEY")
            .map_err(|_| AiError::MissingApiKey("ANTHROPIC_API_KEY not set".to_string()))?;

        Ok(Self::new(api_key))
    }

    /// Set the model to use.
    pub fn with_model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Set max tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Generate a query plan for a question about a loaded sheet
    /// (with retries).
    pub async fn generate_plan(
        &self,
        sheet: &LoadedSheet,
        question: &str,
    ) -> AiResult<GeneratedPlan> {
        let user = prompt::user_prompt(&sheet.columns, &sheet.analysis, question);
        let mut last_error = None;

        for attempt in 1..=DEFAULT_MAX_RETRIES {
            match self.try_generate_plan(sheet, question).await {
                Ok(response) => match parse_plan_from_response(&response) {
                    Ok(plan) => {
                        return Ok(GeneratedPlan {
                            plan,
                            prompt: user,
                            raw_response: response,
                        })
                    }
                    Err(e) => {
                        eprintln!(
                            "   Attempt {}/{} failed: {}",
                            attempt, DEFAULT_MAX_RETRIES, e
                        );
                        last_error = Some(e);
                    }
                },
                Err(e) => {
                    eprintln!(
                        "   Attempt {}/{} failed: {}",
                        attempt, DEFAULT_MAX_RETRIES, e
                    );
                    last_error = Some(e);
                }
            }

            if attempt < DEFAULT_MAX_RETRIES {
                eprintln!("   Retrying in {}ms...", RETRY_DELAY_MS);
                tokio::time::sleep(tokio::time::Duration::from_millis(RETRY_DELAY_MS)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| AiError::ApiError("Unknown error".to_string())))
    }

    /// Single attempt: call the API and return the raw response text.
    async fn try_generate_plan(&self, sheet: &LoadedSheet, question: &str) -> AiResult<String> {
        let client = reqwest::Client::new();

        let messages = prompt::build_messages(&sheet.columns, &sheet.analysis, question);
        let system = prompt::system_prompt();

        let request_body = serde_json::json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "temperature": 0,
            "system": system,
            "messages": messages
        });

        let response = client
            .post("https://api.anthropic.com/v1/messages")
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::RequestFailed(e.to_string()))?;

        if !status.is_success() {
            // Try to parse the service's error message
            if let Ok(error) = serde_json::from_str::<AnthropicError>(&body) {
                return Err(AiError::ApiError(error.error.message));
            }
            return Err(AiError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let response: AnthropicResponse =
            serde_json::from_str(&body).map_err(|e| AiError::InvalidJson(e.to_string()))?;

        let text = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(AiError::InvalidJson("Empty response".to_string()));
        }

        Ok(text)
    }
}

/// Parse and schema-validate a query plan from an AI response.
///
/// The offending response text is carried in the error so it can be
/// shown to the user for diagnosis.
pub fn parse_plan_from_response(response: &str) -> AiResult<QueryPlan> {
    let json_str = extract_json(response);

    let value: serde_json::Value = serde_json::from_str(&json_str).map_err(|e| {
        AiError::ParseError(format!(
            "Response is not JSON: {}. Response was: {}",
            e,
            &response[..response.len().min(500)]
        ))
    })?;

    if let Err(violations) = validate_plan(&value) {
        return Err(AiError::ParseError(format!(
            "Plan rejected by schema: {}. Plan was: {}",
            violations.join("; "),
            json_str
        )));
    }

    QueryPlan::from_value(&value)
        .map_err(|e| AiError::ParseError(format!("Failed to parse plan: {}", e)))
}

/// Extract JSON from a response that may contain markdown code blocks.
fn extract_json(text: &str) -> String {
    // Try to find JSON in a ```json code block
    if let Some(start) = text.find("```json") {
        if let Some(end) = text[start..].find("```\n").or_else(|| text[start..].rfind("```")) {
            let json_start = start + 7; // len of "```json"
            if json_start < start + end {
                return text[json_start..start + end].trim().to_string();
            }
        }
    }

    // Try to find JSON in a generic code block
    if let Some(start) = text.find("```") {
        let after_start = start + 3;
        // Skip language identifier if present
        let content_start = text[after_start..]
            .find('\n')
            .map(|i| after_start + i + 1)
            .unwrap_or(after_start);

        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim().to_string();
        }
    }

    // Try to find a raw JSON object
    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if start < end {
                return text[start..=end].to_string();
            }
        }
    }

    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_from_code_block() {
        let response = r#"Here's the plan:

```json
{
  "version": "1.0",
  "filter": {"type": "not_empty", "column": "Grade"}
}
```

Done!"#;

        let json = extract_json(response);
        assert!(json.contains("\"version\""));
        assert!(json.contains("\"filter\""));
    }

    #[test]
    fn test_extract_raw_json() {
        let response = r#"{"version": "1.0", "filter": {"type": "not_empty", "column": "Grade"}}"#;
        let json = extract_json(response);
        assert_eq!(json, response);
    }

    #[test]
    fn test_parse_plan_validates() {
        let good = r#"{"filter": {"type": "ge", "column": "Chem_C", "value": 0.06}}"#;
        let plan = parse_plan_from_response(good).unwrap();
        assert!(plan.filter.is_some());

        // A plan outside the grammar is rejected, with the offending
        // text carried in the error.
        let bad = r#"{"filter": {"type": "exec", "code": "rm -rf /"}}"#;
        let err = parse_plan_from_response(bad).unwrap_err();
        assert!(matches!(err, AiError::ParseError(_)));
        assert!(err.to_string().contains("exec"));
    }

    #[test]
    fn test_parse_non_json_response() {
        let err = parse_plan_from_response("I'm sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, AiError::ParseError(_)));
    }

    #[test]
    fn test_client_builders() {
        let client = AiClient::new("key".to_string())
            .with_model("claude-test")
            .with_max_tokens(256);
        assert_eq!(client.model, "claude-test");
        assert_eq!(client.max_tokens, 256);
    }
}
