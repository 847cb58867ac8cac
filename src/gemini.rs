//! Gemini API Client
//!
//! Google Generative Language `generateContent` client. Built once at
//! startup and shared; failures are classified into [`ProviderError`] so the
//! retry wrapper in [`crate::ai`] can decide what to do.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::ai::{ProviderError, TextGenerator, CALL_TIMEOUT};
use crate::config::Config;

/// Gemini API client
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Google API error envelope
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<&str>, model: &str, base_url: &str) -> Self {
        // Backstop only; the retry wrapper enforces the real per-attempt timeout
        let client = Client::builder()
            .timeout(CALL_TIMEOUT + Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key: api_key.map(|s| s.to_string()),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create from config
    pub fn from_config(config: &Config) -> Self {
        let client = Self::new(
            config.gemini_api_key.as_deref(),
            &config.gemini_model,
            &config.gemini_base_url,
        );
        info!("Gemini client ready: model={}", client.model);
        client
    }

    /// Check if API key is configured
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::Other("GEMINI_API_KEY is not set".into()))?;

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
        };

        debug!("Calling Gemini API: model={}, prompt_len={}", self.model, prompt.len());

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::Other(format!("Invalid Gemini response: {}", e)))?;

        extract_text(parsed)
    }
}

fn classify_transport(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(CALL_TIMEOUT)
    } else {
        ProviderError::Other(err.to_string())
    }
}

/// Map an HTTP error response onto a provider failure kind
fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let (api_status, message) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => (env.error.status, env.error.message),
        Err(_) => (String::new(), body.to_string()),
    };

    match (api_status.as_str(), status) {
        ("INVALID_ARGUMENT", _) | (_, StatusCode::BAD_REQUEST) => ProviderError::InvalidArgument(message),
        ("RESOURCE_EXHAUSTED", _) | (_, StatusCode::TOO_MANY_REQUESTS) => {
            ProviderError::ResourceExhausted(message)
        }
        ("DEADLINE_EXCEEDED", _) | (_, StatusCode::GATEWAY_TIMEOUT) => ProviderError::DeadlineExceeded(message),
        _ => ProviderError::Other(format!("{}: {}", status, message)),
    }
}

fn extract_text(resp: GenerateResponse) -> Result<String, ProviderError> {
    if let Some(reason) = resp.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(ProviderError::Other(format!("Prompt blocked: {}", reason)));
    }

    let text: String = resp
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(ProviderError::Other("Gemini returned no text".into()));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let client = GeminiClient::new(Some("k"), "gemini-2.5-flash", "https://example.test/");
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert!(client.is_available());
    }

    #[tokio::test]
    async fn test_missing_key_is_other() {
        let client = GeminiClient::new(None, "m", "https://example.test");
        let err = client.generate("hi").await.unwrap_err();
        assert_eq!(err, ProviderError::Other("GEMINI_API_KEY is not set".into()));
    }

    #[test]
    fn test_classify_invalid_argument() {
        let body = r#"{"error":{"code":400,"message":"Request contains an invalid argument.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST, body),
            ProviderError::InvalidArgument("Request contains an invalid argument.".into())
        );
    }

    #[test]
    fn test_classify_resource_exhausted() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, body),
            ProviderError::ResourceExhausted(_)
        ));
        // Bare 429 without an envelope
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down"),
            ProviderError::ResourceExhausted(_)
        ));
    }

    #[test]
    fn test_classify_deadline() {
        assert!(matches!(
            classify_status(StatusCode::GATEWAY_TIMEOUT, ""),
            ProviderError::DeadlineExceeded(_)
        ));
    }

    #[test]
    fn test_classify_other() {
        let body = r#"{"error":{"code":500,"message":"Internal error","status":"INTERNAL"}}"#;
        match classify_status(StatusCode::INTERNAL_SERVER_ERROR, body) {
            ProviderError::Other(msg) => assert!(msg.contains("Internal error")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let resp: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}],"role":"model"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(resp).unwrap(), "Hello world");
    }

    #[test]
    fn test_extract_text_blocked() {
        let resp: GenerateResponse =
            serde_json::from_str(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap();
        assert_eq!(
            extract_text(resp).unwrap_err(),
            ProviderError::Other("Prompt blocked: SAFETY".into())
        );
    }

    #[test]
    fn test_extract_text_empty() {
        let resp: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert!(extract_text(resp).is_err());
    }
}
