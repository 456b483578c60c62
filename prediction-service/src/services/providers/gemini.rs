//! Gemini insight provider.
//!
//! Calls the `generateContent` method of the Generative Language API. Each
//! attempt has its own timeout; transient failures are retried with
//! backoff.

use super::{InsightProvider, ProviderError};
use crate::config::InsightConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use service_core::observability::TracedClientExt;
use service_core::retry::{retry_with_backoff, RetryConfig};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini provider configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<Secret<String>>,
    pub model: String,
    pub api_base: String,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl From<&InsightConfig> for GeminiConfig {
    fn from(config: &InsightConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            api_base: config.api_base.clone(),
            timeout: config.timeout(),
            retry: config.retry(),
        }
    }
}

pub struct GeminiInsightProvider {
    config: GeminiConfig,
    client: Client,
}

impl GeminiInsightProvider {
    pub fn new(config: GeminiConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            self.config.model
        )
    }

    async fn generate_once(
        &self,
        api_key: &str,
        request: &GenerateContentRequest<'_>,
        request_id: Option<&str>,
    ) -> Result<String, ProviderError> {
        let response = self
            .client
            .traced_post(&self.api_url())
            .header(API_KEY_HEADER, api_key)
            .json(request)
            .timeout(self.config.timeout)
            .request_id(request_id)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            if status.as_u16() == 429 {
                return Err(ProviderError::RateLimited);
            }

            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: upstream_message(&body),
            });
        }

        let api_response: GenerateContentResponse = response.json().await.map_err(|e| {
            ProviderError::Api {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            }
        })?;

        extract_text(api_response)
    }
}

#[async_trait]
impl InsightProvider for GeminiInsightProvider {
    async fn generate(
        &self,
        prompt: &str,
        request_id: Option<&str>,
    ) -> Result<String, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::NotConfigured("GEMINI_API_KEY is not set".to_string()))?
            .expose_secret()
            .as_str();

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        tracing::debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "Sending insight request to Gemini API"
        );

        let request = &request;
        retry_with_backoff(&self.config.retry, "gemini.generate_content", move || {
            self.generate_once(api_key, request, request_id)
        })
        .await
    }

    fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }
}

/// Pull the human-readable message out of a Gemini error body, falling back
/// to the raw body.
fn upstream_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    if response
        .prompt_feedback
        .as_ref()
        .is_some_and(|feedback| feedback.block_reason.is_some())
    {
        return Err(ProviderError::ContentFiltered);
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(ProviderError::EmptyResponse)?;

    if candidate.finish_reason.as_deref() == Some("SAFETY") {
        return Err(ProviderError::ContentFiltered);
    }

    let text: String = candidate
        .content
        .map(|content| content.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();

    if text.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }

    Ok(text)
}

// Gemini API request/response types

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}
