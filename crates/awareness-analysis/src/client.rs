//! Blocking chat-messages client for the analysis provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use awareness_core::config::ProviderConfig;
use awareness_core::types::FullAnalysis;

use crate::error::{ProviderError, Result};
use crate::parse::parse_response_body;
use crate::prompt::{render_document, ANALYSIS_CONTRACT};
use crate::{AnalysisInput, AnalysisProvider};

/// Longest slice of a raw provider body written to debug logs.
const LOGGED_BODY_LIMIT: usize = 512;

#[derive(Serialize)]
struct ChatInputs<'a> {
    survey_data: String,
    entry_point: &'a str,
    mbti_type: &'a str,
    zodiac_sign: &'a str,
    session_id: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    inputs: ChatInputs<'a>,
    query: &'static str,
    response_mode: &'static str,
    user: String,
}

/// HTTP client for a Dify-style `/chat-messages` endpoint.
pub struct DifyClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl DifyClient {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.trim().to_string(),
            timeout: config.timeout(),
            client,
        })
    }

    fn classify(&self, err: reqwest::Error) -> ProviderError {
        if err.is_timeout() {
            ProviderError::Timeout(self.timeout)
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl AnalysisProvider for DifyClient {
    fn name(&self) -> &'static str {
        "dify"
    }

    async fn analyze(&self, input: &AnalysisInput) -> Result<FullAnalysis> {
        let request = ChatRequest {
            inputs: ChatInputs {
                survey_data: render_document(input),
                entry_point: input.entry_point.as_str(),
                mbti_type: input.mbti_type.as_deref().unwrap_or(""),
                zodiac_sign: input.zodiac_sign.as_deref().unwrap_or(""),
                session_id: input.session_id.to_string(),
            },
            query: ANALYSIS_CONTRACT,
            response_mode: "blocking",
            user: input.user_id.to_string(),
        };

        tracing::info!(
            session_id = %input.session_id,
            responses = input.responses.len(),
            "Requesting analysis"
        );

        let response = self
            .client
            .post(format!("{}/chat-messages", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.classify(e))?;
        tracing::debug!(
            session_id = %input.session_id,
            status = status.as_u16(),
            body = truncate(&body, LOGGED_BODY_LIMIT),
            "Provider response"
        );

        if !status.is_success() {
            return Err(ProviderError::Status(status.as_u16()));
        }

        parse_response_body(&body)
    }
}
