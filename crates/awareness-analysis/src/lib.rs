//! Awareness Analysis — turns a completed survey into a structured analysis.
//!
//! The flow for one request:
//! 1. [`prompt::render_document`] renders the profile and answers as a
//!    deterministic markdown document.
//! 2. [`client::DifyClient`] posts it with the fixed analysis contract to the
//!    provider's blocking chat endpoint.
//! 3. [`parse::parse_response_body`] extracts and validates the JSON analysis.
//! 4. [`preview::build_preview`] derives the in-app subset.

pub mod client;
pub mod error;
pub mod parse;
pub mod preview;
pub mod prompt;

use async_trait::async_trait;
use serde::Serialize;

use awareness_core::types::{AnswerPayload, EntryPoint, FullAnalysis, QuestionId, SessionId, UserId};

pub use client::DifyClient;
pub use error::{ProviderError, Result};
pub use preview::build_preview;

/// One answered question as presented to the provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResponse {
    pub question_id: QuestionId,
    pub question_title: String,
    pub answer: AnswerPayload,
}

/// Everything the provider needs to analyze one session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub entry_point: EntryPoint,
    pub mbti_type: Option<String>,
    pub zodiac_sign: Option<String>,
    /// Ordered by question id.
    pub responses: Vec<QuestionResponse>,
}

/// A source of survey analyses.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &'static str;

    /// Run one blocking analysis. Never retries.
    async fn analyze(&self, input: &AnalysisInput) -> Result<FullAnalysis>;
}
