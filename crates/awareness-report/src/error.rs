//! Error types for the awareness-report crate.
//!
//! Every error maps to a stable machine code and a client-safe message.
//! Store and configuration internals are logged, never shown.

use thiserror::Error;

use awareness_core::types::{QuestionId, ReportStatus, SessionId, UserId};
use awareness_core::AwarenessError;
use awareness_store::StoreError;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Report not found for session {0}")]
    ReportNotFound(SessionId),

    #[error("Survey incomplete, missing questions {missing_questions:?}")]
    IncompleteSurvey { missing_questions: Vec<QuestionId> },

    #[error("Report cannot move from {from} to {to}")]
    InvalidTransition { from: ReportStatus, to: ReportStatus },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReportError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::ReportNotFound(_) => "REPORT_NOT_FOUND",
            Self::IncompleteSurvey { .. } => "INCOMPLETE_SURVEY",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::UserNotFound(_) => "User not found".to_string(),
            Self::ReportNotFound(_) => "Report not found".to_string(),
            Self::IncompleteSurvey { .. } => "Please answer all required questions".to_string(),
            Self::InvalidTransition {
                from: ReportStatus::Generating,
                ..
            } => "Report is already being generated".to_string(),
            Self::InvalidTransition { from, to } => {
                format!("Report cannot move from {from} to {to}")
            }
            Self::Internal(_) => "Internal error".to_string(),
        }
    }

    /// Structured detail for clients, where the error has any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::IncompleteSurvey { missing_questions } => Some(serde_json::json!({
                "missingQuestions": missing_questions,
            })),
            _ => None,
        }
    }
}

impl From<StoreError> for ReportError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserNotFound(id) => Self::UserNotFound(id),
            StoreError::ReportNotFound(id) => Self::ReportNotFound(id),
            StoreError::InvalidTransition { from, to, .. } => Self::InvalidTransition { from, to },
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<AwarenessError> for ReportError {
    fn from(err: AwarenessError) -> Self {
        match err {
            AwarenessError::Validation(msg) => Self::Validation(msg),
            other => Self::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_public_kinds() {
        let err: ReportError = StoreError::ReportNotFound(SessionId::new()).into();
        assert_eq!(err.code(), "REPORT_NOT_FOUND");

        let err: ReportError = StoreError::Corrupt("bad timestamp".to_string()).into();
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.public_message(), "Internal error");
    }

    #[test]
    fn incomplete_survey_details() {
        let err = ReportError::IncompleteSurvey {
            missing_questions: vec![QuestionId(3), QuestionId(9)],
        };
        assert_eq!(err.code(), "INCOMPLETE_SURVEY");
        assert_eq!(
            err.details(),
            Some(serde_json::json!({ "missingQuestions": [3, 9] }))
        );
    }
}
