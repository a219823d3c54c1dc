//! Request and response shapes of the service facade.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use awareness_core::types::{
    AnswerPayload, EntryPoint, QuestionId, ReportPreview, ReportStatus, SessionId, UserId,
};

// ── Requests ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub entry_point: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTagsRequest {
    pub user_id: UserId,
    #[serde(default)]
    pub mbti_type: Option<String>,
    #[serde(default)]
    pub zodiac_sign: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordAnswerRequest {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub question_id: QuestionId,
    pub answer: AnswerPayload,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub user_id: UserId,
    pub session_id: SessionId,
}

// ── Responses ─────────────────────────────────────────────────────

/// A fresh survey session for a new or returning user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub email: String,
    pub entry_point: EntryPoint,
    pub created_at: DateTime<Utc>,
    /// True when this call created the user.
    pub created: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TagsView {
    pub user_id: UserId,
    pub mbti_type: Option<String>,
    pub zodiac_sign: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerAck {
    pub session_id: SessionId,
    pub question_id: QuestionId,
    pub answered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionAck {
    pub session_id: SessionId,
    pub status: ReportStatus,
}

/// What a client sees when polling a report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ReportView {
    #[serde(rename_all = "camelCase")]
    Generating {
        session_id: SessionId,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    Completed {
        session_id: SessionId,
        preview: ReportPreview,
        delivered: bool,
        generated_at: Option<DateTime<Utc>>,
    },
    #[serde(rename_all = "camelCase")]
    Failed {
        session_id: SessionId,
        message: String,
    },
}

/// Result of a regenerate request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RegenerateOutcome {
    Started(SubmissionAck),
    /// Regeneration is disabled; nothing changed.
    #[serde(rename_all = "camelCase")]
    ManualReview {
        session_id: SessionId,
        status: ReportStatus,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_view_wire_shape() {
        let session_id = SessionId::new();
        let view = ReportView::Failed {
            session_id,
            message: "Report generation failed, please try again".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&view).unwrap(),
            serde_json::json!({
                "status": "failed",
                "sessionId": session_id.to_string(),
                "message": "Report generation failed, please try again",
            })
        );
    }

    #[test]
    fn answer_request_accepts_client_json() {
        let req: RecordAnswerRequest = serde_json::from_value(serde_json::json!({
            "userId": "6f1c2a8e-3a56-4f0c-9d59-7c1b8f2e4a10",
            "sessionId": "0b8f7a3c-1d2e-4f5a-8b9c-0d1e2f3a4b5c",
            "questionId": 5,
            "answer": { "type": "multiple_choice", "values": ["Stocks"] }
        }))
        .unwrap();
        assert_eq!(req.question_id, QuestionId(5));
        assert!(matches!(req.answer, AnswerPayload::MultipleChoice { .. }));
    }
}
