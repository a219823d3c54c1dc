//! Answer recording with catalog validation.

use std::sync::Arc;

use chrono::Utc;

use awareness_core::types::{Answer, AnswerPayload, QuestionId, SessionId, UserId};
use awareness_core::QuestionCatalog;
use awareness_store::{AnswerRepository, UserRepository};

use crate::error::{ReportError, Result};

/// Validates answers against the catalog before they reach storage.
#[derive(Clone)]
pub struct AnswerStore {
    catalog: Arc<QuestionCatalog>,
    users: Arc<dyn UserRepository>,
    answers: Arc<dyn AnswerRepository>,
}

impl AnswerStore {
    pub fn new(
        catalog: Arc<QuestionCatalog>,
        users: Arc<dyn UserRepository>,
        answers: Arc<dyn AnswerRepository>,
    ) -> Self {
        Self {
            catalog,
            users,
            answers,
        }
    }

    /// Check the question exists, the payload has the question's type and,
    /// when the question lists options, every chosen value is one of them.
    pub fn validate(&self, question_id: QuestionId, payload: &AnswerPayload) -> Result<()> {
        let question = self
            .catalog
            .get(question_id)
            .ok_or_else(|| ReportError::Validation(format!("Unknown question: {question_id}")))?;

        if payload.question_type() != question.question_type {
            return Err(ReportError::Validation(format!(
                "Question {question_id} expects a {} answer, got {}",
                question.question_type.as_str(),
                payload.question_type().as_str()
            )));
        }

        let chosen: Vec<&str> = match payload {
            AnswerPayload::SingleChoice { value } => vec![value.as_str()],
            AnswerPayload::MultipleChoice { values, other_text } => {
                let has_other = other_text.as_deref().is_some_and(|t| !t.trim().is_empty());
                if has_other && !question.allow_other_text {
                    return Err(ReportError::Validation(format!(
                        "Question {question_id} does not accept free text"
                    )));
                }
                values.iter().map(String::as_str).collect()
            }
            AnswerPayload::Ranking { ranked_values } => {
                ranked_values.iter().map(|r| r.value.as_str()).collect()
            }
            AnswerPayload::OpenText { .. } => Vec::new(),
        };

        if !question.options.is_empty() {
            if let Some(unknown) = chosen
                .iter()
                .find(|v| !question.options.iter().any(|o| o == *v))
            {
                return Err(ReportError::Validation(format!(
                    "Question {question_id} has no option \"{unknown}\""
                )));
            }
        }
        Ok(())
    }

    /// Store the answer for `(session_id, question_id)`, replacing any
    /// earlier one.
    pub async fn record_answer(
        &self,
        user_id: UserId,
        session_id: SessionId,
        question_id: QuestionId,
        payload: AnswerPayload,
    ) -> Result<Answer> {
        self.validate(question_id, &payload)?;

        if self.users.find_by_id(user_id).await?.is_none() {
            return Err(ReportError::UserNotFound(user_id));
        }

        let answer = Answer {
            session_id,
            user_id,
            question_id,
            payload,
            answered_at: Utc::now(),
        };
        self.answers.upsert(&answer).await?;
        Ok(answer)
    }
}
