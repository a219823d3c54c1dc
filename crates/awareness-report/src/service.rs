//! The survey service facade: every client-facing operation in one place.

use std::sync::{Arc, OnceLock};

use regex::Regex;

use awareness_analysis::AnalysisProvider;
use awareness_core::catalog::{MBTI_TYPES, ZODIAC_SIGNS};
use awareness_core::types::{EntryPoint, PersonalityTags, SessionId};
use awareness_core::{AwarenessConfig, QuestionCatalog};
use awareness_delivery::{DeliveryNotifier, Mailer};
use awareness_store::{SqliteStore, UserRepository};

use crate::answers::AnswerStore;
use crate::error::{ReportError, Result};
use crate::orchestrator::ReportOrchestrator;
use crate::types::{
    AnswerAck, CreateUserRequest, RecordAnswerRequest, RegenerateOutcome, ReportView,
    SessionStart, SubmissionAck, SubmitRequest, TagsView, UpdateTagsRequest,
};

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"))
}

/// Trimmed, lowercased email, or a validation error.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    if email_pattern().is_match(&email) {
        Ok(email)
    } else {
        Err(ReportError::Validation("Invalid email format".to_string()))
    }
}

fn normalize_mbti(raw: &str) -> Result<String> {
    let upper = raw.trim().to_ascii_uppercase();
    MBTI_TYPES
        .iter()
        .find(|t| **t == upper)
        .map(|t| t.to_string())
        .ok_or_else(|| ReportError::Validation(format!("Unknown MBTI type: {raw}")))
}

fn normalize_zodiac(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    ZODIAC_SIGNS
        .iter()
        .find(|s| s.eq_ignore_ascii_case(trimmed))
        .map(|s| s.to_string())
        .ok_or_else(|| ReportError::Validation(format!("Unknown zodiac sign: {raw}")))
}

pub struct SurveyService {
    users: Arc<dyn UserRepository>,
    answers: AnswerStore,
    orchestrator: ReportOrchestrator,
}

impl SurveyService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        answers: AnswerStore,
        orchestrator: ReportOrchestrator,
    ) -> Self {
        Self {
            users,
            answers,
            orchestrator,
        }
    }

    /// Wire the service over one SQLite store.
    pub fn assemble(
        config: &AwarenessConfig,
        store: SqliteStore,
        catalog: QuestionCatalog,
        provider: Arc<dyn AnalysisProvider>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let store = Arc::new(store);
        let catalog = Arc::new(catalog);
        let notifier = Arc::new(DeliveryNotifier::new(
            mailer,
            store.clone(),
            config.email.subject.clone(),
        ));
        let orchestrator = ReportOrchestrator::new(
            catalog.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            provider,
            notifier,
            config.provider.abandon_after(),
            config.report.regenerate_enabled,
        );
        let answers = AnswerStore::new(catalog, store.clone(), store.clone());
        Self::new(store, answers, orchestrator)
    }

    pub fn orchestrator(&self) -> &ReportOrchestrator {
        &self.orchestrator
    }

    /// Find or create the user and open a fresh session. Returning users keep
    /// their original entry point.
    pub async fn create_or_resume(&self, request: CreateUserRequest) -> Result<SessionStart> {
        let email = normalize_email(&request.email)?;
        let entry_point: EntryPoint = request.entry_point.parse()?;

        let (user, created) = self.users.create_or_get(&email, entry_point).await?;
        let session_id = SessionId::new();
        tracing::info!(
            user_id = %user.id,
            session_id = %session_id,
            created,
            "Survey session started"
        );

        Ok(SessionStart {
            user_id: user.id,
            session_id,
            email: user.email,
            entry_point: user.entry_point,
            created_at: user.created_at,
            created,
        })
    }

    pub async fn update_tags(&self, request: UpdateTagsRequest) -> Result<TagsView> {
        let tags = PersonalityTags {
            mbti_type: request.mbti_type.as_deref().map(normalize_mbti).transpose()?,
            zodiac_sign: request
                .zodiac_sign
                .as_deref()
                .map(normalize_zodiac)
                .transpose()?,
        };
        if tags.is_empty() {
            return Err(ReportError::Validation(
                "At least one tag (mbtiType or zodiacSign) is required".to_string(),
            ));
        }

        let user = self.users.update_tags(request.user_id, &tags).await?;
        Ok(TagsView {
            user_id: user.id,
            mbti_type: user.mbti_type,
            zodiac_sign: user.zodiac_sign,
        })
    }

    pub async fn record_answer(&self, request: RecordAnswerRequest) -> Result<AnswerAck> {
        let answer = self
            .answers
            .record_answer(
                request.user_id,
                request.session_id,
                request.question_id,
                request.answer,
            )
            .await?;
        Ok(AnswerAck {
            session_id: answer.session_id,
            question_id: answer.question_id,
            answered_at: answer.answered_at,
        })
    }

    pub async fn submit_survey(&self, request: SubmitRequest) -> Result<SubmissionAck> {
        self.orchestrator
            .submit(request.user_id, request.session_id)
            .await
    }

    pub async fn get_report(&self, session_id: SessionId) -> Result<ReportView> {
        self.orchestrator.query(session_id).await
    }

    pub async fn regenerate_report(&self, session_id: SessionId) -> Result<RegenerateOutcome> {
        self.orchestrator.regenerate(session_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        assert_eq!(normalize_email("  Ana@Example.COM ").unwrap(), "ana@example.com");
        for bad in ["", "ana", "ana@", "@example.com", "ana@example", "a b@example.com"] {
            assert!(matches!(normalize_email(bad), Err(ReportError::Validation(_))), "{bad}");
        }
    }

    #[test]
    fn tags_are_canonicalized() {
        assert_eq!(normalize_mbti("intj").unwrap(), "INTJ");
        assert!(normalize_mbti("ABCD").is_err());
        assert_eq!(normalize_zodiac(" sagittarius").unwrap(), "Sagittarius");
        assert!(normalize_zodiac("Ophiuchus").is_err());
    }
}
