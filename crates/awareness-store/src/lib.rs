//! Awareness Store — durable storage for users, answers and reports.
//!
//! This crate is the single mutation point for the relational store. Each
//! table is owned by exactly one repository trait; uniqueness invariants
//! (one answer per session/question, one report per session) are enforced
//! by the schema rather than by callers.

pub mod answers;
pub mod client;
pub mod reports;
pub mod users;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use awareness_core::types::{
    Answer, EntryPoint, FullAnalysis, PersonalityTags, Report, ReportPreview, ReportStatus,
    SessionId, User, UserId,
};

pub use client::{Result, SqliteStore, StoreError};

/// Lookup, creation and tag updates for survey takers.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>>;

    /// Return the user with this email, creating it if absent.
    /// The flag is true when a new row was inserted.
    async fn create_or_get(&self, email: &str, entry_point: EntryPoint) -> Result<(User, bool)>;

    /// Overwrite the tags that are `Some`; leave the others unchanged.
    async fn update_tags(&self, id: UserId, tags: &PersonalityTags) -> Result<User>;
}

/// Keyed storage of one answer per (session, question).
#[async_trait]
pub trait AnswerRepository: Send + Sync {
    /// Insert or replace the answer for `(answer.session_id, answer.question_id)`.
    async fn upsert(&self, answer: &Answer) -> Result<()>;

    /// All answers of a session, ordered by question id ascending.
    async fn list(&self, session_id: SessionId) -> Result<Vec<Answer>>;
}

/// Data accompanying a report transition.
#[derive(Debug, Clone)]
pub enum TransitionPayload {
    /// Entering `GENERATING`.
    None,
    /// Entering `COMPLETED` from the named generation attempt.
    Completed {
        attempt: u32,
        analysis: FullAnalysis,
        preview: ReportPreview,
    },
    /// Entering `FAILED`. With `attempt: None` any in-flight attempt is failed.
    Failed {
        attempt: Option<u32>,
        message: String,
        detail: Option<String>,
    },
}

impl TransitionPayload {
    /// The only status this payload can accompany.
    pub fn target(&self) -> ReportStatus {
        match self {
            Self::None => ReportStatus::Generating,
            Self::Completed { .. } => ReportStatus::Completed,
            Self::Failed { .. } => ReportStatus::Failed,
        }
    }
}

/// One report per session, moving through the report state machine.
#[async_trait]
pub trait ReportRepository: Send + Sync {
    /// Create a `PENDING` report. Fails with `ReportAlreadyExists` when the
    /// session already has one.
    async fn create_if_absent(&self, user_id: UserId, session_id: SessionId) -> Result<Report>;

    /// Atomically move the report to `new_status`, returning the updated row.
    async fn transition(
        &self,
        session_id: SessionId,
        new_status: ReportStatus,
        payload: TransitionPayload,
    ) -> Result<Report>;

    /// Move a `PENDING` report to `GENERATING`. Unlike [`transition`], any
    /// other current state is rejected with `InvalidTransition`, so a report
    /// that already finished is never restarted by a late submit.
    ///
    /// [`transition`]: ReportRepository::transition
    async fn claim_pending(&self, session_id: SessionId) -> Result<Report>;

    async fn get(&self, session_id: SessionId) -> Result<Report>;

    /// Flag the report as emailed. Fails with `StaleAttempt` when the report
    /// has been regenerated since `attempt` produced the email.
    async fn mark_delivered(&self, session_id: SessionId, attempt: u32) -> Result<()>;

    /// Record why emailing `attempt`'s report failed. Same attempt guard as
    /// [`ReportRepository::mark_delivered`].
    async fn record_delivery_failure(
        &self,
        session_id: SessionId,
        attempt: u32,
        error: &str,
    ) -> Result<()>;

    /// Reports still `PENDING` or `GENERATING` with no change since before
    /// `older_than`.
    async fn list_stale_in_flight(&self, older_than: DateTime<Utc>) -> Result<Vec<Report>>;
}
