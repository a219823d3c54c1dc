//! Report generation orchestration.
//!
//! Submit and regenerate move the report into `GENERATING` synchronously and
//! return; the provider call runs in a tracked background task that ends in
//! exactly one `COMPLETED` or `FAILED` transition for its attempt. Clients
//! observe progress by polling [`ReportOrchestrator::query`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;

use awareness_analysis::{
    build_preview, AnalysisInput, AnalysisProvider, ProviderError, QuestionResponse,
};
use awareness_core::types::{FullAnalysis, ReportStatus, SessionId, User, UserId};
use awareness_core::QuestionCatalog;
use awareness_delivery::DeliveryNotifier;
use awareness_store::{
    AnswerRepository, ReportRepository, StoreError, TransitionPayload, UserRepository,
};

use crate::completeness::missing_required;
use crate::error::{ReportError, Result};
use crate::types::{RegenerateOutcome, ReportView, SubmissionAck};

pub const GENERATING_MESSAGE: &str = "Report is being generated, estimated 1-2 minutes";
pub const FAILED_FALLBACK_MESSAGE: &str = "Report generation failed, please try again";
pub const MANUAL_REVIEW_MESSAGE: &str =
    "Report is pending manual review. Automatic regeneration is disabled.";

/// Everything a generation task needs, shared with the spawned tasks.
struct Pipeline {
    catalog: Arc<QuestionCatalog>,
    answers: Arc<dyn AnswerRepository>,
    reports: Arc<dyn ReportRepository>,
    provider: Arc<dyn AnalysisProvider>,
    notifier: Arc<DeliveryNotifier>,
    abandon_after: Duration,
}

/// Why a generation attempt failed: the client-safe message plus the
/// diagnostic kept server-side.
struct GenerationFailure {
    message: &'static str,
    detail: String,
}

impl From<ProviderError> for GenerationFailure {
    fn from(err: ProviderError) -> Self {
        Self {
            message: err.user_message(),
            detail: err.to_string(),
        }
    }
}

impl From<StoreError> for GenerationFailure {
    fn from(err: StoreError) -> Self {
        Self {
            message: FAILED_FALLBACK_MESSAGE,
            detail: err.to_string(),
        }
    }
}

impl Pipeline {
    async fn build_input(
        &self,
        user: &User,
        session_id: SessionId,
    ) -> std::result::Result<AnalysisInput, StoreError> {
        let responses = self
            .answers
            .list(session_id)
            .await?
            .into_iter()
            .map(|a| QuestionResponse {
                question_id: a.question_id,
                question_title: self
                    .catalog
                    .title(a.question_id)
                    .unwrap_or_default()
                    .to_string(),
                answer: a.payload,
            })
            .collect();

        Ok(AnalysisInput {
            user_id: user.id,
            session_id,
            entry_point: user.entry_point,
            mbti_type: user.mbti_type.clone(),
            zodiac_sign: user.zodiac_sign.clone(),
            responses,
        })
    }

    async fn analyze(
        &self,
        user: &User,
        session_id: SessionId,
    ) -> std::result::Result<FullAnalysis, GenerationFailure> {
        let input = self.build_input(user, session_id).await?;
        match tokio::time::timeout(self.abandon_after, self.provider.analyze(&input)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProviderError::Timeout(self.abandon_after).into()),
        }
    }

    /// One generation attempt, start to finish. Never panics on provider or
    /// store errors; every outcome is logged.
    async fn run(self: Arc<Self>, user: User, session_id: SessionId, attempt: u32) {
        tracing::info!(
            session_id = %session_id,
            attempt,
            provider = self.provider.name(),
            "Generation started"
        );

        match self.analyze(&user, session_id).await {
            Ok(analysis) => {
                let preview = build_preview(&analysis);
                let payload = TransitionPayload::Completed {
                    attempt,
                    analysis: analysis.clone(),
                    preview,
                };
                match self
                    .reports
                    .transition(session_id, ReportStatus::Completed, payload)
                    .await
                {
                    Ok(_) => {
                        tracing::info!(session_id = %session_id, attempt, "Report completed");
                        if let Err(e) = self
                            .notifier
                            .deliver(session_id, attempt, &user, &analysis)
                            .await
                        {
                            tracing::warn!(
                                session_id = %session_id,
                                error = %e,
                                "Report delivery failed"
                            );
                        }
                    }
                    Err(e) => {
                        tracing::warn!(
                            session_id = %session_id,
                            attempt,
                            error = %e,
                            "Discarding analysis for superseded attempt"
                        );
                    }
                }
            }
            Err(failure) => {
                tracing::warn!(
                    session_id = %session_id,
                    attempt,
                    detail = %failure.detail,
                    "Generation failed"
                );
                let payload = TransitionPayload::Failed {
                    attempt: Some(attempt),
                    message: failure.message.to_string(),
                    detail: Some(failure.detail),
                };
                if let Err(e) = self
                    .reports
                    .transition(session_id, ReportStatus::Failed, payload)
                    .await
                {
                    tracing::warn!(
                        session_id = %session_id,
                        attempt,
                        error = %e,
                        "Could not record generation failure"
                    );
                }
            }
        }
    }
}

/// Drives submit, regenerate and query over the report state machine.
pub struct ReportOrchestrator {
    users: Arc<dyn UserRepository>,
    pipeline: Arc<Pipeline>,
    regenerate_enabled: bool,
    tasks: Mutex<JoinSet<()>>,
}

impl ReportOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        catalog: Arc<QuestionCatalog>,
        users: Arc<dyn UserRepository>,
        answers: Arc<dyn AnswerRepository>,
        reports: Arc<dyn ReportRepository>,
        provider: Arc<dyn AnalysisProvider>,
        notifier: Arc<DeliveryNotifier>,
        abandon_after: Duration,
        regenerate_enabled: bool,
    ) -> Self {
        Self {
            users,
            pipeline: Arc::new(Pipeline {
                catalog,
                answers,
                reports,
                provider,
                notifier,
                abandon_after,
            }),
            regenerate_enabled,
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    async fn spawn_generation(&self, user: User, session_id: SessionId, attempt: u32) {
        let pipeline = self.pipeline.clone();
        let mut tasks = self.tasks.lock().await;
        // Reap finished tasks so the set does not grow in long-lived processes.
        while tasks.try_join_next().is_some() {}
        tasks.spawn(pipeline.run(user, session_id, attempt));
    }

    /// Wait until every background generation has finished.
    pub async fn wait_idle(&self) {
        loop {
            let mut drained = std::mem::take(&mut *self.tasks.lock().await);
            if drained.is_empty() {
                return;
            }
            while let Some(joined) = drained.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Generation task panicked");
                }
            }
        }
    }

    /// Submit a completed survey for analysis.
    ///
    /// Idempotent: when the session already has a report its current status
    /// is returned and the provider is not called again. A report left in
    /// `PENDING` (created, but generation never started) is picked up here.
    pub async fn submit(&self, user_id: UserId, session_id: SessionId) -> Result<SubmissionAck> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(ReportError::UserNotFound(user_id))?;

        let answers = self.pipeline.answers.list(session_id).await?;
        let missing = missing_required(&answers, &self.pipeline.catalog.required_ids());
        if !missing.is_empty() {
            tracing::info!(
                session_id = %session_id,
                missing = ?missing,
                "Submit rejected, survey incomplete"
            );
            return Err(ReportError::IncompleteSurvey {
                missing_questions: missing,
            });
        }

        let reports = &self.pipeline.reports;
        let existing = match reports.get(session_id).await {
            Ok(existing) => Some(existing),
            Err(StoreError::ReportNotFound(_)) => {
                match reports.create_if_absent(user_id, session_id).await {
                    Ok(_) => None,
                    Err(StoreError::ReportAlreadyExists(_)) => {
                        Some(reports.get(session_id).await?)
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(existing) = existing {
            if existing.user_id != user_id {
                return Err(ReportError::Validation(
                    "Session belongs to a different user".to_string(),
                ));
            }
            if existing.status != ReportStatus::Pending {
                tracing::debug!(
                    session_id = %session_id,
                    status = %existing.status,
                    "Report already submitted"
                );
                return Ok(SubmissionAck {
                    session_id,
                    status: existing.status,
                });
            }
            tracing::debug!(session_id = %session_id, "Report pending, claiming generation");
        }

        match reports.claim_pending(session_id).await {
            Ok(generating) => {
                self.spawn_generation(user, session_id, generating.attempt).await;
                Ok(SubmissionAck {
                    session_id,
                    status: generating.status,
                })
            }
            // Another submit started generation first.
            Err(StoreError::InvalidTransition { from, .. }) => Ok(SubmissionAck {
                session_id,
                status: from,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Rerun generation for an existing report with the session's current
    /// answers and the user's current tags.
    pub async fn regenerate(&self, session_id: SessionId) -> Result<RegenerateOutcome> {
        let report = self.pipeline.reports.get(session_id).await?;

        if !self.regenerate_enabled {
            tracing::info!(session_id = %session_id, "Regenerate requested while disabled");
            return Ok(RegenerateOutcome::ManualReview {
                session_id,
                status: report.status,
                message: MANUAL_REVIEW_MESSAGE.to_string(),
            });
        }

        let user = self
            .users
            .find_by_id(report.user_id)
            .await?
            .ok_or(ReportError::UserNotFound(report.user_id))?;

        let generating = self
            .pipeline
            .reports
            .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
            .await?;
        self.spawn_generation(user, session_id, generating.attempt).await;

        Ok(RegenerateOutcome::Started(SubmissionAck {
            session_id,
            status: generating.status,
        }))
    }

    /// The client view of a report.
    pub async fn query(&self, session_id: SessionId) -> Result<ReportView> {
        let report = self.pipeline.reports.get(session_id).await?;

        Ok(match report.status {
            ReportStatus::Pending | ReportStatus::Generating => ReportView::Generating {
                session_id,
                message: GENERATING_MESSAGE.to_string(),
            },
            ReportStatus::Completed => {
                let preview = report.preview.ok_or_else(|| {
                    ReportError::Internal(format!("completed report {session_id} has no preview"))
                })?;
                ReportView::Completed {
                    session_id,
                    preview,
                    delivered: report.delivered,
                    generated_at: report.generated_at,
                }
            }
            ReportStatus::Failed => ReportView::Failed {
                session_id,
                message: report
                    .error_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| FAILED_FALLBACK_MESSAGE.to_string()),
            },
        })
    }
}
