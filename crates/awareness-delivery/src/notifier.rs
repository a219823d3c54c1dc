use std::sync::Arc;

use awareness_core::types::{FullAnalysis, SessionId, User};
use awareness_store::{ReportRepository, StoreError};

use crate::error::Result;
use crate::mailer::{DeliveryStatus, EmailMessage, Mailer};
use crate::template::render_report_html;

/// Sends completed reports and records the outcome on the report.
pub struct DeliveryNotifier {
    mailer: Arc<dyn Mailer>,
    reports: Arc<dyn ReportRepository>,
    subject: String,
}

impl DeliveryNotifier {
    pub fn new(
        mailer: Arc<dyn Mailer>,
        reports: Arc<dyn ReportRepository>,
        subject: impl Into<String>,
    ) -> Self {
        Self {
            mailer,
            reports,
            subject: subject.into(),
        }
    }

    /// Email the full analysis produced by generation `attempt` to `user`.
    ///
    /// A send failure is recorded in the report's `delivery_error` and then
    /// returned; report status is never touched. When the report has been
    /// regenerated since `attempt`, the outcome is logged and not recorded.
    pub async fn deliver(
        &self,
        session_id: SessionId,
        attempt: u32,
        user: &User,
        analysis: &FullAnalysis,
    ) -> Result<DeliveryStatus> {
        let message = EmailMessage {
            to: user.email.clone(),
            subject: self.subject.clone(),
            html: render_report_html(user, analysis),
        };

        match self.mailer.send(&message).await {
            Ok(DeliveryStatus::Sent { id }) => {
                let marked = self.reports.mark_delivered(session_id, attempt).await;
                skip_superseded(session_id, attempt, marked)?;
                Ok(DeliveryStatus::Sent { id })
            }
            Ok(DeliveryStatus::Logged) => Ok(DeliveryStatus::Logged),
            Err(e) => {
                tracing::warn!(
                    session_id = %session_id,
                    attempt,
                    mailer = self.mailer.name(),
                    error = %e,
                    "Report email failed"
                );
                let recorded = self
                    .reports
                    .record_delivery_failure(session_id, attempt, &e.to_string())
                    .await;
                skip_superseded(session_id, attempt, recorded)?;
                Err(e)
            }
        }
    }
}

fn skip_superseded(
    session_id: SessionId,
    attempt: u32,
    outcome: std::result::Result<(), StoreError>,
) -> std::result::Result<(), StoreError> {
    match outcome {
        Err(StoreError::StaleAttempt { .. }) => {
            tracing::info!(
                session_id = %session_id,
                attempt,
                "Report regenerated during delivery, outcome not recorded"
            );
            Ok(())
        }
        other => other,
    }
}
