//! Reconciliation of abandoned generations.
//!
//! A report left in `PENDING` or `GENERATING` past the provider timeout plus
//! grace can no longer complete (its task was lost to a crash or restart, or
//! never started). The sweep marks such reports `FAILED` with the timeout
//! message so clients can regenerate.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;

use awareness_core::types::ReportStatus;
use awareness_store::{ReportRepository, StoreError, TransitionPayload};

use crate::error::Result;

const TIMEOUT_MESSAGE: &str = "Report generation timed out, please try again";

/// Fail every report stuck in flight for longer than `abandon_after`.
/// Returns how many reports were failed.
pub async fn run_sweep_once(
    reports: &dyn ReportRepository,
    abandon_after: Duration,
) -> Result<usize> {
    // A window reaching past the representable past leaves nothing stale.
    let Some(cutoff) = chrono::Duration::from_std(abandon_after)
        .ok()
        .and_then(|max_age| Utc::now().checked_sub_signed(max_age))
    else {
        return Ok(0);
    };

    let stale = reports.list_stale_in_flight(cutoff).await?;
    let mut failed = 0;

    for report in stale {
        let payload = TransitionPayload::Failed {
            attempt: Some(report.attempt),
            message: TIMEOUT_MESSAGE.to_string(),
            detail: Some(format!(
                "no result within {}s of entering {}",
                abandon_after.as_secs(),
                report.status
            )),
        };
        match reports
            .transition(report.session_id, ReportStatus::Failed, payload)
            .await
        {
            Ok(_) => {
                failed += 1;
                tracing::warn!(
                    session_id = %report.session_id,
                    attempt = report.attempt,
                    from = %report.status,
                    since = %report.updated_at,
                    "Abandoned generation marked failed"
                );
            }
            // Finished or regenerated since it was listed.
            Err(StoreError::InvalidTransition { .. }) => {}
            Err(e) => return Err(e.into()),
        }
    }

    if failed > 0 {
        tracing::info!(failed, "Sweep finished");
    }
    Ok(failed)
}

/// Run the sweep on a fixed interval until the runtime shuts down.
pub async fn run_sweep_daemon(
    reports: Arc<dyn ReportRepository>,
    abandon_after: Duration,
    every: Duration,
) {
    let mut ticker = interval(every);
    tracing::info!(interval_secs = every.as_secs(), "Sweep daemon started");

    loop {
        ticker.tick().await;
        if let Err(e) = run_sweep_once(reports.as_ref(), abandon_after).await {
            tracing::error!(error = %e, "Sweep failed");
        }
    }
}
