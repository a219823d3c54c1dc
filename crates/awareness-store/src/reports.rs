//! Report record persistence and the report state machine.
//!
//! Every transition is a single compare-and-set `UPDATE … WHERE status IN (…)`
//! inside an immediate transaction, so two callers racing for the same edge
//! cannot both succeed. Completion and failure additionally name the
//! generation attempt they belong to; a late result from a superseded attempt
//! is rejected instead of overwriting newer state.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

use awareness_core::types::{
    FullAnalysis, Report, ReportPreview, ReportStatus, SessionId, UserId,
};

use crate::client::{
    constraint_violation, parse_ts, parse_uuid, ts, Result, SqliteStore, StoreError, Violation,
};
use crate::{ReportRepository, TransitionPayload};

const REPORT_COLUMNS: &str = "session_id, user_id, status, preview, analysis, error_message, \
     error_detail, delivered, delivery_error, attempt, created_at, updated_at, generated_at";

struct RawReportRow {
    session_id: String,
    user_id: String,
    status: String,
    preview: Option<String>,
    analysis: Option<String>,
    error_message: Option<String>,
    error_detail: Option<String>,
    delivered: bool,
    delivery_error: Option<String>,
    attempt: u32,
    created_at: String,
    updated_at: String,
    generated_at: Option<String>,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawReportRow> {
    Ok(RawReportRow {
        session_id: row.get(0)?,
        user_id: row.get(1)?,
        status: row.get(2)?,
        preview: row.get(3)?,
        analysis: row.get(4)?,
        error_message: row.get(5)?,
        error_detail: row.get(6)?,
        delivered: row.get(7)?,
        delivery_error: row.get(8)?,
        attempt: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        generated_at: row.get(12)?,
    })
}

fn parse_row(raw: RawReportRow) -> Result<Report> {
    let status = raw
        .status
        .parse::<ReportStatus>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let preview = raw
        .preview
        .as_deref()
        .map(serde_json::from_str::<ReportPreview>)
        .transpose()?;
    let analysis = raw
        .analysis
        .as_deref()
        .map(serde_json::from_str::<FullAnalysis>)
        .transpose()?;

    Ok(Report {
        session_id: SessionId(parse_uuid(&raw.session_id)?),
        user_id: UserId(parse_uuid(&raw.user_id)?),
        status,
        preview,
        analysis,
        error_message: raw.error_message,
        error_detail: raw.error_detail,
        delivered: raw.delivered,
        delivery_error: raw.delivery_error,
        attempt: raw.attempt,
        created_at: parse_ts(&raw.created_at)?,
        updated_at: parse_ts(&raw.updated_at)?,
        generated_at: raw.generated_at.as_deref().map(parse_ts).transpose()?,
    })
}

fn select(conn: &Connection, session_id: SessionId) -> Result<Option<Report>> {
    let sql = format!("SELECT {REPORT_COLUMNS} FROM reports WHERE session_id = ?1");
    conn.query_row(&sql, params![session_id.to_string()], read_row)
        .optional()?
        .map(parse_row)
        .transpose()
}

/// `'PENDING', 'FAILED'` style list for an `IN (…)` clause.
fn status_list(statuses: &[ReportStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl SqliteStore {
    /// Compare-and-set move to `new_status` from any of `allowed`.
    async fn apply(
        &self,
        session_id: SessionId,
        new_status: ReportStatus,
        allowed: &[ReportStatus],
        payload: TransitionPayload,
    ) -> Result<Report> {
        if payload.target() != new_status {
            return Err(StoreError::PayloadMismatch(new_status));
        }

        let (analysis_json, preview_json) = match &payload {
            TransitionPayload::Completed {
                analysis, preview, ..
            } => (
                Some(serde_json::to_string(analysis)?),
                Some(serde_json::to_string(preview)?),
            ),
            _ => (None, None),
        };

        let allowed = status_list(allowed);
        self.with_conn(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let sid = session_id.to_string();
            let now = ts(&Utc::now());

            let changed = match &payload {
                TransitionPayload::None => tx.execute(
                    &format!(
                        "UPDATE reports SET
                           status = ?2, attempt = attempt + 1,
                           error_message = NULL, error_detail = NULL,
                           delivered = 0, delivery_error = NULL,
                           updated_at = ?3
                         WHERE session_id = ?1 AND status IN ({allowed})"
                    ),
                    params![sid, new_status.as_str(), now],
                )?,
                TransitionPayload::Completed { attempt, .. } => tx.execute(
                    &format!(
                        "UPDATE reports SET
                           status = ?2, analysis = ?3, preview = ?4,
                           generated_at = ?5, updated_at = ?5
                         WHERE session_id = ?1 AND status IN ({allowed}) AND attempt = ?6"
                    ),
                    params![
                        sid,
                        new_status.as_str(),
                        analysis_json,
                        preview_json,
                        now,
                        attempt
                    ],
                )?,
                TransitionPayload::Failed {
                    attempt,
                    message,
                    detail,
                } => tx.execute(
                    &format!(
                        "UPDATE reports SET
                           status = ?2, error_message = ?3, error_detail = ?4,
                           updated_at = ?5
                         WHERE session_id = ?1 AND status IN ({allowed})
                           AND (?6 IS NULL OR attempt = ?6)"
                    ),
                    params![sid, new_status.as_str(), message, detail, now, attempt],
                )?,
            };

            let current = select(&tx, session_id)?.ok_or(StoreError::ReportNotFound(session_id))?;
            if changed == 0 {
                tracing::warn!(
                    session_id = %session_id,
                    from = %current.status,
                    to = %new_status,
                    attempt = current.attempt,
                    "Rejected report transition"
                );
                return Err(StoreError::InvalidTransition {
                    session_id,
                    from: current.status,
                    to: new_status,
                });
            }
            tx.commit()?;

            tracing::info!(
                session_id = %session_id,
                status = %current.status,
                attempt = current.attempt,
                "Report transitioned"
            );
            Ok(current)
        })
        .await
    }
}

/// Turn a zero-row delivery update into `StaleAttempt` or `ReportNotFound`.
fn attempt_guard(
    conn: &Connection,
    session_id: SessionId,
    attempt: u32,
    changed: usize,
) -> Result<()> {
    if changed > 0 {
        return Ok(());
    }
    match select(conn, session_id)? {
        Some(_) => Err(StoreError::StaleAttempt {
            session_id,
            attempt,
        }),
        None => Err(StoreError::ReportNotFound(session_id)),
    }
}

#[async_trait]
impl ReportRepository for SqliteStore {
    async fn create_if_absent(&self, user_id: UserId, session_id: SessionId) -> Result<Report> {
        self.with_conn(move |conn| {
            let now = ts(&Utc::now());
            let inserted = conn.execute(
                "INSERT INTO reports (session_id, user_id, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                params![
                    session_id.to_string(),
                    user_id.to_string(),
                    ReportStatus::Pending.as_str(),
                    now
                ],
            );

            match inserted {
                Ok(_) => {}
                Err(e) => {
                    return Err(match constraint_violation(&e) {
                        Some(Violation::Unique) => StoreError::ReportAlreadyExists(session_id),
                        Some(Violation::ForeignKey) => StoreError::UserNotFound(user_id),
                        None => StoreError::Sqlite(e),
                    })
                }
            }

            tracing::info!(session_id = %session_id, user_id = %user_id, "Report record created");
            select(conn, session_id)?.ok_or(StoreError::ReportNotFound(session_id))
        })
        .await
    }

    async fn transition(
        &self,
        session_id: SessionId,
        new_status: ReportStatus,
        payload: TransitionPayload,
    ) -> Result<Report> {
        let allowed = ReportStatus::predecessors(new_status);
        self.apply(session_id, new_status, &allowed, payload).await
    }

    async fn claim_pending(&self, session_id: SessionId) -> Result<Report> {
        self.apply(
            session_id,
            ReportStatus::Generating,
            &[ReportStatus::Pending],
            TransitionPayload::None,
        )
        .await
    }

    async fn get(&self, session_id: SessionId) -> Result<Report> {
        self.with_conn(move |conn| {
            select(conn, session_id)?.ok_or(StoreError::ReportNotFound(session_id))
        })
        .await
    }

    async fn mark_delivered(&self, session_id: SessionId, attempt: u32) -> Result<()> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE reports SET delivered = 1, delivery_error = NULL
                 WHERE session_id = ?1 AND attempt = ?2",
                params![session_id.to_string(), attempt],
            )?;
            attempt_guard(conn, session_id, attempt, changed)
        })
        .await
    }

    async fn record_delivery_failure(
        &self,
        session_id: SessionId,
        attempt: u32,
        error: &str,
    ) -> Result<()> {
        let error = error.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE reports SET delivery_error = ?3 WHERE session_id = ?1 AND attempt = ?2",
                params![session_id.to_string(), attempt, error],
            )?;
            attempt_guard(conn, session_id, attempt, changed)
        })
        .await
    }

    async fn list_stale_in_flight(&self, older_than: DateTime<Utc>) -> Result<Vec<Report>> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {REPORT_COLUMNS} FROM reports
                 WHERE status IN (?1, ?2) AND updated_at < ?3
                 ORDER BY updated_at ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let raw = stmt
                .query_map(
                    params![
                        ReportStatus::Pending.as_str(),
                        ReportStatus::Generating.as_str(),
                        ts(&older_than)
                    ],
                    read_row,
                )?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raw.into_iter().map(parse_row).collect()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::UserRepository;
    use awareness_core::config::DatabaseConfig;
    use awareness_core::types::{EntryPoint, InvestorProfile, ProfileHighlights};
    use chrono::TimeDelta;

    fn sample_analysis() -> FullAnalysis {
        FullAnalysis {
            summary: "Calm under pressure".to_string(),
            investor_profile: InvestorProfile {
                risk_tolerance: "Medium".to_string(),
                investment_style: "Balanced".to_string(),
                time_horizon: "Long".to_string(),
                emotional_pattern: "Rational".to_string(),
            },
            blind_spots: vec!["Overtrading".to_string()],
            strengths: vec!["Patience".to_string()],
            recommendations: vec!["Journal decisions".to_string()],
            full_analysis: "Long form".to_string(),
        }
    }

    fn sample_preview() -> ReportPreview {
        ReportPreview {
            summary: "Calm under pressure".to_string(),
            key_insights: vec!["Overtrading".to_string(), "Patience".to_string()],
            profile_highlights: ProfileHighlights {
                risk_level: "Medium".to_string(),
                style: "Balanced".to_string(),
            },
        }
    }

    fn completed(attempt: u32) -> TransitionPayload {
        TransitionPayload::Completed {
            attempt,
            analysis: sample_analysis(),
            preview: sample_preview(),
        }
    }

    fn failed(attempt: Option<u32>) -> TransitionPayload {
        TransitionPayload::Failed {
            attempt,
            message: "Report generation failed, please try again".to_string(),
            detail: Some("provider returned HTTP 502".to_string()),
        }
    }

    async fn setup(store: &SqliteStore) -> UserId {
        let (user, _) = store
            .create_or_get("reports@example.com", EntryPoint::Mbti)
            .await
            .unwrap();
        user.id
    }

    #[tokio::test]
    async fn create_is_exactly_once() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = setup(&store).await;
        let session_id = SessionId::new();

        let report = store.create_if_absent(user_id, session_id).await.unwrap();
        assert_eq!(report.status, ReportStatus::Pending);
        assert_eq!(report.attempt, 0);
        assert!(!report.delivered);

        let again = store.create_if_absent(user_id, session_id).await;
        assert!(matches!(again, Err(StoreError::ReportAlreadyExists(s)) if s == session_id));
    }

    #[tokio::test]
    async fn create_for_unknown_user() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store.create_if_absent(UserId::new(), SessionId::new()).await;
        assert!(matches!(result, Err(StoreError::UserNotFound(_))));
    }

    #[tokio::test]
    async fn happy_path_lifecycle() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = setup(&store).await;
        let session_id = SessionId::new();
        store.create_if_absent(user_id, session_id).await.unwrap();

        let generating = store
            .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
            .await
            .unwrap();
        assert_eq!(generating.status, ReportStatus::Generating);
        assert_eq!(generating.attempt, 1);

        let done = store
            .transition(session_id, ReportStatus::Completed, completed(1))
            .await
            .unwrap();
        assert_eq!(done.status, ReportStatus::Completed);
        assert_eq!(done.preview, Some(sample_preview()));
        assert_eq!(done.analysis, Some(sample_analysis()));
        assert!(done.generated_at.is_some());

        store.mark_delivered(session_id, 1).await.unwrap();
        assert!(store.get(session_id).await.unwrap().delivered);
    }

    #[tokio::test]
    async fn disallowed_edges_are_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = setup(&store).await;
        let session_id = SessionId::new();
        store.create_if_absent(user_id, session_id).await.unwrap();

        let skip = store
            .transition(session_id, ReportStatus::Completed, completed(0))
            .await;
        assert!(matches!(
            skip,
            Err(StoreError::InvalidTransition {
                from: ReportStatus::Pending,
                to: ReportStatus::Completed,
                ..
            })
        ));

        store
            .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
            .await
            .unwrap();
        let twice = store
            .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
            .await;
        assert!(matches!(
            twice,
            Err(StoreError::InvalidTransition {
                from: ReportStatus::Generating,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn payload_must_match_status() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store
            .transition(SessionId::new(), ReportStatus::Completed, TransitionPayload::None)
            .await;
        assert!(matches!(
            result,
            Err(StoreError::PayloadMismatch(ReportStatus::Completed))
        ));
    }

    #[tokio::test]
    async fn transition_missing_report() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store
            .transition(SessionId::new(), ReportStatus::Generating, TransitionPayload::None)
            .await;
        assert!(matches!(result, Err(StoreError::ReportNotFound(_))));
        assert!(matches!(
            store.get(SessionId::new()).await,
            Err(StoreError::ReportNotFound(_))
        ));
    }

    #[tokio::test]
    async fn regenerate_clears_errors_and_rejects_stale_attempts() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = setup(&store).await;
        let session_id = SessionId::new();
        store.create_if_absent(user_id, session_id).await.unwrap();

        store
            .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
            .await
            .unwrap();
        let failed_report = store
            .transition(session_id, ReportStatus::Failed, failed(Some(1)))
            .await
            .unwrap();
        assert!(failed_report.error_message.is_some());

        let regenerating = store
            .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
            .await
            .unwrap();
        assert_eq!(regenerating.attempt, 2);
        assert!(regenerating.error_message.is_none());
        assert!(regenerating.error_detail.is_none());

        // A late result from attempt 1 must not land on attempt 2.
        let stale = store
            .transition(session_id, ReportStatus::Completed, completed(1))
            .await;
        assert!(matches!(stale, Err(StoreError::InvalidTransition { .. })));

        let fresh = store
            .transition(session_id, ReportStatus::Completed, completed(2))
            .await
            .unwrap();
        assert_eq!(fresh.status, ReportStatus::Completed);
    }

    #[tokio::test]
    async fn completed_report_can_be_regenerated() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = setup(&store).await;
        let session_id = SessionId::new();
        store.create_if_absent(user_id, session_id).await.unwrap();
        store
            .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
            .await
            .unwrap();
        store
            .transition(session_id, ReportStatus::Completed, completed(1))
            .await
            .unwrap();
        store.mark_delivered(session_id, 1).await.unwrap();

        let again = store
            .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
            .await
            .unwrap();
        assert_eq!(again.attempt, 2);
        assert!(!again.delivered);
    }

    #[tokio::test]
    async fn delivery_failure_does_not_touch_status() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = setup(&store).await;
        let session_id = SessionId::new();
        store.create_if_absent(user_id, session_id).await.unwrap();
        store
            .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
            .await
            .unwrap();
        store
            .transition(session_id, ReportStatus::Completed, completed(1))
            .await
            .unwrap();

        store
            .record_delivery_failure(session_id, 1, "smtp timeout")
            .await
            .unwrap();
        let report = store.get(session_id).await.unwrap();
        assert_eq!(report.status, ReportStatus::Completed);
        assert!(!report.delivered);
        assert_eq!(report.delivery_error.as_deref(), Some("smtp timeout"));
    }

    #[tokio::test]
    async fn stale_generating_listing_and_unconditional_fail() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = setup(&store).await;
        let session_id = SessionId::new();
        store.create_if_absent(user_id, session_id).await.unwrap();
        store
            .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
            .await
            .unwrap();

        let past = Utc::now() - TimeDelta::minutes(10);
        assert!(store.list_stale_in_flight(past).await.unwrap().is_empty());

        let future = Utc::now() + TimeDelta::minutes(10);
        let stale = store.list_stale_in_flight(future).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].session_id, session_id);

        let swept = store
            .transition(session_id, ReportStatus::Failed, failed(None))
            .await
            .unwrap();
        assert_eq!(swept.status, ReportStatus::Failed);
        assert!(store.list_stale_in_flight(future).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn claim_pending_only_from_pending() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = setup(&store).await;
        let session_id = SessionId::new();
        store.create_if_absent(user_id, session_id).await.unwrap();

        let claimed = store.claim_pending(session_id).await.unwrap();
        assert_eq!(claimed.status, ReportStatus::Generating);
        assert_eq!(claimed.attempt, 1);

        store
            .transition(session_id, ReportStatus::Failed, failed(Some(1)))
            .await
            .unwrap();
        // A failed report is only restarted by an explicit regenerate.
        let late = store.claim_pending(session_id).await;
        assert!(matches!(
            late,
            Err(StoreError::InvalidTransition {
                from: ReportStatus::Failed,
                to: ReportStatus::Generating,
                ..
            })
        ));
        assert_eq!(store.get(session_id).await.unwrap().attempt, 1);
    }

    #[tokio::test]
    async fn delivery_from_superseded_attempt_is_rejected() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = setup(&store).await;
        let session_id = SessionId::new();
        store.create_if_absent(user_id, session_id).await.unwrap();
        store.claim_pending(session_id).await.unwrap();
        store
            .transition(session_id, ReportStatus::Completed, completed(1))
            .await
            .unwrap();

        // Regenerate starts attempt 2 while attempt 1's email is in flight.
        store
            .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
            .await
            .unwrap();

        let marked = store.mark_delivered(session_id, 1).await;
        assert!(matches!(
            marked,
            Err(StoreError::StaleAttempt { attempt: 1, .. })
        ));
        let recorded = store
            .record_delivery_failure(session_id, 1, "smtp timeout")
            .await;
        assert!(matches!(recorded, Err(StoreError::StaleAttempt { .. })));

        let report = store.get(session_id).await.unwrap();
        assert!(!report.delivered);
        assert!(report.delivery_error.is_none());

        assert!(matches!(
            store.mark_delivered(SessionId::new(), 1).await,
            Err(StoreError::ReportNotFound(_))
        ));
    }

    #[tokio::test]
    async fn stale_listing_includes_never_started_reports() {
        let store = SqliteStore::in_memory().unwrap();
        let user_id = setup(&store).await;
        let session_id = SessionId::new();
        store.create_if_absent(user_id, session_id).await.unwrap();

        let future = Utc::now() + TimeDelta::minutes(10);
        let stale = store.list_stale_in_flight(future).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].status, ReportStatus::Pending);
        assert_eq!(stale[0].attempt, 0);

        let closed = store
            .transition(session_id, ReportStatus::Failed, failed(Some(0)))
            .await
            .unwrap();
        assert_eq!(closed.status, ReportStatus::Failed);
        assert!(store.list_stale_in_flight(future).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_creates_and_starts_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(&DatabaseConfig {
            path: dir.path().join("race.db").to_string_lossy().to_string(),
            max_connections: 8,
            busy_timeout_ms: 5000,
        })
        .unwrap();
        let user_id = setup(&store).await;
        let session_id = SessionId::new();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create_if_absent(user_id, session_id).await
            }));
        }
        let mut created = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(StoreError::ReportAlreadyExists(_)) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(created, 1);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .transition(session_id, ReportStatus::Generating, TransitionPayload::None)
                    .await
            }));
        }
        let mut started = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => started += 1,
                Err(StoreError::InvalidTransition { .. }) => {}
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(started, 1);
        assert_eq!(store.get(session_id).await.unwrap().attempt, 1);
    }
}
