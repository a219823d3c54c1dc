//! Survey answer persistence.
//!
//! Answers are keyed by `(session_id, question_id)`. Writes use
//! `INSERT … ON CONFLICT DO UPDATE` so that concurrent writers for the same
//! key leave a single last-writer-wins row.

use async_trait::async_trait;
use rusqlite::params;

use awareness_core::types::{Answer, AnswerPayload, QuestionId, SessionId, UserId};

use crate::client::{parse_ts, parse_uuid, ts, Result, SqliteStore};
use crate::AnswerRepository;

#[async_trait]
impl AnswerRepository for SqliteStore {
    async fn upsert(&self, answer: &Answer) -> Result<()> {
        let payload = serde_json::to_string(&answer.payload)?;
        let session_id = answer.session_id;
        let user_id = answer.user_id;
        let question_id = answer.question_id;
        let answered_at = ts(&answer.answered_at);

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO survey_answers (session_id, question_id, user_id, payload, answered_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(session_id, question_id) DO UPDATE SET
                   payload = excluded.payload,
                   answered_at = excluded.answered_at",
                params![
                    session_id.to_string(),
                    question_id.0,
                    user_id.to_string(),
                    payload,
                    answered_at
                ],
            )?;
            tracing::debug!(session_id = %session_id, question_id = %question_id, "Answer saved");
            Ok(())
        })
        .await
    }

    async fn list(&self, session_id: SessionId) -> Result<Vec<Answer>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT question_id, user_id, payload, answered_at
                 FROM survey_answers
                 WHERE session_id = ?1
                 ORDER BY question_id ASC",
            )?;

            let rows = stmt
                .query_map(params![session_id.to_string()], |row| {
                    Ok((
                        row.get::<_, u32>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            rows.into_iter()
                .map(|(question_id, user_id, payload, answered_at)| -> Result<Answer> {
                    Ok(Answer {
                        session_id,
                        user_id: UserId(parse_uuid(&user_id)?),
                        question_id: QuestionId(question_id),
                        payload: serde_json::from_str::<AnswerPayload>(&payload)?,
                        answered_at: parse_ts(&answered_at)?,
                    })
                })
                .collect()
        })
        .await
    }
}
