//! User persistence.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use awareness_core::types::{EntryPoint, PersonalityTags, User, UserId};

use crate::client::{parse_ts, parse_uuid, ts, Result, SqliteStore, StoreError};
use crate::UserRepository;

const USER_COLUMNS: &str = "id, email, entry_point, mbti_type, zodiac_sign, created_at, updated_at";

struct RawUserRow {
    id: String,
    email: String,
    entry_point: String,
    mbti_type: Option<String>,
    zodiac_sign: Option<String>,
    created_at: String,
    updated_at: String,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawUserRow> {
    Ok(RawUserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        entry_point: row.get(2)?,
        mbti_type: row.get(3)?,
        zodiac_sign: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn parse_row(raw: RawUserRow) -> Result<User> {
    let entry_point = raw
        .entry_point
        .parse::<EntryPoint>()
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok(User {
        id: UserId(parse_uuid(&raw.id)?),
        email: raw.email,
        entry_point,
        mbti_type: raw.mbti_type,
        zodiac_sign: raw.zodiac_sign,
        created_at: parse_ts(&raw.created_at)?,
        updated_at: parse_ts(&raw.updated_at)?,
    })
}

fn select_by(conn: &Connection, column: &str, value: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    conn.query_row(&sql, params![value], read_row)
        .optional()?
        .map(parse_row)
        .transpose()
}

#[async_trait]
impl UserRepository for SqliteStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>> {
        self.with_conn(move |conn| select_by(conn, "id", &id.to_string()))
            .await
    }

    async fn create_or_get(&self, email: &str, entry_point: EntryPoint) -> Result<(User, bool)> {
        let email = email.to_string();
        self.with_conn(move |conn| {
            let now = ts(&Utc::now());
            let inserted = conn.execute(
                "INSERT INTO users (id, email, entry_point, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(email) DO NOTHING",
                params![UserId::new().to_string(), email, entry_point.as_str(), now],
            )?;

            let user = select_by(conn, "email", &email)?
                .ok_or_else(|| StoreError::Corrupt(format!("user row vanished for {email}")))?;

            if inserted == 1 {
                tracing::info!(user_id = %user.id, entry_point = %entry_point, "User created");
            }
            Ok((user, inserted == 1))
        })
        .await
    }

    async fn update_tags(&self, id: UserId, tags: &PersonalityTags) -> Result<User> {
        let tags = tags.clone();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE users SET
                   mbti_type = COALESCE(?2, mbti_type),
                   zodiac_sign = COALESCE(?3, zodiac_sign),
                   updated_at = ?4
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    tags.mbti_type,
                    tags.zodiac_sign,
                    ts(&Utc::now())
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::UserNotFound(id));
            }
            select_by(conn, "id", &id.to_string())?.ok_or(StoreError::UserNotFound(id))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_then_get_existing() {
        let store = SqliteStore::in_memory().unwrap();

        let (first, created) = store
            .create_or_get("ana@example.com", EntryPoint::Mbti)
            .await
            .unwrap();
        assert!(created);

        // Second contact keeps the original row and entry point.
        let (second, created) = store
            .create_or_get("ana@example.com", EntryPoint::Zodiac)
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.entry_point, EntryPoint::Mbti);

        let by_id = store.find_by_id(first.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "ana@example.com");
        assert!(store.find_by_id(UserId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_tags_is_partial() {
        let store = SqliteStore::in_memory().unwrap();
        let (user, _) = store
            .create_or_get("tags@example.com", EntryPoint::Classic)
            .await
            .unwrap();

        let updated = store
            .update_tags(
                user.id,
                &PersonalityTags {
                    mbti_type: Some("INTJ".to_string()),
                    zodiac_sign: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.mbti_type.as_deref(), Some("INTJ"));
        assert_eq!(updated.zodiac_sign, None);

        let updated = store
            .update_tags(
                user.id,
                &PersonalityTags {
                    mbti_type: None,
                    zodiac_sign: Some("Leo".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.mbti_type.as_deref(), Some("INTJ"));
        assert_eq!(updated.zodiac_sign.as_deref(), Some("Leo"));
    }

    #[tokio::test]
    async fn update_tags_unknown_user() {
        let store = SqliteStore::in_memory().unwrap();
        let result = store
            .update_tags(UserId::new(), &PersonalityTags::default())
            .await;
        assert!(matches!(result, Err(StoreError::UserNotFound(_))));
    }
}
