use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::{debug, instrument, warn};

use super::models::{SessionModel, UserModel};
use crate::shared::AppError;

/// Trait for session repository operations
#[async_trait]
pub trait SessionRepository {
    async fn get_session_by_key(&self, session_key: &str)
        -> Result<Option<SessionModel>, AppError>;
    async fn get_user(&self, user_id: u64) -> Result<Option<UserModel>, AppError>;
    async fn mark_session_ended(&self, session_id: u64) -> Result<(), AppError>;
}

/// In-memory implementation of SessionRepository for development and testing
///
/// Sessions and users are issued elsewhere; this store only has to be seeded.
/// Data is lost when the application restarts.
pub struct InMemorySessionRepository {
    sessions: Mutex<HashMap<u64, SessionModel>>,
    users: Mutex<HashMap<u64, UserModel>>,
}

impl Default for InMemorySessionRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionRepository {
    /// Creates a new empty in-memory repository
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            users: Mutex::new(HashMap::new()),
        }
    }

    /// Creates an in-memory repository with pre-populated users and sessions
    pub fn with_data(users: Vec<UserModel>, sessions: Vec<SessionModel>) -> Self {
        let repo = Self::new();
        for user in users {
            repo.insert_user(user);
        }
        for session in sessions {
            repo.insert_session(session);
        }
        repo
    }

    pub fn insert_user(&self, user: UserModel) {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user.id, user);
    }

    pub fn insert_session(&self, session: SessionModel) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id, session);
    }

    /// When the session was marked ended, if it was (useful in tests)
    pub fn ended_at(&self, session_id: u64) -> Option<DateTime<Utc>> {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&session_id)
            .and_then(|session| session.ended_at)
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    #[instrument(skip(self, session_key))]
    async fn get_session_by_key(
        &self,
        session_key: &str,
    ) -> Result<Option<SessionModel>, AppError> {
        let sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        let session = sessions
            .values()
            .find(|session| session.session_key == session_key)
            .cloned();

        match &session {
            Some(s) => debug!(session_id = s.id, user_id = s.user_id, "Session found in memory"),
            None => debug!("Session not found in memory"),
        }

        Ok(session)
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: u64) -> Result<Option<UserModel>, AppError> {
        let users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(&user_id).cloned())
    }

    #[instrument(skip(self))]
    async fn mark_session_ended(&self, session_id: u64) -> Result<(), AppError> {
        debug!(session_id = session_id, "Marking session ended in memory");

        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        match sessions.get_mut(&session_id) {
            Some(session) => {
                session.ended_at = Some(Utc::now());
                Ok(())
            }
            None => {
                warn!(session_id = session_id, "Session not found for ending in memory");
                Err(AppError::NotFound("Session not found".to_string()))
            }
        }
    }
}

/// PostgreSQL implementation of session repository
///
/// Reads the forum's `sessions` and `users` tables; ids are BIGINT columns.
pub struct PostgresSessionRepository {
    pool: PgPool,
}

impl PostgresSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_u64(value: i64, column: &str) -> Result<u64, AppError> {
    u64::try_from(value)
        .map_err(|_| AppError::DatabaseError(format!("negative {} in database: {}", column, value)))
}

fn session_from_row(row: &PgRow) -> Result<SessionModel, AppError> {
    let db_err = |e: sqlx::Error| AppError::DatabaseError(e.to_string());

    Ok(SessionModel {
        id: to_u64(row.try_get("id").map_err(db_err)?, "id")?,
        session_key: row.try_get("session_key").map_err(db_err)?,
        user_id: to_u64(row.try_get("user_id").map_err(db_err)?, "user_id")?,
        started_at: row.try_get("started_at").map_err(db_err)?,
        ended_at: row.try_get("ended_at").map_err(db_err)?,
        user_agent: row.try_get("user_agent").map_err(db_err)?,
    })
}

#[async_trait]
impl SessionRepository for PostgresSessionRepository {
    #[instrument(skip(self, session_key))]
    async fn get_session_by_key(
        &self,
        session_key: &str,
    ) -> Result<Option<SessionModel>, AppError> {
        debug!("Fetching session from database");

        let row = sqlx::query(
            "SELECT id, session_key, user_id, started_at, ended_at, user_agent FROM sessions WHERE session_key = $1",
        )
        .bind(session_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to fetch session from database");
            AppError::DatabaseError(e.to_string())
        })?;

        row.as_ref().map(session_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: u64) -> Result<Option<UserModel>, AppError> {
        debug!(user_id = user_id, "Fetching user from database");

        let id = i64::try_from(user_id)
            .map_err(|_| AppError::DatabaseError(format!("user id out of range: {}", user_id)))?;

        let row = sqlx::query("SELECT id, nickname, last_nickname_change FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                warn!(error = %e, user_id = user_id, "Failed to fetch user from database");
                AppError::DatabaseError(e.to_string())
            })?;

        let Some(row) = row else {
            debug!(user_id = user_id, "User not found in database");
            return Ok(None);
        };

        let db_err = |e: sqlx::Error| AppError::DatabaseError(e.to_string());
        Ok(Some(UserModel {
            id: to_u64(row.try_get("id").map_err(db_err)?, "id")?,
            nickname: row.try_get("nickname").map_err(db_err)?,
            last_nickname_change: row.try_get("last_nickname_change").map_err(db_err)?,
        }))
    }

    #[instrument(skip(self))]
    async fn mark_session_ended(&self, session_id: u64) -> Result<(), AppError> {
        debug!(session_id = session_id, "Marking session ended in database");

        let id = i64::try_from(session_id).map_err(|_| {
            AppError::DatabaseError(format!("session id out of range: {}", session_id))
        })?;

        let result =
            sqlx::query("UPDATE sessions SET ended_at = $2, updated_at = $2 WHERE id = $1")
                .bind(id)
                .bind(Utc::now())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    warn!(error = %e, session_id = session_id, "Failed to end session in database");
                    AppError::DatabaseError(e.to_string())
                })?;

        if result.rows_affected() == 0 {
            warn!(session_id = session_id, "Session not found for ending");
            return Err(AppError::NotFound("Session not found".to_string()));
        }

        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// Test helper functions for creating test data
    mod helpers {
        use super::*;

        pub fn seeded_repository() -> InMemorySessionRepository {
            InMemorySessionRepository::with_data(
                vec![UserModel::new(1, "Fox"), UserModel::new(2, "Owl")],
                vec![
                    SessionModel::new(10, "key-fox", 1),
                    SessionModel::new(20, "key-owl", 2),
                ],
            )
        }
    }

    use helpers::*;

    #[tokio::test]
    async fn test_get_session_by_key() {
        let repo = seeded_repository();

        let session = repo.get_session_by_key("key-owl").await.unwrap().unwrap();
        assert_eq!(session.id, 20);
        assert_eq!(session.user_id, 2);
    }

    #[tokio::test]
    async fn test_get_unknown_session_key() {
        let repo = seeded_repository();

        let result = repo.get_session_by_key("nope").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_user() {
        let repo = seeded_repository();

        assert_eq!(repo.get_user(1).await.unwrap().unwrap().nickname, "Fox");
        assert!(repo.get_user(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_mark_session_ended() {
        let repo = seeded_repository();
        assert!(repo.ended_at(10).is_none());

        repo.mark_session_ended(10).await.unwrap();

        assert!(repo.ended_at(10).is_some());
        assert!(repo.ended_at(20).is_none());
    }

    #[tokio::test]
    async fn test_mark_unknown_session_ended() {
        let repo = seeded_repository();

        let result = repo.mark_session_ended(404).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
