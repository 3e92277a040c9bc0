use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::{repository::SessionRepository, types::SessionIdentity};
use crate::shared::AppError;

/// The slice of session handling live connections depend on
///
/// Issuing sessions belongs to the forum's HTTP API; this service only
/// resolves existing keys and records when a session ends.
pub struct SessionService {
    repository: Arc<dyn SessionRepository + Send + Sync>,
}

impl SessionService {
    pub fn new(repository: Arc<dyn SessionRepository + Send + Sync>) -> Self {
        Self { repository }
    }

    /// Resolves a session key to the user and session behind it
    ///
    /// Ended sessions still resolve, so a reloaded page can reconnect with
    /// the key it already holds.
    #[instrument(skip(self, session_key))]
    pub async fn resolve(&self, session_key: &str) -> Result<SessionIdentity, AppError> {
        let session = self
            .repository
            .get_session_by_key(session_key)
            .await?
            .ok_or_else(|| {
                warn!("Session key not found");
                AppError::Unauthorized("user not found".to_string())
            })?;

        let user = self
            .repository
            .get_user(session.user_id)
            .await?
            .ok_or_else(|| {
                warn!(
                    session_id = session.id,
                    user_id = session.user_id,
                    "Session points at a missing user"
                );
                AppError::Unauthorized("user not found".to_string())
            })?;

        info!(
            session_id = session.id,
            user_id = user.id,
            "Session key resolved"
        );

        Ok(SessionIdentity {
            user_id: user.id,
            session_id: session.id,
            session_key: session.session_key,
            nickname: user.nickname,
            last_nickname_change: user.last_nickname_change,
        })
    }

    /// Records that the session's live connection went away
    #[instrument(skip(self))]
    pub async fn end_session(&self, session_id: u64) -> Result<(), AppError> {
        self.repository.mark_session_ended(session_id).await
    }
}
