use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::models::{SessionModel, UserModel};
use super::repository::InMemorySessionRepository;
use crate::shared::AppError;

/// Users and sessions bundled for running without a database
const DEV_SEED: &str = include_str!("../../fixtures/dev_seed.json");

/// Initial contents for the in-memory session store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub users: Vec<UserModel>,
    #[serde(default)]
    pub sessions: Vec<SessionModel>,
}

impl SeedData {
    /// Loads seed data from `path`, or the bundled development set when `None`
    pub async fn load(path: Option<&str>) -> Result<Self, AppError> {
        match path {
            Some(path) => {
                let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
                    warn!(path = %path, error = %e, "Failed to read seed file");
                    AppError::DatabaseError(format!("cannot read seed file {}: {}", path, e))
                })?;
                Self::from_json(&raw)
            }
            None => Self::from_json(DEV_SEED),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::DatabaseError(format!("invalid seed data: {}", e)))
    }

    /// Builds a store holding every seeded user and session
    pub fn into_repository(self) -> InMemorySessionRepository {
        info!(
            users_count = self.users.len(),
            sessions_count = self.sessions.len(),
            "Seeded in-memory session store"
        );
        InMemorySessionRepository::with_data(self.users, self.sessions)
    }
}
