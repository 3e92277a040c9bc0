// Public API - what other modules can use
pub use models::{SessionModel, UserModel};
pub use repository::{InMemorySessionRepository, PostgresSessionRepository, SessionRepository};
pub use seed::SeedData;
pub use service::SessionService;
pub use types::SessionIdentity;

// Internal modules
pub mod models;
pub mod repository;
mod seed;
pub mod service;
mod types;
