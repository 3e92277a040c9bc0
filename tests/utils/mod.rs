pub mod assertions;
pub mod mocks;
pub mod setup;

// Re-export main utilities for use by test files
#[allow(unused_imports)]
pub use assertions::{assert_no_message, eventually, next_message};
#[allow(unused_imports)]
pub use mocks::{CountingSessionRepository, MockEndpoint, RecordingCacheProvider};
#[allow(unused_imports)]
pub use setup::{TestClient, TestSetup, TestSetupBuilder};
