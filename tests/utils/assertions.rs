//! Test assertion helpers
#![allow(dead_code)] // Test utilities may not all be used in every test

use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;

use super::setup::TestClient;

const WAIT: Duration = Duration::from_secs(1);

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Next message delivered to a client, parsed as JSON
pub async fn next_message(client: &mut TestClient) -> Value {
    let raw = tokio::time::timeout(WAIT, client.inbox.recv())
        .await
        .unwrap_or_else(|_| panic!("user {} received nothing in time", client.user_id))
        .expect("endpoint dropped");
    serde_json::from_str(&raw).expect("message should be JSON")
}

/// Asserts nothing is waiting in a client's inbox right now
pub fn assert_no_message(client: &mut TestClient) {
    match client.inbox.try_recv() {
        Err(TryRecvError::Empty) => {}
        Ok(message) => panic!(
            "user {} should not have received anything, got {}",
            client.user_id, message
        ),
        Err(TryRecvError::Disconnected) => panic!("endpoint dropped"),
    }
}

/// Polls `condition` until it holds, failing the test after a second
pub async fn eventually(mut condition: impl FnMut() -> bool, what: &str) {
    let reached = tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "timed out waiting for {}", what);
}
