//! Common test helpers for restack-providers integration tests
//!
//! Wiremock endpoints shaped like the Portainer and platform APIs.

use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use restack_core::ManualClock;
use restack_providers::PortainerClient;

pub const JWT: &str = "test-jwt";

// ─── Portainer Mocks ─────────────────────────────────────────────────────────

/// `POST /api/auth` answering a fixed token
pub async fn mock_auth_ok(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "jwt": JWT })))
        .mount(server)
        .await;
}

/// `GET /api/stacks` for the bearer token
#[allow(dead_code)]
pub async fn mock_stacks(server: &MockServer, stacks: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/api/stacks"))
        .and(header("Authorization", format!("Bearer {}", JWT).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(stacks))
        .mount(server)
        .await;
}

/// Client against `server` whose retries sleep on a manual clock
pub fn client(server: &MockServer) -> (PortainerClient, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new());
    let client = PortainerClient::new(server.uri(), false)
        .unwrap()
        .with_clock(clock.clone());
    (client, clock)
}
