//! Common test utilities for in-process HTTP testing.
//!
//! This module provides a test fixture that builds the real router over a
//! temporary mailbox directory, with a fixed client address injected in
//! place of a real connection.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::connect_info::MockConnectInfo;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use keycheck_core::{Config, FsMailbox, MailboxConfig, VerificationService};
use keycheck_server::api::create_router;
use keycheck_server::state::AppState;

/// Address every fixture request appears to come from.
pub const CLIENT_ADDR: ([u8; 4], u16) = ([10, 0, 0, 9], 40000);

/// Test fixture for in-process HTTP testing.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_short_psk() {
///     let fixture = TestFixture::new().await;
///
///     let response = fixture.post("/api/v1/verify", json!({ "psk": "short" })).await;
///
///     assert_eq!(response.body["status"], -1);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mailbox the router submits tickets to
    pub mailbox: Arc<FsMailbox>,
    /// Temporary directory holding the mailbox
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub text: String,
}

impl TestFixture {
    /// Create a fixture with a 3 s verdict timeout.
    pub async fn new() -> Self {
        Self::with_timeout(3000, 20).await
    }

    /// Create a fixture with custom handshake timing.
    pub async fn with_timeout(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let config = Config {
            mailbox: MailboxConfig {
                dir: temp_dir.path().join("psk_tries"),
                timeout_ms,
                poll_interval_ms,
                watch: false,
                ..Default::default()
            },
            ..Default::default()
        };

        let mailbox = Arc::new(
            FsMailbox::open(&config.mailbox)
                .await
                .expect("Failed to open mailbox"),
        );
        let verifier = VerificationService::new(Arc::clone(&mailbox), &config.mailbox);
        let state = Arc::new(AppState::new(config, verifier));

        let router = create_router(state).layer(MockConnectInfo(SocketAddr::from(CLIENT_ADDR)));

        Self {
            router,
            mailbox,
            temp_dir,
        }
    }

    /// Names of all files currently in the mailbox, sorted.
    pub fn records(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.mailbox.dir())
            .expect("Failed to list mailbox")
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, Body::empty(), None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request(
            "POST",
            path,
            Body::from(body.to_string()),
            Some("application/json"),
        )
        .await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        self.request(
            "POST",
            path,
            Body::from(body.to_string()),
            Some("application/json"),
        )
        .await
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Body,
        content_type: Option<&str>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        if let Some(content_type) = content_type {
            request_builder = request_builder.header("Content-Type", content_type);
        }
        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let text = String::from_utf8_lossy(&body_bytes).into_owned();
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body, text }
    }
}
