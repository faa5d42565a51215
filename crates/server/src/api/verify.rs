//! Credential verification endpoint.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::StatusCode,
    Json,
};
use keycheck_core::StatusCode as VerifyStatus;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error};

use crate::state::AppState;

/// Request body: `{"psk": "<candidate>"}`
#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub psk: Option<String>,
}

/// Verify a candidate credential.
///
/// Always answers with one of the four status codes. A body that is not
/// JSON or has no string `psk` is treated like an out-of-range credential.
/// Storage failures answer 500 with status 3.
pub async fn verify(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    body: Bytes,
) -> (StatusCode, Json<VerifyStatus>) {
    let candidate = match serde_json::from_slice::<VerifyBody>(&body) {
        Ok(VerifyBody { psk: Some(psk) }) => psk,
        Ok(VerifyBody { psk: None }) => {
            debug!(%peer, "Verify request without psk");
            return (StatusCode::OK, Json(VerifyStatus::REJECTED));
        }
        Err(e) => {
            debug!(%peer, error = %e, "Unparseable verify request body");
            return (StatusCode::OK, Json(VerifyStatus::REJECTED));
        }
    };

    match state.verifier().verify(peer.ip(), &candidate).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome.status_code())),
        Err(e) => {
            error!(%peer, error = %e, "Verification failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(VerifyStatus::TIMED_OUT))
        }
    }
}
