//! Verdict parsing and the mapping from handshake outcome to wire status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validator's answer for one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Invalid,
    Valid,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerdictError {
    #[error("malformed verdict token: {0:?}")]
    Malformed(String),
}

impl Verdict {
    /// Parse verdict record contents. Surrounding whitespace is ignored.
    pub fn parse(contents: &str) -> Result<Self, VerdictError> {
        match contents.trim() {
            "0" => Ok(Verdict::Invalid),
            "1" => Ok(Verdict::Valid),
            other => Err(VerdictError::Malformed(other.to_string())),
        }
    }

    /// The literal token the validator writes for this verdict.
    pub fn as_token(&self) -> &'static str {
        match self {
            Verdict::Invalid => "0",
            Verdict::Valid => "1",
        }
    }
}

/// Terminal result of one verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Credential failed length validation; no ticket was created.
    Rejected,
    /// Validator accepted the credential.
    Valid,
    /// Validator rejected the credential.
    Invalid,
    /// No verdict arrived before the deadline.
    TimedOut,
    /// A verdict arrived but was neither "0" nor "1" after trimming
    /// (whitespace-only and non-UTF-8 records included).
    Malformed,
}

impl Outcome {
    /// Wire status code. Malformed verdicts share code 3 with timeouts.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Outcome::Rejected => StatusCode::REJECTED,
            Outcome::Valid => StatusCode::VALID,
            Outcome::Invalid => StatusCode::INVALID,
            Outcome::TimedOut | Outcome::Malformed => StatusCode::TIMED_OUT,
        }
    }

    /// Label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Rejected => "rejected",
            Outcome::Valid => "valid",
            Outcome::Invalid => "invalid",
            Outcome::TimedOut => "timed_out",
            Outcome::Malformed => "malformed",
        }
    }
}

impl From<Verdict> for Outcome {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Valid => Outcome::Valid,
            Verdict::Invalid => Outcome::Invalid,
        }
    }
}

/// Response payload returned to the client: `{"status": n}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCode {
    pub status: i32,
}

impl StatusCode {
    pub const REJECTED: StatusCode = StatusCode { status: -1 };
    pub const VALID: StatusCode = StatusCode { status: 1 };
    pub const INVALID: StatusCode = StatusCode { status: 2 };
    pub const TIMED_OUT: StatusCode = StatusCode { status: 3 };
}
