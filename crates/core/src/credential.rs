//! Candidate credential validation.

use std::fmt;

use thiserror::Error;

/// Shortest accepted credential, in bytes.
pub const MIN_CREDENTIAL_LEN: usize = 8;

/// Longest accepted credential, in bytes.
pub const MAX_CREDENTIAL_LEN: usize = 64;

/// Errors produced when a candidate credential is rejected before submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("credential is empty")]
    Empty,

    #[error("credential length {0} is outside 8..=64 bytes")]
    Length(usize),
}

/// A candidate credential whose length has been checked.
///
/// The value is never printed by `Debug`; use [`Credential::expose`] to get
/// at the raw string.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Validate a raw candidate. Length is counted in bytes, not characters.
    pub fn parse(raw: impl Into<String>) -> Result<Self, CredentialError> {
        let raw = raw.into();
        match raw.len() {
            0 => Err(CredentialError::Empty),
            n if !(MIN_CREDENTIAL_LEN..=MAX_CREDENTIAL_LEN).contains(&n) => {
                Err(CredentialError::Length(n))
            }
            _ => Ok(Self(raw)),
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credential(<{} bytes redacted>)", self.0.len())
    }
}
