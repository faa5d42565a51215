//! Error types for the mailbox module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while talking to the mailbox directory.
#[derive(Debug, Error)]
pub enum MailboxError {
    /// A filesystem operation failed.
    #[error("Failed to {action} {}", .path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A record with the generated ticket name already exists.
    #[error("Ticket identity collision: {name}")]
    Collision { name: String },
}

impl MailboxError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Whether the generated identity clashed with an existing record.
    pub fn is_collision(&self) -> bool {
        matches!(self, Self::Collision { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error_display() {
        let err = MailboxError::io(
            "create ticket",
            "/tmp/mailbox/psk-try_x",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "Failed to create ticket /tmp/mailbox/psk-try_x");
        assert!(std::error::Error::source(&err).is_some());
        assert!(!err.is_collision());
    }

    #[test]
    fn test_collision_display() {
        let err = MailboxError::Collision {
            name: "psk-try_a_b_1".to_string(),
        };
        assert!(err.to_string().contains("psk-try_a_b_1"));
        assert!(err.is_collision());
    }
}
