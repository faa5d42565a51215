//! Core ticket data types.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::time::Instant;

/// Identity of one verification ticket.
///
/// Composed of the sanitized requester address, a random alphanumeric nonce
/// and the creation time in Unix seconds. None of the parts can contain `_`,
/// which separates them in the file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TicketId {
    requester: String,
    nonce: String,
    created_at: i64,
}

impl TicketId {
    /// Generate a fresh identity for a request coming from `requester`.
    pub fn generate(requester: IpAddr, nonce_len: usize) -> Self {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(nonce_len)
            .map(char::from)
            .collect();

        Self {
            requester: sanitize_requester(&requester.to_string()),
            nonce,
            created_at: Utc::now().timestamp(),
        }
    }

    /// Rebuild an identity from its parts, e.g. when parsing a file name.
    ///
    /// Returns `None` if any part would break the file name layout.
    pub fn from_parts(requester: &str, nonce: &str, created_at: i64) -> Option<Self> {
        let requester_ok = !requester.is_empty()
            && requester
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-');
        let nonce_ok = !nonce.is_empty() && nonce.chars().all(|c| c.is_ascii_alphanumeric());
        if !requester_ok || !nonce_ok {
            return None;
        }

        Some(Self {
            requester: requester.to_string(),
            nonce: nonce.to_string(),
            created_at,
        })
    }

    pub fn requester(&self) -> &str {
        &self.requester
    }

    pub fn nonce(&self) -> &str {
        &self.nonce
    }

    /// Creation time in Unix seconds.
    pub fn created_at(&self) -> i64 {
        self.created_at
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.requester, self.nonce, self.created_at)
    }
}

/// Make a requester address safe to embed in a file name.
///
/// Every character outside `[A-Za-z0-9]` becomes `-`.
pub fn sanitize_requester(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// A submitted ticket the caller is waiting on.
#[derive(Debug, Clone)]
pub struct TicketHandle {
    pub id: TicketId,
    pub ticket_path: PathBuf,
    pub verdict_path: PathBuf,
    /// Monotonic instant the ticket was published; the timeout counts from here.
    pub created: Instant,
}

impl TicketHandle {
    /// File name of the ticket record.
    pub fn name(&self) -> String {
        self.ticket_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sanitize_ipv4() {
        assert_eq!(sanitize_requester("192.168.1.5"), "192-168-1-5");
    }

    #[test]
    fn test_sanitize_ipv6() {
        assert_eq!(sanitize_requester("::1"), "--1");
        assert_eq!(sanitize_requester("fe80::1%eth0"), "fe80--1-eth0");
    }

    #[test]
    fn test_generate_shape() {
        let id = TicketId::generate("10.0.0.7".parse().unwrap(), 8);
        assert_eq!(id.requester(), "10-0-0-7");
        assert_eq!(id.nonce().len(), 8);
        assert!(id.nonce().chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(id.created_at() > 0);
    }

    #[test]
    fn test_generate_respects_nonce_len() {
        let id = TicketId::generate("10.0.0.7".parse().unwrap(), 16);
        assert_eq!(id.nonce().len(), 16);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let addr: IpAddr = "127.0.0.1".parse().unwrap();
        let ids: HashSet<TicketId> = (0..1000).map(|_| TicketId::generate(addr, 8)).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_display() {
        let id = TicketId::from_parts("10-0-0-7", "Ab3dE6gH", 1_700_000_000).unwrap();
        assert_eq!(id.to_string(), "10-0-0-7_Ab3dE6gH_1700000000");
    }

    #[test]
    fn test_from_parts_rejects_bad_tokens() {
        assert!(TicketId::from_parts("10_0", "Ab3dE6gH", 1).is_none());
        assert!(TicketId::from_parts("10/0", "Ab3dE6gH", 1).is_none());
        assert!(TicketId::from_parts("10-0", "Ab3d-6gH", 1).is_none());
        assert!(TicketId::from_parts("", "Ab3dE6gH", 1).is_none());
        assert!(TicketId::from_parts("10-0", "", 1).is_none());
    }
}
