//! Mapping between ticket identities and mailbox file names.

use super::TicketId;

/// Prefix of a ticket that is still being written.
pub const STAGING_MARKER: &str = ".staging-";

/// Prefix of a verdict that a poller has claimed and is consuming.
pub const CLAIMED_MARKER: &str = ".claimed-";

/// What a file in the mailbox directory is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordKind {
    Ticket(TicketId),
    Verdict(TicketId),
    Staging,
    Claimed,
}

/// File naming rules for one mailbox.
///
/// Ticket: `<ticket_prefix>_<requester>_<nonce>_<unix_secs>`.
/// Verdict: `<verdict_prefix>_<ticket file name>`.
#[derive(Debug, Clone)]
pub struct MailboxNaming {
    ticket_prefix: String,
    verdict_prefix: String,
}

impl MailboxNaming {
    pub fn new(ticket_prefix: impl Into<String>, verdict_prefix: impl Into<String>) -> Self {
        Self {
            ticket_prefix: ticket_prefix.into(),
            verdict_prefix: verdict_prefix.into(),
        }
    }

    pub fn ticket_name(&self, id: &TicketId) -> String {
        format!("{}_{}", self.ticket_prefix, id)
    }

    pub fn verdict_name(&self, id: &TicketId) -> String {
        format!("{}_{}", self.verdict_prefix, self.ticket_name(id))
    }

    /// Classify a directory entry. Unrelated files yield `None`.
    pub fn classify(&self, file_name: &str) -> Option<RecordKind> {
        if file_name.starts_with(STAGING_MARKER) {
            return Some(RecordKind::Staging);
        }
        if file_name.starts_with(CLAIMED_MARKER) {
            return Some(RecordKind::Claimed);
        }

        if let Some(ticket_name) = file_name
            .strip_prefix(self.verdict_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return self.parse_ticket_name(ticket_name).map(RecordKind::Verdict);
        }

        self.parse_ticket_name(file_name).map(RecordKind::Ticket)
    }

    fn parse_ticket_name(&self, file_name: &str) -> Option<TicketId> {
        let mut parts = file_name.split('_');
        if parts.next()? != self.ticket_prefix {
            return None;
        }
        let requester = parts.next()?;
        let nonce = parts.next()?;
        let created_at = parts.next()?.parse::<i64>().ok()?;
        if parts.next().is_some() {
            return None;
        }
        TicketId::from_parts(requester, nonce, created_at)
    }
}
