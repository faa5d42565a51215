//! Verification tickets: identity, file naming and in-flight handles.

mod naming;
mod types;

pub use naming::{MailboxNaming, RecordKind, CLAIMED_MARKER, STAGING_MARKER};
pub use types::{sanitize_requester, TicketHandle, TicketId};
