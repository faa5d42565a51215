//! Out-of-band credential verification over a shared filesystem mailbox.
//!
//! A request handler publishes a ticket carrying the candidate credential
//! and blocks (cooperatively) until an external validator removes the ticket
//! and writes a verdict, or until the timeout expires.

pub mod config;
pub mod credential;
pub mod handshake;
pub mod janitor;
pub mod mailbox;
pub mod metrics;
pub mod testing;
pub mod ticket;
pub mod verdict;
pub mod watcher;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, JanitorConfig,
    MailboxConfig, ServerConfig,
};
pub use credential::{Credential, CredentialError, MAX_CREDENTIAL_LEN, MIN_CREDENTIAL_LEN};
pub use handshake::{Handshake, VerificationService};
pub use janitor::{Janitor, SweepReport};
pub use mailbox::{FsMailbox, MailboxCensus, MailboxError, MailboxState, VerdictRead};
pub use ticket::{MailboxNaming, RecordKind, TicketHandle, TicketId};
pub use verdict::{Outcome, StatusCode, Verdict, VerdictError};
pub use watcher::MailboxWatcher;
