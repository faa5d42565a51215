//! Filesystem mailbox shared with the external validator.

mod error;
mod fs;

pub use error::MailboxError;
pub use fs::{FsMailbox, MailboxCensus, MailboxState, VerdictRead};
