//! Filesystem mailbox implementation.

use std::io::ErrorKind;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::MailboxError;
use crate::config::MailboxConfig;
use crate::credential::Credential;
use crate::ticket::{
    MailboxNaming, RecordKind, TicketHandle, TicketId, CLAIMED_MARKER, STAGING_MARKER,
};

/// Presence of the two records belonging to one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailboxState {
    pub ticket_present: bool,
    pub verdict_present: bool,
}

impl MailboxState {
    /// The validator has claimed the ticket and published its verdict.
    pub fn is_resolved(&self) -> bool {
        !self.ticket_present && self.verdict_present
    }

    /// A verdict exists while the ticket is still there. The validator must
    /// delete the ticket before writing the verdict, so this is never trusted.
    pub fn is_anomalous(&self) -> bool {
        self.ticket_present && self.verdict_present
    }
}

/// Result of trying to take a verdict out of the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerdictRead {
    /// No verdict record (never written, or already consumed).
    Missing,
    /// The record exists but has zero length; it is left in place.
    Empty,
    /// The record was claimed, read and deleted.
    Contents(String),
}

/// Record counts from one directory listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MailboxCensus {
    pub tickets: usize,
    pub verdicts: usize,
    /// Staging and claimed files.
    pub partial: usize,
}

/// Mailbox backed by a shared directory.
#[derive(Debug, Clone)]
pub struct FsMailbox {
    dir: PathBuf,
    naming: MailboxNaming,
    nonce_len: usize,
}

impl FsMailbox {
    /// Open the mailbox, creating the directory if needed.
    pub async fn open(config: &MailboxConfig) -> Result<Self, MailboxError> {
        fs::create_dir_all(&config.dir)
            .await
            .map_err(|e| MailboxError::io("create mailbox directory", &config.dir, e))?;

        Ok(Self {
            dir: config.dir.clone(),
            naming: MailboxNaming::new(&config.ticket_prefix, &config.verdict_prefix),
            nonce_len: config.nonce_len,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn naming(&self) -> &MailboxNaming {
        &self.naming
    }

    /// Publish a new ticket carrying `credential`.
    ///
    /// The credential is written and synced under a staging name, then
    /// hard-linked to the ticket name, so the validator never sees a partial
    /// ticket and an existing record is never replaced. On failure nothing is
    /// left behind under the ticket name.
    pub async fn submit(
        &self,
        requester: IpAddr,
        credential: &Credential,
    ) -> Result<TicketHandle, MailboxError> {
        let id = TicketId::generate(requester, self.nonce_len);
        let name = self.naming.ticket_name(&id);
        let ticket_path = self.dir.join(&name);
        let staging_path = self.dir.join(format!("{}{}", STAGING_MARKER, name));

        let published = self
            .publish(&name, &staging_path, &ticket_path, credential)
            .await;

        // The staging name is removed on every path; the ticket name (if
        // published) is an independent link to the same data.
        if let Err(e) = fs::remove_file(&staging_path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove staging file {:?}: {}", staging_path, e);
            }
        }

        published?;

        debug!(ticket = %name, "Ticket published");

        Ok(TicketHandle {
            verdict_path: self.dir.join(self.naming.verdict_name(&id)),
            id,
            ticket_path,
            created: Instant::now(),
        })
    }

    async fn publish(
        &self,
        name: &str,
        staging_path: &Path,
        ticket_path: &Path,
        credential: &Credential,
    ) -> Result<(), MailboxError> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(staging_path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => MailboxError::Collision {
                    name: name.to_string(),
                },
                _ => MailboxError::io("create staging ticket", staging_path, e),
            })?;

        file.write_all(credential.expose().as_bytes())
            .await
            .map_err(|e| MailboxError::io("write ticket", staging_path, e))?;
        file.sync_all()
            .await
            .map_err(|e| MailboxError::io("sync ticket", staging_path, e))?;
        drop(file);

        fs::hard_link(staging_path, ticket_path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => MailboxError::Collision {
                    name: name.to_string(),
                },
                _ => MailboxError::io("publish ticket", ticket_path, e),
            })?;

        // The new name must survive a crash too; a ticket whose link cannot
        // be made durable is withdrawn.
        if let Err(e) = self.sync_dir().await {
            if let Err(remove_err) = fs::remove_file(ticket_path).await {
                warn!("Failed to withdraw ticket {:?}: {}", ticket_path, remove_err);
            }
            return Err(e);
        }

        Ok(())
    }

    /// Flush the mailbox directory so new entries are durable.
    #[cfg(unix)]
    async fn sync_dir(&self) -> Result<(), MailboxError> {
        fs::File::open(&self.dir)
            .await
            .map_err(|e| MailboxError::io("open mailbox directory", &self.dir, e))?
            .sync_all()
            .await
            .map_err(|e| MailboxError::io("sync mailbox directory", &self.dir, e))
    }

    #[cfg(not(unix))]
    async fn sync_dir(&self) -> Result<(), MailboxError> {
        Ok(())
    }

    /// Check which of the ticket's records currently exist.
    pub async fn probe(&self, handle: &TicketHandle) -> Result<MailboxState, MailboxError> {
        let ticket_present = fs::try_exists(&handle.ticket_path)
            .await
            .map_err(|e| MailboxError::io("stat ticket", &handle.ticket_path, e))?;
        let verdict_present = fs::try_exists(&handle.verdict_path)
            .await
            .map_err(|e| MailboxError::io("stat verdict", &handle.verdict_path, e))?;

        Ok(MailboxState {
            ticket_present,
            verdict_present,
        })
    }

    /// Take the verdict for `handle` out of the mailbox.
    ///
    /// The record is first renamed to a claimed name; only one caller can win
    /// that rename, so a verdict is delivered at most once. A zero-length
    /// record is assumed to still be in the middle of being written and is
    /// left alone. Any other content is claimed and returned as text, with
    /// invalid UTF-8 replaced, so garbage still reaches verdict parsing.
    pub async fn consume_verdict(&self, handle: &TicketHandle) -> Result<VerdictRead, MailboxError> {
        match fs::read(&handle.verdict_path).await {
            Ok(bytes) if bytes.is_empty() => return Ok(VerdictRead::Empty),
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(VerdictRead::Missing),
            Err(e) => return Err(MailboxError::io("read verdict", &handle.verdict_path, e)),
        }

        let claimed_path = self.claimed_path(handle);
        match fs::rename(&handle.verdict_path, &claimed_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(VerdictRead::Missing),
            Err(e) => return Err(MailboxError::io("claim verdict", &handle.verdict_path, e)),
        }

        let contents = fs::read(&claimed_path).await;

        if let Err(e) = fs::remove_file(&claimed_path).await {
            warn!("Failed to remove claimed verdict {:?}: {}", claimed_path, e);
        }

        contents
            .map(|bytes| VerdictRead::Contents(String::from_utf8_lossy(&bytes).into_owned()))
            .map_err(|e| MailboxError::io("read claimed verdict", &claimed_path, e))
    }

    /// Count the records currently in the mailbox.
    ///
    /// Entries that vanish while the directory is being walked are skipped.
    pub async fn census(&self) -> Result<MailboxCensus, MailboxError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| MailboxError::io("list mailbox", &self.dir, e))?;
        let mut census = MailboxCensus::default();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| MailboxError::io("list mailbox", &self.dir, e))?
        {
            match self.naming.classify(&entry.file_name().to_string_lossy()) {
                Some(RecordKind::Ticket(_)) => census.tickets += 1,
                Some(RecordKind::Verdict(_)) => census.verdicts += 1,
                Some(RecordKind::Staging | RecordKind::Claimed) => census.partial += 1,
                None => {}
            }
        }

        Ok(census)
    }

    fn claimed_path(&self, handle: &TicketHandle) -> PathBuf {
        let verdict_name = handle
            .verdict_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.dir.join(format!("{}{}", CLAIMED_MARKER, verdict_name))
    }
}
