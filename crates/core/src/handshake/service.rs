//! End-to-end verification: validate, publish, await.

use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::{debug, info};

use super::Handshake;
use crate::config::MailboxConfig;
use crate::credential::Credential;
use crate::mailbox::{FsMailbox, MailboxError};
use crate::metrics::{HANDSHAKE_OUTCOMES, TICKETS_SUBMITTED};
use crate::verdict::Outcome;

/// Entry point used by request handlers.
#[derive(Debug, Clone)]
pub struct VerificationService {
    mailbox: Arc<FsMailbox>,
    handshake: Handshake,
}

impl VerificationService {
    pub fn new(mailbox: Arc<FsMailbox>, config: &MailboxConfig) -> Self {
        let handshake = Handshake::new(
            Arc::clone(&mailbox),
            config.timeout(),
            config.poll_interval(),
        );
        Self { mailbox, handshake }
    }

    /// Wake waiting handshakes on `wake` (typically driven by a [`crate::MailboxWatcher`]).
    pub fn with_wake(mut self, wake: Arc<Notify>) -> Self {
        self.handshake = self.handshake.with_wake(wake);
        self
    }

    pub fn mailbox(&self) -> &Arc<FsMailbox> {
        &self.mailbox
    }

    /// Verify `raw` on behalf of `requester`.
    ///
    /// Out-of-range credentials return [`Outcome::Rejected`] without touching
    /// the mailbox. Storage failures surface as errors; every other path ends
    /// in an [`Outcome`].
    pub async fn verify(&self, requester: IpAddr, raw: &str) -> Result<Outcome, MailboxError> {
        let credential = match Credential::parse(raw) {
            Ok(credential) => credential,
            Err(e) => {
                debug!(%requester, error = %e, "Credential rejected before submission");
                HANDSHAKE_OUTCOMES
                    .with_label_values(&[Outcome::Rejected.as_str()])
                    .inc();
                return Ok(Outcome::Rejected);
            }
        };

        let handle = self.mailbox.submit(requester, &credential).await?;
        TICKETS_SUBMITTED.inc();
        info!(
            ticket = %handle.name(),
            timeout_ms = self.handshake.timeout().as_millis() as u64,
            "Ticket submitted; awaiting verdict"
        );

        self.handshake.await_verdict(&handle).await
    }
}
