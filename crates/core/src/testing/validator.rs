//! Simulated external validator.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::fs;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::mailbox::FsMailbox;
use crate::ticket::{RecordKind, TicketId};

/// List tickets currently waiting in the mailbox.
pub async fn pending_tickets(mailbox: &FsMailbox) -> io::Result<Vec<(String, TicketId)>> {
    let mut entries = fs::read_dir(mailbox.dir()).await?;
    let mut tickets = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(RecordKind::Ticket(id)) = mailbox.naming().classify(&name) {
            tickets.push((name, id));
        }
    }
    Ok(tickets)
}

/// Answer one ticket the way a well-behaved validator does: delete the
/// ticket first, then write the verdict.
pub async fn answer_ticket(mailbox: &FsMailbox, id: &TicketId, token: &str) -> io::Result<()> {
    fs::remove_file(mailbox.dir().join(mailbox.naming().ticket_name(id))).await?;
    fs::write(mailbox.dir().join(mailbox.naming().verdict_name(id)), token).await
}

/// Background validator that accepts exactly one credential.
pub struct SimulatedValidator {
    mailbox: Arc<FsMailbox>,
    accepted: String,
    delay: Duration,
    scan_interval: Duration,
}

impl SimulatedValidator {
    pub fn new(mailbox: Arc<FsMailbox>, accepted: impl Into<String>) -> Self {
        Self {
            mailbox,
            accepted: accepted.into(),
            delay: Duration::ZERO,
            scan_interval: Duration::from_millis(10),
        }
    }

    /// Wait this long after discovering a ticket before answering it.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn spawn(self) -> ValidatorHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let answered = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&answered);

        let task = tokio::spawn(async move {
            let mut seen = HashSet::new();
            loop {
                if let Ok(tickets) = pending_tickets(&self.mailbox).await {
                    for (name, id) in tickets {
                        if !seen.insert(name.clone()) {
                            continue;
                        }
                        let mailbox = Arc::clone(&self.mailbox);
                        let accepted = self.accepted.clone();
                        let delay = self.delay;
                        let counter = Arc::clone(&counter);
                        tokio::spawn(async move {
                            tokio::time::sleep(delay).await;
                            let path = mailbox.dir().join(&name);
                            let Ok(candidate) = fs::read_to_string(&path).await else {
                                return;
                            };
                            let token = if candidate == accepted { "1" } else { "0" };
                            if answer_ticket(&mailbox, &id, token).await.is_ok() {
                                counter.fetch_add(1, Ordering::SeqCst);
                            }
                        });
                    }
                }

                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = tokio::time::sleep(self.scan_interval) => {}
                }
            }
        });

        ValidatorHandle {
            stop_tx,
            answered,
            task,
        }
    }
}

/// Running [`SimulatedValidator`]; stops when dropped.
pub struct ValidatorHandle {
    stop_tx: watch::Sender<bool>,
    answered: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl ValidatorHandle {
    /// Number of tickets answered so far.
    pub fn answered(&self) -> usize {
        self.answered.load(Ordering::SeqCst)
    }
}

impl Drop for ValidatorHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailboxConfig;
    use crate::credential::Credential;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_validator_answers_delete_then_write() {
        let temp = TempDir::new().unwrap();
        let config = MailboxConfig {
            dir: temp.path().to_path_buf(),
            ..Default::default()
        };
        let mailbox = Arc::new(FsMailbox::open(&config).await.unwrap());
        let validator = SimulatedValidator::new(Arc::clone(&mailbox), "password1").spawn();

        let credential = Credential::parse("password1").unwrap();
        let handle = mailbox
            .submit("127.0.0.1".parse().unwrap(), &credential)
            .await
            .unwrap();

        for _ in 0..200 {
            if validator.answered() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(validator.answered(), 1);
        assert!(!handle.ticket_path.exists());
        assert_eq!(std::fs::read_to_string(&handle.verdict_path).unwrap(), "1");
    }
}
