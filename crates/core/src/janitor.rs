//! Age-based sweep of orphaned mailbox records.
//!
//! Tickets whose requester timed out and verdicts nobody came back for stay
//! in the mailbox until swept. Ticket and verdict ages come from the
//! timestamp embedded in the name; staging and claimed files use their
//! modification time.

use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::JanitorConfig;
use crate::mailbox::{FsMailbox, MailboxError};
use crate::metrics::{JANITOR_REMOVED, JANITOR_SWEEPS};
use crate::ticket::RecordKind;

/// What a single sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Mailbox records seen (unrelated files excluded).
    pub scanned: usize,
    pub removed_tickets: usize,
    pub removed_verdicts: usize,
    /// Staging and claimed leftovers.
    pub removed_partial: usize,
    /// Records that disappeared between listing and removal.
    pub already_gone: usize,
}

impl SweepReport {
    pub fn removed(&self) -> usize {
        self.removed_tickets + self.removed_verdicts + self.removed_partial
    }
}

/// Periodically removes orphaned records from the mailbox.
pub struct Janitor {
    mailbox: Arc<FsMailbox>,
    config: JanitorConfig,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

impl Janitor {
    pub fn new(mailbox: Arc<FsMailbox>, config: JanitorConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            mailbox,
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Spawn the sweep loop.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Janitor already running");
            return;
        }

        let running = Arc::clone(&self.running);
        let mailbox = Arc::clone(&self.mailbox);
        let max_age = self.config.max_age();
        let interval = self.config.sweep_interval();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            info!(
                "Janitor started (interval: {:?}, max age: {:?})",
                interval, max_age
            );
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Janitor received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        if !running.load(Ordering::Relaxed) {
                            break;
                        }
                        if let Err(e) = Self::sweep(&mailbox, max_age, Utc::now()).await {
                            warn!("Janitor sweep failed: {}", e);
                        }
                    }
                }
            }
            info!("Janitor stopped");
        });
    }

    /// Stop the sweep loop.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
    }

    /// Run one sweep now.
    pub async fn sweep_once(&self) -> Result<SweepReport, MailboxError> {
        Self::sweep(&self.mailbox, self.config.max_age(), Utc::now()).await
    }

    /// Remove every record older than `max_age` as of `now`.
    ///
    /// The listing is not a snapshot: records may appear or vanish while it is
    /// walked, and a record that is already gone is not an error.
    pub async fn sweep(
        mailbox: &FsMailbox,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, MailboxError> {
        let result = Self::sweep_inner(mailbox, max_age, now).await;
        let label = if result.is_ok() { "ok" } else { "error" };
        JANITOR_SWEEPS.with_label_values(&[label]).inc();

        if let Ok(report) = &result {
            if report.removed() > 0 {
                info!(
                    "Janitor removed {} orphaned record(s) ({} tickets, {} verdicts, {} partial)",
                    report.removed(),
                    report.removed_tickets,
                    report.removed_verdicts,
                    report.removed_partial
                );
            }
        }
        result
    }

    async fn sweep_inner(
        mailbox: &FsMailbox,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, MailboxError> {
        let dir = mailbox.dir();
        let naming = mailbox.naming();
        let max_age_secs = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        let mut report = SweepReport::default();

        let mut entries = fs::read_dir(dir)
            .await
            .map_err(|e| MailboxError::io("list mailbox", dir, e))?;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => return Err(MailboxError::io("list mailbox", dir, e)),
            };

            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let Some(kind) = naming.classify(name) else {
                continue;
            };
            report.scanned += 1;

            let expired = match &kind {
                RecordKind::Ticket(id) | RecordKind::Verdict(id) => {
                    now.timestamp() - id.created_at() > max_age_secs
                }
                RecordKind::Staging | RecordKind::Claimed => match entry.metadata().await {
                    Ok(metadata) => metadata
                        .modified()
                        .ok()
                        .and_then(|modified| SystemTime::from(now).duration_since(modified).ok())
                        .is_some_and(|age| age > max_age),
                    Err(e) if e.kind() == ErrorKind::NotFound => {
                        report.already_gone += 1;
                        continue;
                    }
                    Err(e) => {
                        warn!("Failed to stat {:?}: {}", entry.path(), e);
                        continue;
                    }
                },
            };

            if !expired {
                continue;
            }

            match fs::remove_file(entry.path()).await {
                Ok(()) => {
                    let label = match kind {
                        RecordKind::Ticket(_) => {
                            report.removed_tickets += 1;
                            "ticket"
                        }
                        RecordKind::Verdict(_) => {
                            report.removed_verdicts += 1;
                            "verdict"
                        }
                        RecordKind::Staging => {
                            report.removed_partial += 1;
                            "staging"
                        }
                        RecordKind::Claimed => {
                            report.removed_partial += 1;
                            "claimed"
                        }
                    };
                    JANITOR_REMOVED.with_label_values(&[label]).inc();
                    debug!(record = %name, kind = label, "Removed orphaned record");
                }
                Err(e) if e.kind() == ErrorKind::NotFound => report.already_gone += 1,
                Err(e) => warn!("Failed to remove {:?}: {}", entry.path(), e),
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MailboxConfig;
    use crate::ticket::TicketId;
    use tempfile::TempDir;

    const MAX_AGE: Duration = Duration::from_secs(300);

    async fn mailbox(temp: &TempDir) -> Arc<FsMailbox> {
        let config = MailboxConfig {
            dir: temp.path().to_path_buf(),
            ..Default::default()
        };
        Arc::new(FsMailbox::open(&config).await.unwrap())
    }

    fn write_ticket(mailbox: &FsMailbox, nonce: &str, created_at: i64) -> String {
        let id = TicketId::from_parts("10-0-0-1", nonce, created_at).unwrap();
        let name = mailbox.naming().ticket_name(&id);
        std::fs::write(mailbox.dir().join(&name), "password1").unwrap();
        name
    }

    fn write_verdict(mailbox: &FsMailbox, nonce: &str, created_at: i64) -> String {
        let id = TicketId::from_parts("10-0-0-1", nonce, created_at).unwrap();
        let name = mailbox.naming().verdict_name(&id);
        std::fs::write(mailbox.dir().join(&name), "1").unwrap();
        name
    }

    #[tokio::test]
    async fn test_sweeps_only_expired_records() {
        let temp = TempDir::new().unwrap();
        let mailbox = mailbox(&temp).await;
        let now = Utc::now();
        let old = now.timestamp() - 301;
        let fresh = now.timestamp() - 10;

        let old_ticket = write_ticket(&mailbox, "oldTicket", old);
        let old_verdict = write_verdict(&mailbox, "oldVerdict", old);
        let fresh_ticket = write_ticket(&mailbox, "freshTicket", fresh);
        let fresh_verdict = write_verdict(&mailbox, "freshVerdict", fresh);
        std::fs::write(mailbox.dir().join("unrelated.txt"), "keep").unwrap();

        let report = Janitor::sweep(&mailbox, MAX_AGE, now).await.unwrap();

        assert_eq!(report.scanned, 4);
        assert_eq!(report.removed_tickets, 1);
        assert_eq!(report.removed_verdicts, 1);
        assert_eq!(report.removed_partial, 0);
        assert!(!mailbox.dir().join(old_ticket).exists());
        assert!(!mailbox.dir().join(old_verdict).exists());
        assert!(mailbox.dir().join(fresh_ticket).exists());
        assert!(mailbox.dir().join(fresh_verdict).exists());
        assert!(mailbox.dir().join("unrelated.txt").exists());
    }

    #[tokio::test]
    async fn test_sweeps_stale_partial_files_by_mtime() {
        let temp = TempDir::new().unwrap();
        let mailbox = mailbox(&temp).await;

        let stale = mailbox.dir().join(".staging-psk-try_10-0-0-1_abcdefgh_1");
        let recent = mailbox.dir().join(".claimed-checked_psk-try_10-0-0-1_abcdefgh_1");
        std::fs::write(&stale, "x").unwrap();
        std::fs::write(&recent, "1").unwrap();

        let long_ago = SystemTime::now() - Duration::from_secs(3600);
        std::fs::File::options()
            .write(true)
            .open(&stale)
            .unwrap()
            .set_modified(long_ago)
            .unwrap();

        let report = Janitor::sweep(&mailbox, MAX_AGE, Utc::now()).await.unwrap();

        assert_eq!(report.removed_partial, 1);
        assert!(!stale.exists());
        assert!(recent.exists());
    }

    #[tokio::test]
    async fn test_live_submission_survives_sweep() {
        let temp = TempDir::new().unwrap();
        let mailbox = mailbox(&temp).await;
        let credential = crate::credential::Credential::parse("password1").unwrap();
        let handle = mailbox
            .submit("127.0.0.1".parse().unwrap(), &credential)
            .await
            .unwrap();

        let janitor = Janitor::new(Arc::clone(&mailbox), JanitorConfig::default());
        let report = janitor.sweep_once().await.unwrap();

        assert_eq!(report.removed(), 0);
        assert!(handle.ticket_path.exists());
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let temp = TempDir::new().unwrap();
        let mailbox = mailbox(&temp).await;
        std::fs::remove_dir(mailbox.dir()).unwrap();

        let result = Janitor::sweep(&mailbox, MAX_AGE, Utc::now()).await;
        assert!(matches!(result, Err(MailboxError::Io { .. })));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let temp = TempDir::new().unwrap();
        let mailbox = mailbox(&temp).await;
        let old = Utc::now().timestamp() - 1000;
        let old_ticket = write_ticket(&mailbox, "orphan", old);

        let config = JanitorConfig {
            enabled: true,
            sweep_interval_secs: 1,
            max_age_secs: 300,
        };
        let janitor = Janitor::new(Arc::clone(&mailbox), config);
        janitor.start();
        assert!(janitor.is_running());

        let path = mailbox.dir().join(old_ticket);
        for _ in 0..40 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        assert!(!path.exists());

        janitor.stop();
        assert!(!janitor.is_running());
    }
}
