//! Directory change notifications for the mailbox.
//!
//! Any create, modify or remove event in the mailbox directory wakes every
//! waiting handshake. Polling stays in place as the fallback.

use std::path::Path;
use std::sync::Arc;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Events buffered between the notify thread and the fan-out task.
const EVENT_BUFFER: usize = 256;

/// Keeps a filesystem watcher alive and fans its events out to waiters.
pub struct MailboxWatcher {
    _watcher: RecommendedWatcher,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl MailboxWatcher {
    /// Start watching `dir`. Must be called from within a tokio runtime.
    pub fn spawn(dir: &Path) -> Result<Self, notify::Error> {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // A full channel already holds a pending wake-up.
            let _ = tx.try_send(res);
        })?;
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        info!("Watching mailbox directory for changes: {:?}", dir);

        let wake = Arc::new(Notify::new());
        let task_wake = Arc::clone(&wake);
        let task = tokio::spawn(async move {
            while let Some(res) = rx.recv().await {
                match res {
                    Ok(notify::Event { kind, .. })
                        if kind.is_create() || kind.is_modify() || kind.is_remove() =>
                    {
                        task_wake.notify_waiters();
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Mailbox watch error: {:?}", e),
                }
            }
        });

        Ok(Self {
            _watcher: watcher,
            wake,
            task,
        })
    }

    /// Notifier that fires on every relevant directory change.
    pub fn wake(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }
}

impl Drop for MailboxWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_creation_wakes_waiters() {
        let temp = TempDir::new().unwrap();
        let watcher = MailboxWatcher::spawn(temp.path()).unwrap();
        let wake = watcher.wake();

        let notified = wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let path = temp.path().join("checked_something");
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            tokio::fs::write(path, "1").await.unwrap();
        });

        let woke = tokio::time::timeout(Duration::from_secs(5), notified).await;
        assert!(woke.is_ok(), "no wake-up after file creation");
    }

    #[tokio::test]
    async fn test_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let result = MailboxWatcher::spawn(&temp.path().join("absent"));
        assert!(result.is_err());
    }
}
