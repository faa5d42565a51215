//! Verdict poller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::mailbox::{FsMailbox, MailboxError, VerdictRead};
use crate::metrics::{
    HANDSHAKES_ABANDONED, HANDSHAKES_IN_FLIGHT, HANDSHAKE_DURATION, HANDSHAKE_OUTCOMES,
    VERDICT_ANOMALIES,
};
use crate::ticket::TicketHandle;
use crate::verdict::{Outcome, Verdict};

/// Waits for the validator's verdict on a published ticket.
#[derive(Debug, Clone)]
pub struct Handshake {
    mailbox: Arc<FsMailbox>,
    timeout: Duration,
    poll_interval: Duration,
    wake: Arc<Notify>,
}

impl Handshake {
    pub fn new(mailbox: Arc<FsMailbox>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            mailbox,
            timeout,
            poll_interval,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Re-check the mailbox whenever `wake` fires instead of only on the poll interval.
    pub fn with_wake(mut self, wake: Arc<Notify>) -> Self {
        self.wake = wake;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait for the verdict on `handle`.
    ///
    /// Resolves only once the ticket is gone *and* the verdict exists. The
    /// deadline is `handle.created + timeout`; on expiry the ticket is left
    /// where it is. If the returned future is dropped before completion the
    /// handshake is counted as abandoned.
    pub async fn await_verdict(&self, handle: &TicketHandle) -> Result<Outcome, MailboxError> {
        let mut guard = InFlight::new(handle);

        match self.poll(handle).await {
            Ok(outcome) => {
                guard.complete(outcome.as_str());
                Ok(outcome)
            }
            Err(e) => {
                warn!(ticket = %guard.ticket, error = %e, "Handshake failed");
                guard.complete("error");
                Err(e)
            }
        }
    }

    async fn poll(&self, handle: &TicketHandle) -> Result<Outcome, MailboxError> {
        let deadline = handle.created + self.timeout;
        let mut anomaly_reported = false;

        loop {
            // Register interest before probing so a change between the probe
            // and the sleep still wakes us.
            let notified = self.wake.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let state = self.mailbox.probe(handle).await?;

            if state.is_resolved() {
                match self.mailbox.consume_verdict(handle).await? {
                    VerdictRead::Contents(contents) => return Ok(interpret(handle, &contents)),
                    VerdictRead::Empty => {
                        debug!(ticket = %handle.name(), "Verdict record still empty");
                    }
                    VerdictRead::Missing => {
                        debug!(ticket = %handle.name(), "Verdict vanished before it was claimed");
                    }
                }
            } else if state.is_anomalous() && !anomaly_reported {
                warn!(
                    ticket = %handle.name(),
                    "Verdict present while ticket still exists; ignoring until the ticket is removed"
                );
                VERDICT_ANOMALIES.inc();
                anomaly_reported = true;
            }

            let now = Instant::now();
            if now >= deadline {
                info!(
                    ticket = %handle.name(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "No verdict before deadline; leaving ticket in place"
                );
                return Ok(Outcome::TimedOut);
            }

            let wait_until = (now + self.poll_interval).min(deadline);
            tokio::select! {
                _ = tokio::time::sleep_until(wait_until) => {}
                _ = &mut notified => {}
            }
        }
    }
}

fn interpret(handle: &TicketHandle, contents: &str) -> Outcome {
    match Verdict::parse(contents) {
        Ok(verdict) => {
            info!(ticket = %handle.name(), verdict = verdict.as_token(), "Verdict received");
            Outcome::from(verdict)
        }
        Err(e) => {
            warn!(ticket = %handle.name(), error = %e, "Discarding malformed verdict");
            Outcome::Malformed
        }
    }
}

/// Tracks one waiting handshake for metrics; detects abandonment on drop.
struct InFlight {
    ticket: String,
    started: Instant,
    done: bool,
}

impl InFlight {
    fn new(handle: &TicketHandle) -> Self {
        HANDSHAKES_IN_FLIGHT.inc();
        Self {
            ticket: handle.name(),
            started: handle.created,
            done: false,
        }
    }

    fn complete(&mut self, outcome: &str) {
        self.done = true;
        HANDSHAKE_OUTCOMES.with_label_values(&[outcome]).inc();
        HANDSHAKE_DURATION
            .with_label_values(&[outcome])
            .observe(self.started.elapsed().as_secs_f64());
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        HANDSHAKES_IN_FLIGHT.dec();
        if !self.done {
            HANDSHAKES_ABANDONED.inc();
            debug!(
                ticket = %self.ticket,
                waited_ms = self.started.elapsed().as_millis() as u64,
                "Handshake abandoned by caller; ticket left for the janitor"
            );
        }
    }
}
