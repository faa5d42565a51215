use keycheck_core::{Config, FsMailbox, VerificationService};
use std::sync::Arc;

/// Shared application state
pub struct AppState {
    config: Config,
    verifier: VerificationService,
}

impl AppState {
    pub fn new(config: Config, verifier: VerificationService) -> Self {
        Self { config, verifier }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn verifier(&self) -> &VerificationService {
        &self.verifier
    }

    pub fn mailbox(&self) -> &Arc<FsMailbox> {
        self.verifier.mailbox()
    }
}
