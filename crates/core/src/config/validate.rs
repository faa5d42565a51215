use super::{types::Config, ConfigError};

/// Shortest nonce that still gives ~47 bits over a 62-symbol alphabet.
const MIN_NONCE_LEN: usize = 8;

/// Validate configuration.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    let mailbox = &config.mailbox;

    if mailbox.timeout_ms == 0 {
        return Err(ConfigError::ValidationError(
            "mailbox.timeout_ms cannot be 0".to_string(),
        ));
    }

    if mailbox.poll_interval_ms == 0 || mailbox.poll_interval_ms >= mailbox.timeout_ms {
        return Err(ConfigError::ValidationError(format!(
            "mailbox.poll_interval_ms must be between 1 and {} (exclusive)",
            mailbox.timeout_ms
        )));
    }

    if mailbox.nonce_len < MIN_NONCE_LEN {
        return Err(ConfigError::ValidationError(format!(
            "mailbox.nonce_len must be at least {}",
            MIN_NONCE_LEN
        )));
    }

    validate_prefix("mailbox.ticket_prefix", &mailbox.ticket_prefix)?;
    validate_prefix("mailbox.verdict_prefix", &mailbox.verdict_prefix)?;

    if mailbox.ticket_prefix == mailbox.verdict_prefix {
        return Err(ConfigError::ValidationError(
            "mailbox.ticket_prefix and mailbox.verdict_prefix must differ".to_string(),
        ));
    }

    let janitor = &config.janitor;
    if janitor.enabled {
        if janitor.sweep_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "janitor.sweep_interval_secs cannot be 0".to_string(),
            ));
        }

        // A record younger than the timeout may still have a live poller.
        if janitor.max_age_secs.saturating_mul(1000) <= mailbox.timeout_ms {
            return Err(ConfigError::ValidationError(format!(
                "janitor.max_age_secs ({}) must exceed mailbox.timeout_ms ({} ms)",
                janitor.max_age_secs, mailbox.timeout_ms
            )));
        }
    }

    Ok(())
}

/// Prefixes become the first `_`-separated segment of a file name.
fn validate_prefix(field: &str, prefix: &str) -> Result<(), ConfigError> {
    if prefix.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "{} cannot be empty",
            field
        )));
    }

    if prefix.starts_with('.') || prefix.contains(['_', '/', '\\']) {
        return Err(ConfigError::ValidationError(format!(
            "{} must not start with '.' or contain '_', '/' or '\\'",
            field
        )));
    }

    Ok(())
}
