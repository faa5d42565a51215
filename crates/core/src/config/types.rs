use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub janitor: JanitorConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Shared mailbox directory and handshake timing.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MailboxConfig {
    /// Directory shared with the external validator.
    #[serde(default = "default_mailbox_dir")]
    pub dir: PathBuf,
    /// File name prefix of pending tickets.
    #[serde(default = "default_ticket_prefix")]
    pub ticket_prefix: String,
    /// Prefix prepended to a ticket file name to form its verdict name.
    #[serde(default = "default_verdict_prefix")]
    pub verdict_prefix: String,
    /// How long a requester waits for a verdict (milliseconds).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How often the mailbox is re-checked when no change event arrives (milliseconds).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Length of the random alphanumeric nonce in ticket names.
    #[serde(default = "default_nonce_len")]
    pub nonce_len: usize,
    /// Wake pollers on directory change events instead of waiting for the next poll.
    #[serde(default = "default_watch")]
    pub watch: bool,
}

impl MailboxConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            dir: default_mailbox_dir(),
            ticket_prefix: default_ticket_prefix(),
            verdict_prefix: default_verdict_prefix(),
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            nonce_len: default_nonce_len(),
            watch: default_watch(),
        }
    }
}

fn default_mailbox_dir() -> PathBuf {
    PathBuf::from("psk_tries")
}

fn default_ticket_prefix() -> String {
    "psk-try".to_string()
}

fn default_verdict_prefix() -> String {
    "checked".to_string()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_nonce_len() -> usize {
    8
}

fn default_watch() -> bool {
    true
}

/// Orphaned record sweeping.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JanitorConfig {
    #[serde(default = "default_janitor_enabled")]
    pub enabled: bool,
    /// Seconds between sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Records older than this are considered orphaned.
    /// Must exceed the handshake timeout.
    #[serde(default = "default_max_age")]
    pub max_age_secs: u64,
}

impl JanitorConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_secs)
    }
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_janitor_enabled(),
            sweep_interval_secs: default_sweep_interval(),
            max_age_secs: default_max_age(),
        }
    }
}

fn default_janitor_enabled() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_max_age() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_full_config() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[mailbox]
dir = "/var/lib/keycheck"
ticket_prefix = "try"
verdict_prefix = "done"
timeout_ms = 15000
poll_interval_ms = 250
nonce_len = 12
watch = false

[janitor]
enabled = false
sweep_interval_secs = 10
max_age_secs = 120
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host.to_string(), "127.0.0.1");
        assert_eq!(config.mailbox.dir.to_str().unwrap(), "/var/lib/keycheck");
        assert_eq!(config.mailbox.ticket_prefix, "try");
        assert_eq!(config.mailbox.verdict_prefix, "done");
        assert_eq!(config.mailbox.timeout(), Duration::from_secs(15));
        assert_eq!(config.mailbox.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.mailbox.nonce_len, 12);
        assert!(!config.mailbox.watch);
        assert!(!config.janitor.enabled);
        assert_eq!(config.janitor.sweep_interval(), Duration::from_secs(10));
        assert_eq!(config.janitor.max_age(), Duration::from_secs(120));
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.mailbox.dir.to_str().unwrap(), "psk_tries");
        assert_eq!(config.mailbox.ticket_prefix, "psk-try");
        assert_eq!(config.mailbox.verdict_prefix, "checked");
        assert_eq!(config.mailbox.timeout_ms, 20_000);
        assert_eq!(config.mailbox.poll_interval_ms, 1000);
        assert_eq!(config.mailbox.nonce_len, 8);
        assert!(config.mailbox.watch);
        assert_eq!(config.janitor.max_age_secs, 300);
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml = r#"
[mailbox]
poll_interval_ms = 50
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.mailbox.poll_interval_ms, 50);
        assert_eq!(config.mailbox.timeout_ms, 20_000);
        assert_eq!(config.mailbox.ticket_prefix, "psk-try");
    }
}
