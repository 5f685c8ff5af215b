use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::dispatcher::{Backoff, RetryPolicy};

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Bearer credential sent with every delivery attempt.
    pub server_key: String,
    /// Collector endpoint batches are POSTed to.
    pub api_url: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_collection_interval")]
    pub collection_interval_secs: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_gap")]
    pub retry_gap_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub retry_backoff: BackoffKind,
    /// Upper bound on the gap when `retry_backoff = "exponential"`.
    #[serde(default = "default_retry_max_gap")]
    pub retry_max_gap_secs: u64,
    /// Drop the oldest undelivered records beyond this many. Unbounded when
    /// unset.
    pub max_pending_records: Option<usize>,
    /// Overrides the OS hostname reported in snapshots.
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    #[default]
    Fixed,
    Exponential,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("/var/lib/pulse/metrics.db")
}

fn default_collection_interval() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_gap() -> u64 {
    5
}

fn default_request_timeout() -> u64 {
    10
}

fn default_retry_max_gap() -> u64 {
    60
}

impl AgentConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content =
            std::fs::read_to_string(path).with_context(|| format!("reading config {path}"))?;
        let config = Self::parse(&content)?;
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server_key.trim().is_empty() {
            bail!("server_key must not be empty");
        }
        if self.api_url.trim().is_empty() {
            bail!("api_url must not be empty");
        }
        if self.collection_interval_secs == 0 {
            bail!("collection_interval_secs must be positive");
        }
        if self.retry_count == 0 {
            bail!("retry_count must be positive");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        if self.max_pending_records == Some(0) {
            bail!("max_pending_records must be positive when set");
        }
        Ok(())
    }

    pub fn collection_interval(&self) -> Duration {
        Duration::from_secs(self.collection_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let backoff = match self.retry_backoff {
            BackoffKind::Fixed => Backoff::Fixed,
            BackoffKind::Exponential => Backoff::Exponential {
                max_gap: Duration::from_secs(self.retry_max_gap_secs),
            },
        };
        RetryPolicy {
            attempts: self.retry_count,
            gap: Duration::from_secs(self.retry_gap_secs),
            backoff,
            attempt_timeout: self.request_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
server_key = "k-123"
api_url = "https://collector.example/api/agent"
"#;

    #[test]
    fn defaults_apply_to_minimal_config() {
        let config = AgentConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.db_path, PathBuf::from("/var/lib/pulse/metrics.db"));
        assert_eq!(config.collection_interval_secs, 60);
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.retry_gap_secs, 5);
        assert_eq!(config.request_timeout_secs, 10);
        assert_eq!(config.retry_backoff, BackoffKind::Fixed);
        assert!(config.max_pending_records.is_none());

        let policy = config.retry_policy();
        assert_eq!(policy.attempts, 3);
        assert_eq!(policy.gap, Duration::from_secs(5));
        assert_eq!(policy.backoff, Backoff::Fixed);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(10));
    }

    #[test]
    fn exponential_backoff_is_configurable() {
        let text = format!(
            "{MINIMAL}\nretry_backoff = \"exponential\"\nretry_max_gap_secs = 30\nmax_pending_records = 5000\n"
        );
        let config = AgentConfig::parse(&text).unwrap();
        assert_eq!(config.max_pending_records, Some(5000));
        assert_eq!(
            config.retry_policy().backoff,
            Backoff::Exponential {
                max_gap: Duration::from_secs(30)
            }
        );
    }

    #[test]
    fn missing_credential_is_rejected() {
        let err = AgentConfig::parse("api_url = \"http://x\"").unwrap_err();
        assert!(err.to_string().contains("server_key"));

        let err = AgentConfig::parse("server_key = \" \"\napi_url = \"http://x\"").unwrap_err();
        assert!(err.to_string().contains("server_key"));
    }

    #[test]
    fn non_positive_values_are_rejected() {
        for extra in [
            "collection_interval_secs = 0",
            "retry_count = 0",
            "request_timeout_secs = 0",
            "max_pending_records = 0",
        ] {
            let text = format!("{MINIMAL}\n{extra}\n");
            assert!(AgentConfig::parse(&text).is_err(), "{extra} should be rejected");
        }
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, MINIMAL).unwrap();
        let config = AgentConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server_key, "k-123");
    }
}
