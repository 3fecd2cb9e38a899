use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

pub const DEFAULT_CONFIG_FILE: &str = "lectern.toml";
pub const DEFAULT_DB_PATH: &str = "lectern.db";
pub const DEFAULT_INTERVAL_SECS: u64 = 60; // one tick per minute
pub const DEFAULT_BATCH_SIZE: u32 = 50; // caps lock hold time per claim
pub const DEFAULT_TRANSACTION_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_CLAIM_TTL_SECS: u64 = 120;
pub const MAX_CLAIM_TTL_SECS: u64 = 86_400;

/// Top-level config (lectern.toml + LECTERN_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LecternConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Operator knobs for the scheduled publication engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// Seconds between ticks.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Maximum lessons claimed per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Upper bound on one item's transaction, including lock waits.
    #[serde(default = "default_transaction_timeout_ms")]
    pub transaction_timeout_ms: u64,
    /// How long a claim stays exclusive if its holder never finishes.
    /// Must outlive `transaction_timeout_ms` and stay within one day.
    #[serde(default = "default_claim_ttl_secs")]
    pub claim_ttl_secs: u64,
    /// Identity written into claims. Generated per process when unset, so
    /// replicas sharing one config file still hold distinct claims.
    #[serde(default)]
    pub worker_id: Option<String>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            transaction_timeout_ms: DEFAULT_TRANSACTION_TIMEOUT_MS,
            claim_ttl_secs: DEFAULT_CLAIM_TTL_SECS,
            worker_id: None,
        }
    }
}

impl PublisherConfig {
    /// Reject values that would make the loop spin, claim nothing, or let a
    /// claim expire while its transaction is still allowed to run.
    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(CoreError::Config(
                "publisher.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(CoreError::Config(
                "publisher.batch_size must be greater than zero".to_string(),
            ));
        }
        if self.transaction_timeout_ms == 0 {
            return Err(CoreError::Config(
                "publisher.transaction_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.claim_ttl_secs > MAX_CLAIM_TTL_SECS {
            return Err(CoreError::Config(format!(
                "publisher.claim_ttl_secs ({}s) must not exceed {MAX_CLAIM_TTL_SECS}s",
                self.claim_ttl_secs
            )));
        }
        if self.claim_ttl_secs * 1000 <= self.transaction_timeout_ms {
            return Err(CoreError::Config(format!(
                "publisher.claim_ttl_secs ({}s) must exceed transaction_timeout_ms ({}ms)",
                self.claim_ttl_secs, self.transaction_timeout_ms
            )));
        }
        Ok(())
    }
}

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}
fn default_interval_secs() -> u64 {
    DEFAULT_INTERVAL_SECS
}
fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}
fn default_transaction_timeout_ms() -> u64 {
    DEFAULT_TRANSACTION_TIMEOUT_MS
}
fn default_claim_ttl_secs() -> u64 {
    DEFAULT_CLAIM_TTL_SECS
}

impl LecternConfig {
    /// Load config from a TOML file with LECTERN_* env var overrides.
    ///
    /// Nested keys use a double underscore:
    /// `LECTERN_PUBLISHER__BATCH_SIZE=25` sets `publisher.batch_size`.
    /// A missing file is not an error; every field has a default.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_FILE);
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path))
                .merge(Env::prefixed("LECTERN_").split("__")),
        )
    }

    /// Extract and validate from an already assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: LecternConfig = figment
            .extract()
            .map_err(|e| CoreError::Config(e.to_string()))?;
        config.publisher.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_document() {
        let config = LecternConfig::from_figment(Figment::from(Toml::string(""))).unwrap();
        assert_eq!(config.database.path, DEFAULT_DB_PATH);
        assert_eq!(config.publisher.interval_secs, 60);
        assert_eq!(config.publisher.batch_size, 50);
        assert!(config.publisher.worker_id.is_none());
    }

    #[test]
    fn partial_publisher_section_keeps_other_defaults() {
        let toml = r#"
            [database]
            path = "/var/lib/lectern/catalog.db"

            [publisher]
            batch_size = 10
            worker_id = "replica-a"
        "#;
        let config = LecternConfig::from_figment(Figment::from(Toml::string(toml))).unwrap();
        assert_eq!(config.database.path, "/var/lib/lectern/catalog.db");
        assert_eq!(config.publisher.batch_size, 10);
        assert_eq!(config.publisher.worker_id.as_deref(), Some("replica-a"));
        assert_eq!(
            config.publisher.transaction_timeout_ms,
            DEFAULT_TRANSACTION_TIMEOUT_MS
        );
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let toml = "[publisher]\nbatch_size = 0\n";
        let err = LecternConfig::from_figment(Figment::from(Toml::string(toml))).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn claim_ttl_must_outlive_transaction_timeout() {
        let config = PublisherConfig {
            transaction_timeout_ms: 10_000,
            claim_ttl_secs: 10,
            ..PublisherConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PublisherConfig {
            transaction_timeout_ms: 10_000,
            claim_ttl_secs: 11,
            ..PublisherConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn claim_ttl_is_capped_at_one_day() {
        let at_cap = PublisherConfig {
            claim_ttl_secs: MAX_CLAIM_TTL_SECS,
            ..PublisherConfig::default()
        };
        assert!(at_cap.validate().is_ok());

        for claim_ttl_secs in [MAX_CLAIM_TTL_SECS + 1, 10_000_000_000_000, u64::MAX] {
            let config = PublisherConfig {
                claim_ttl_secs,
                ..PublisherConfig::default()
            };
            let err = config.validate().unwrap_err();
            assert_eq!(err.code(), "CONFIG_ERROR");
        }
    }

    #[test]
    fn wrong_type_is_a_config_error() {
        let toml = "[publisher]\ninterval_secs = \"soon\"\n";
        assert!(LecternConfig::from_figment(Figment::from(Toml::string(toml))).is_err());
    }
}
