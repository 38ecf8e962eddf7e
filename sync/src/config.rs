//! Configuration management for the sync runner.
//!
//! Everything comes from environment variables (the deployment layer
//! invokes the binary on a schedule and supplies credentials that way).
//! Configuration is loaded once, validated up front, and passed into the
//! orchestrator explicitly; a bad value aborts the run before any side
//! effect.

use crate::retry::RetryPolicy;
use playlog_engine::Domain;
use std::env;
use std::fmt;

/// One (user, domain) unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncUnit {
    pub user: String,
    pub domain: Domain,
}

impl fmt::Display for SyncUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user, self.domain)
    }
}

/// Source play-tracking service settings.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Base URL of the source API
    pub base_url: String,
    /// Bearer token for the source API
    pub token: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Politeness delay between page requests, in milliseconds
    pub page_delay_ms: u64,
    /// Fixed page length of the source API
    pub page_size: usize,
}

/// Destination table store settings.
#[derive(Debug, Clone)]
pub struct DestConfig {
    /// Base URL of the destination records API
    pub base_url: String,
    /// API key for the destination store
    pub api_key: String,
    /// Document the four tables live in
    pub doc_id: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

/// Full runner configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub source: SourceConfig,
    pub dest: DestConfig,
    /// Units to sync, in configured order
    pub units: Vec<SyncUnit>,
    /// Safety margin subtracted from the high-water mark, in days
    pub overlap_margin_days: u32,
    /// How many recent plays to load for overlap detection
    pub overlap_scan_limit: usize,
    /// Units processed concurrently
    pub max_concurrent_units: usize,
    pub retry: RetryPolicy,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let source = SourceConfig {
            base_url: optional("PLAYLOG_SOURCE_URL")
                .unwrap_or_else(|| "https://boardgamegeek.com/xmlapi2".to_string()),
            token: required("PLAYLOG_SOURCE_TOKEN")?,
            timeout_secs: parsed("PLAYLOG_SOURCE_TIMEOUT_SECS", 30)?,
            page_delay_ms: parsed("PLAYLOG_PAGE_DELAY_MS", 1_000)?,
            page_size: parsed("PLAYLOG_PAGE_SIZE", 100)?,
        };

        let dest = DestConfig {
            base_url: required("PLAYLOG_DEST_URL")?,
            api_key: required("PLAYLOG_DEST_API_KEY")?,
            doc_id: required("PLAYLOG_DEST_DOC_ID")?,
            timeout_secs: parsed("PLAYLOG_DEST_TIMEOUT_SECS", 30)?,
        };

        let units = parse_units(&required("PLAYLOG_USERS")?)?;

        let retry = RetryPolicy {
            max_retries: parsed("PLAYLOG_MAX_RETRIES", 3)?,
            base_delay_ms: parsed("PLAYLOG_RETRY_BASE_DELAY_MS", 500)?,
            max_delay_ms: parsed("PLAYLOG_RETRY_MAX_DELAY_MS", 30_000)?,
        };

        let config = Self {
            source,
            dest,
            units,
            overlap_margin_days: parsed("PLAYLOG_OVERLAP_MARGIN_DAYS", 1)?,
            overlap_scan_limit: parsed("PLAYLOG_OVERLAP_SCAN_LIMIT", 100)?,
            max_concurrent_units: parsed("PLAYLOG_MAX_CONCURRENT_UNITS", 2)?,
            retry,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values a run cannot work with. A zero page size, scan
    /// limit, concurrency, or timeout is always a misconfiguration, not
    /// a choice.
    fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&'static str, u64); 5] = [
            ("PLAYLOG_PAGE_SIZE", self.source.page_size as u64),
            ("PLAYLOG_SOURCE_TIMEOUT_SECS", self.source.timeout_secs),
            ("PLAYLOG_DEST_TIMEOUT_SECS", self.dest.timeout_secs),
            ("PLAYLOG_OVERLAP_SCAN_LIMIT", self.overlap_scan_limit as u64),
            (
                "PLAYLOG_MAX_CONCURRENT_UNITS",
                self.max_concurrent_units as u64,
            ),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    name,
                    value: "0".into(),
                });
            }
        }
        Ok(())
    }
}

/// Parse the `PLAYLOG_USERS` unit list.
///
/// Comma-separated `user` or `user:domain` entries. A bare user expands
/// to one unit per domain.
pub fn parse_units(raw: &str) -> Result<Vec<SyncUnit>, ConfigError> {
    let mut units = Vec::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.split_once(':') {
            Some((user, domain)) => {
                let user = user.trim();
                if user.is_empty() {
                    return Err(ConfigError::InvalidUnit(entry.to_string()));
                }
                let domain: Domain = domain
                    .parse()
                    .map_err(|_| ConfigError::InvalidUnit(entry.to_string()))?;
                units.push(SyncUnit {
                    user: user.to_string(),
                    domain,
                });
            }
            None => {
                for domain in Domain::ALL {
                    units.push(SyncUnit {
                        user: entry.to_string(),
                        domain,
                    });
                }
            }
        }
    }

    units.dedup();
    if units.is_empty() {
        return Err(ConfigError::NoUnits);
    }
    Ok(units)
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },

    #[error("invalid sync unit {0:?}, expected \"user\" or \"user:domain\"")]
    InvalidUnit(String),

    #[error("PLAYLOG_USERS names no sync units")]
    NoUnits,
}
