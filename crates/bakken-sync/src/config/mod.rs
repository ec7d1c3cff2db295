//! Sync configuration.
//!
//! Provides `SyncConfig`, shared by the CLI and embedding apps, to describe
//! the Supabase project, the tournament strategy and the timing knobs of the
//! reconciliation protocol.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::models::TournamentIdStrategy;
use crate::{Error, Result};

const ENV_SUPABASE_URL: &str = "BAKKEN_SUPABASE_URL";
const ENV_SUPABASE_ANON_KEY: &str = "BAKKEN_SUPABASE_ANON_KEY";
const ENV_TOURNAMENT_ID: &str = "BAKKEN_TOURNAMENT_ID";
const ENV_STALENESS_MS: &str = "BAKKEN_STALENESS_MS";
const ENV_RETRY_BASE_MS: &str = "BAKKEN_RETRY_BASE_MS";
const ENV_RETRY_MAX_MS: &str = "BAKKEN_RETRY_MAX_MS";

/// Local data younger than this wins over freshly loaded remote data.
pub const DEFAULT_STALENESS_THRESHOLD_MS: i64 = 30_000;
pub const DEFAULT_INIT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;

/// Supabase project coordinates.
///
/// The anon key is a public, safe-to-ship key; service-role keys must never
/// be configured here.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
}

impl std::fmt::Debug for RemoteConfig {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("RemoteConfig")
            .field("supabase_url", &self.supabase_url)
            .field("supabase_anon_key", &"[REDACTED]")
            .finish()
    }
}

impl RemoteConfig {
    /// Validate and normalize a project URL and anon key.
    pub fn new(supabase_url: impl Into<String>, supabase_anon_key: impl Into<String>) -> Result<Self> {
        let supabase_url = non_blank(Some(supabase_url.into())).ok_or_else(|| {
            Error::InvalidConfig("Supabase URL must not be empty".to_string())
        })?;
        if !(supabase_url.starts_with("http://") || supabase_url.starts_with("https://")) {
            return Err(Error::InvalidConfig(
                "Supabase URL must include http:// or https://".to_string(),
            ));
        }
        let supabase_anon_key = non_blank(Some(supabase_anon_key.into()))
            .ok_or_else(|| Error::InvalidConfig("Supabase anon key must not be empty".to_string()))?;

        Ok(Self {
            supabase_url: supabase_url.trim_end_matches('/').to_string(),
            supabase_anon_key,
        })
    }
}

/// Capped exponential backoff for re-draining the pending queue while
/// online.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RetryPolicy {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1_u64.checked_shl(attempt.min(32)).unwrap_or(u64::MAX);
        let millis = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }
}

/// Runtime configuration of a `SyncManager`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Remote project; `None` runs the manager local-only.
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub tournament: TournamentIdStrategy,
    #[serde(default = "default_staleness_threshold_ms")]
    pub staleness_threshold_ms: i64,
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
    /// Keep the pending queue in the local store across sessions.
    #[serde(default = "default_persist_queue")]
    pub persist_queue: bool,
}

const fn default_staleness_threshold_ms() -> i64 {
    DEFAULT_STALENESS_THRESHOLD_MS
}

const fn default_init_timeout_ms() -> u64 {
    DEFAULT_INIT_TIMEOUT_MS
}

const fn default_probe_timeout_ms() -> u64 {
    DEFAULT_PROBE_TIMEOUT_MS
}

const fn default_persist_queue() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote: None,
            tournament: TournamentIdStrategy::Generated,
            staleness_threshold_ms: DEFAULT_STALENESS_THRESHOLD_MS,
            init_timeout_ms: DEFAULT_INIT_TIMEOUT_MS,
            probe_timeout_ms: DEFAULT_PROBE_TIMEOUT_MS,
            retry: None,
            persist_queue: true,
        }
    }
}

impl SyncConfig {
    /// Load configuration from `BAKKEN_*` environment variables.
    ///
    /// A missing Supabase URL and key yields a local-only config. Providing
    /// only one of them is an error.
    pub fn from_env() -> Result<Self> {
        parse_config(|key| env::var(key).ok())
    }

    #[must_use]
    pub const fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    #[must_use]
    pub const fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<SyncConfig> {
    let supabase_url = non_blank(lookup(ENV_SUPABASE_URL));
    let anon_key = non_blank(lookup(ENV_SUPABASE_ANON_KEY));

    let remote = match (supabase_url, anon_key) {
        (None, None) => None,
        (Some(url), Some(key)) => Some(RemoteConfig::new(url, key)?),
        (url, _) => {
            let missing = if url.is_none() {
                ENV_SUPABASE_URL
            } else {
                ENV_SUPABASE_ANON_KEY
            };
            return Err(Error::InvalidConfig(format!(
                "Supabase configuration is incomplete. Missing: {missing}"
            )));
        }
    };

    let tournament = non_blank(lookup(ENV_TOURNAMENT_ID))
        .map_or(TournamentIdStrategy::Generated, TournamentIdStrategy::Fixed);

    let staleness_threshold_ms = parse_number(&lookup, ENV_STALENESS_MS)?
        .unwrap_or(DEFAULT_STALENESS_THRESHOLD_MS);

    let retry = match (
        parse_number::<u64>(&lookup, ENV_RETRY_BASE_MS)?,
        parse_number::<u64>(&lookup, ENV_RETRY_MAX_MS)?,
    ) {
        (Some(0), _) => {
            return Err(Error::InvalidConfig(format!(
                "{ENV_RETRY_BASE_MS} must be greater than zero"
            )));
        }
        (Some(base_delay_ms), max) => Some(RetryPolicy {
            base_delay_ms,
            max_delay_ms: max.unwrap_or(base_delay_ms.saturating_mul(32)),
        }),
        (None, _) => None,
    };

    Ok(SyncConfig {
        remote,
        tournament,
        staleness_threshold_ms,
        retry,
        ..SyncConfig::default()
    })
}

/// Trimmed value, or `None` when missing or blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|raw| raw.trim().to_string())
        .filter(|trimmed| !trimmed.is_empty())
}

fn parse_number<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    non_blank(lookup(key))
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|_| Error::InvalidConfig(format!("{key} must be a number, got '{raw}'")))
        })
        .transpose()
}
