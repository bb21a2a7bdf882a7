//! Run parameters loaded once from a JSON document.
//!
//! Field names follow the on-disk `config.json` layout. Optional sections
//! (`fetch`, `identity`, `export`) fall back to the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::error::AppError;
use crate::filters::FilterRules;

/// Default location of the run configuration.
pub const DEFAULT_CONFIG_PATH: &str = "data/config.json";

/// Upper bound for `days_to_scrape` (about a century).
pub const MAX_DAYS_TO_SCRAPE: i64 = 36_500;

/// One search target: keywords + location + work-type code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchQuery {
    pub keywords: String,
    #[serde(default)]
    pub location: String,
    /// Work-type code (`1` on-site, `2` remote, `3` hybrid), sent as `f_WT`.
    #[serde(
        rename = "f_WT",
        alias = "work_type",
        default,
        deserialize_with = "string_or_number"
    )]
    pub work_type: String,
}

/// Immutable crawl configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlConfig {
    pub search_queries: Vec<SearchQuery>,
    #[serde(default = "default_one")]
    pub pages_to_scrape: u32,
    #[serde(default = "default_one")]
    pub rounds: u32,
    /// Postings older than this many days are skipped before the detail fetch.
    #[serde(default = "default_days_to_scrape")]
    pub days_to_scrape: i64,
    /// Search recency parameter (`f_TPR`), e.g. `r86400` for the last day.
    #[serde(default = "default_timespan")]
    pub timespan: String,

    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub title_include: Vec<String>,
    #[serde(default)]
    pub title_exclude: Vec<String>,
    #[serde(default)]
    pub company_exclude: Vec<String>,
    #[serde(default)]
    pub desc_words_include: Vec<String>,
    #[serde(default)]
    pub desc_words_exclude: Vec<String>,
    #[serde(default)]
    pub desc_words_include_regex: Vec<String>,
    #[serde(default)]
    pub desc_words_exclude_regex: Vec<String>,
    /// Minimum acceptable upper salary bound. 0 disables the salary stage.
    #[serde(default, alias = "salary_floor")]
    pub max_salary: u64,
    /// Amount pattern for the detail page's compensation block; the first
    /// capture group holds the amount.
    #[serde(default)]
    pub salary_pattern: Option<String>,

    /// User-agent pool.
    pub headers: Vec<String>,
    #[serde(default)]
    pub proxies: Vec<String>,

    pub jobs_tablename: String,
    pub filtered_jobs_tablename: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Retry, politeness and timeout knobs for the fetcher.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    pub search_attempts: u32,
    pub search_backoff_secs: u64,
    pub detail_attempts: u32,
    pub detail_backoff_secs: u64,
    pub backoff_jitter_ms: u64,
    pub backoff_cap_secs: u64,
    pub politeness_min_ms: u64,
    pub politeness_max_ms: u64,
    pub request_timeout_secs: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            search_attempts: 5,
            search_backoff_secs: 4,
            detail_attempts: 4,
            detail_backoff_secs: 3,
            backoff_jitter_ms: 2_000,
            backoff_cap_secs: 60,
            politeness_min_ms: 1_000,
            politeness_max_ms: 3_000,
            request_timeout_secs: 10,
        }
    }
}

impl FetchSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Control-plane endpoints and timings for network identity rotation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base URL of the local control service.
    pub control_url: String,
    /// Identity lookup endpoints, tried in order. Empty means the
    /// control service's own public-ip endpoint plus two public fallbacks.
    pub lookup_urls: Vec<String>,
    /// Passes over `lookup_urls` before giving up on observing an identity.
    pub lookup_attempts: u32,
    pub lookup_backoff_secs: u64,
    pub settle_secs: u64,
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            control_url: "http://127.0.0.1:8000".to_string(),
            lookup_urls: Vec::new(),
            lookup_attempts: 3,
            lookup_backoff_secs: 5,
            settle_secs: 15,
            poll_interval_secs: 5,
            poll_timeout_secs: 300,
        }
    }
}

impl IdentityConfig {
    pub fn status_url(&self) -> String {
        format!("{}/v1/openvpn/status", self.control_url.trim_end_matches('/'))
    }

    pub fn public_ip_url(&self) -> String {
        format!("{}/v1/publicip/ip", self.control_url.trim_end_matches('/'))
    }

    /// Lookup endpoints in fallback order.
    pub fn lookup_endpoints(&self) -> Vec<String> {
        if !self.lookup_urls.is_empty() {
            return self.lookup_urls.clone();
        }
        vec![
            self.public_ip_url(),
            "https://api.ipify.org?format=json".to_string(),
            "https://ipinfo.io/json".to_string(),
        ]
    }
}

/// Append-only CSV mirrors of each run's new records.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    pub accepted_csv: PathBuf,
    pub filtered_csv: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            accepted_csv: PathBuf::from("data/jobs.csv"),
            filtered_csv: PathBuf::from("data/jobs_filtered.csv"),
        }
    }
}

impl CrawlConfig {
    /// Read, parse and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::ConfigError(format!("Cannot read config {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a config document.
    pub fn from_json(raw: &str) -> Result<Self, AppError> {
        let config: CrawlConfig = serde_json::from_str(raw)
            .map_err(|e| AppError::ConfigError(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.headers.is_empty() {
            return Err(AppError::ConfigError(
                "headers must contain at least one user agent".into(),
            ));
        }
        validate_table_name(&self.jobs_tablename)?;
        validate_table_name(&self.filtered_jobs_tablename)?;
        if self.jobs_tablename == self.filtered_jobs_tablename {
            return Err(AppError::ConfigError(
                "jobs_tablename and filtered_jobs_tablename must differ".into(),
            ));
        }
        if !(0..=MAX_DAYS_TO_SCRAPE).contains(&self.days_to_scrape) {
            return Err(AppError::ConfigError(format!(
                "days_to_scrape must be between 0 and {MAX_DAYS_TO_SCRAPE}, got {}",
                self.days_to_scrape
            )));
        }
        if self.fetch.search_attempts == 0 || self.fetch.detail_attempts == 0 {
            return Err(AppError::ConfigError(
                "fetch attempts must be at least 1".into(),
            ));
        }
        if self.fetch.politeness_min_ms > self.fetch.politeness_max_ms {
            return Err(AppError::ConfigError(
                "politeness_min_ms must not exceed politeness_max_ms".into(),
            ));
        }
        if let Some(pattern) = &self.salary_pattern {
            Regex::new(pattern).map_err(|e| {
                AppError::ConfigError(format!("Invalid salary_pattern '{pattern}': {e}"))
            })?;
        }
        FilterRules::from_config(self)?;
        Ok(())
    }
}

/// Table names are spliced into SQL, so only `[A-Za-z0-9_]` is accepted.
pub fn validate_table_name(name: &str) -> Result<(), AppError> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(AppError::ConfigError(format!(
            "Invalid table name '{name}': use letters, digits and underscores"
        )))
    }
}

fn default_one() -> u32 {
    1
}

fn default_days_to_scrape() -> i64 {
    7
}

fn default_timespan() -> String {
    "r86400".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/jobs.db")
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
