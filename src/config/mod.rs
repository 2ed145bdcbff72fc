use std::path::{Path, PathBuf};

use chrono::{Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::api::admin::DEFAULT_ADMIN_API_URL;
use crate::api::data::DEFAULT_DATA_API_URL;
use crate::models::DateRange;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing {what} file: '{}'", path.display())]
    MissingFile { what: &'static str, path: PathBuf },
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("report start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Date the run reports on; defaults to yesterday
    pub reference_date: NaiveDate,
    pub date_range: DateRange,
    pub cache: CacheConfig,
    pub credentials: CredentialsConfig,
    pub api: ApiConfig,
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    /// Key file for the Admin API (account and property listing)
    pub admin: PathBuf,
    /// Key file for the Data API (reports)
    pub service: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub admin_url: String,
    pub data_url: String,
    pub timeout_secs: u64,
    pub admin_page_size: u32,
    pub report_page_size: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Incoming webhook for fatal-error alerts; alerts are only logged when unset
    pub webhook_url: Option<String>,
}

impl ApiConfig {
    const fn default_timeout_secs() -> u64 {
        30
    }

    const fn default_admin_page_size() -> u32 {
        200
    }

    const fn default_report_page_size() -> u64 {
        10_000
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            admin_url: DEFAULT_ADMIN_API_URL.to_string(),
            data_url: DEFAULT_DATA_API_URL.to_string(),
            timeout_secs: Self::default_timeout_secs(),
            admin_page_size: Self::default_admin_page_size(),
            report_page_size: Self::default_report_page_size(),
        }
    }
}

impl NotificationConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self {
            webhook_url: std::env::var("SLACK_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let today = Local::now().date_naive();
        Self::from_lookup(|key| std::env::var(key).ok(), today)
    }

    /// Build the configuration from a variable lookup, relative to `today`
    pub fn from_lookup<F>(lookup: F, today: NaiveDate) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let reference_date = match var("REFERENCE_DATE") {
            Some(value) => parse_date("REFERENCE_DATE", &value)?,
            None => today.checked_sub_days(Days::new(1)).unwrap_or(today),
        };

        let start = match var("START_DATE") {
            Some(value) => parse_date("START_DATE", &value)?,
            None => reference_date,
        };
        let end = match var("END_DATE") {
            Some(value) => parse_date("END_DATE", &value)?,
            None => reference_date,
        };
        let date_range =
            DateRange::new(start, end).map_err(|_| ConfigError::InvalidDateRange { start, end })?;

        let cache_root = PathBuf::from(var("CACHE_DIR").unwrap_or_else(|| "./cache".to_string()));

        let secret_dir = PathBuf::from(var("SECRET_DIR").unwrap_or_else(|| "./secret".to_string()));
        let admin = var("ADMIN_CREDENTIALS")
            .map(PathBuf::from)
            .unwrap_or_else(|| secret_dir.join("admin_credentials.json"));
        let service = var("SERVICE_CREDENTIALS")
            .map(PathBuf::from)
            .unwrap_or_else(|| secret_dir.join("service_credentials.json"));

        let mut api = ApiConfig::default();
        if let Some(url) = var("ADMIN_API_URL") {
            api.admin_url = url;
        }
        if let Some(url) = var("DATA_API_URL") {
            api.data_url = url;
        }
        if let Some(value) = var("HTTP_TIMEOUT_SECS") {
            api.timeout_secs = parse_number("HTTP_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = var("ADMIN_PAGE_SIZE") {
            api.admin_page_size = parse_number("ADMIN_PAGE_SIZE", &value)?;
        }
        if let Some(value) = var("REPORT_PAGE_SIZE") {
            api.report_page_size = parse_number("REPORT_PAGE_SIZE", &value)?;
        }

        Ok(Config {
            reference_date,
            date_range,
            cache: CacheConfig { root: cache_root },
            credentials: CredentialsConfig { admin, service },
            api,
            notification: NotificationConfig {
                webhook_url: var("SLACK_WEBHOOK_URL"),
            },
        })
    }

    /// Directory holding this run's cache artifacts: `<root>/<YYYY>/<Month>`
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir_for(self.reference_date)
    }

    pub fn cache_dir_for(&self, date: NaiveDate) -> PathBuf {
        self.cache.root.join(date.format("%Y/%B").to_string())
    }

    /// Fail if either credential file is absent
    pub fn require_credentials(&self) -> Result<(), ConfigError> {
        require_file("admin credentials JSON", &self.credentials.admin)?;
        require_file("service credentials JSON", &self.credentials.service)
    }
}

fn require_file(what: &'static str, path: &Path) -> Result<(), ConfigError> {
    if path.is_file() {
        Ok(())
    } else {
        tracing::error!("Missing {what} file: '{}'", path.display());
        Err(ConfigError::MissingFile {
            what,
            path: path.to_path_buf(),
        })
    }
}

fn parse_date(key: &'static str, value: &str) -> Result<NaiveDate, ConfigError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|e| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_number<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}
