//! Run orchestration and the top-level failure boundary

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::api::{self, AdminClient, DataClient};
use crate::auth::{ServiceAccountTokenSource, ANALYTICS_READONLY_SCOPE};
use crate::cache::{CachedSource, DiskCache};
use crate::config::Config;
use crate::fetch::{AnalyticsSource, LiveSource};
use crate::models::{DateRange, ReportBatch};
use crate::notify::Notifier;

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub date_range: DateRange,
    pub accounts: usize,
    pub properties: usize,
    pub rows: usize,
    /// Ids of properties whose report could not be fetched
    pub failed_properties: Vec<String>,
}

impl RunSummary {
    fn new(range: &DateRange, accounts: usize, properties: usize, batch: &ReportBatch) -> Self {
        Self {
            date_range: *range,
            accounts,
            properties,
            rows: batch.total_rows(),
            failed_properties: batch.failures().map(|r| r.property_id.clone()).collect(),
        }
    }
}

/// Raised by [`run_guarded`] when the job errored or panicked
#[derive(Debug, Error)]
#[error("run failed: {report}")]
pub struct JobFailed {
    pub report: String,
}

/// Admin API client authenticated with the admin credentials
pub fn admin_client(config: &Config, http: Client) -> Result<AdminClient> {
    let tokens = ServiceAccountTokenSource::from_file(
        &config.credentials.admin,
        ANALYTICS_READONLY_SCOPE,
        http.clone(),
    )?;
    Ok(AdminClient::new(
        http,
        config.api.admin_url.clone(),
        config.api.admin_page_size,
        Arc::new(tokens),
    ))
}

/// Data API client authenticated with the reporting credentials
pub fn data_client(config: &Config, http: Client) -> Result<DataClient> {
    let tokens = ServiceAccountTokenSource::from_file(
        &config.credentials.service,
        ANALYTICS_READONLY_SCOPE,
        http.clone(),
    )?;
    Ok(DataClient::new(http, config.api.data_url.clone(), Arc::new(tokens)))
}

/// Build the live clients behind a date-keyed disk cache
pub async fn build_source(config: &Config) -> Result<CachedSource> {
    let http = api::http_client(Duration::from_secs(config.api.timeout_secs))?;
    let admin = admin_client(config, http.clone())?;
    let data = data_client(config, http)?;
    let live = LiveSource::new(Arc::new(admin), Arc::new(data), config.api.report_page_size);

    let cache_dir = config.cache_dir();
    let cache = DiskCache::open(&cache_dir)
        .await
        .with_context(|| format!("cannot prepare cache directory '{}'", cache_dir.display()))?;

    Ok(CachedSource::new(Arc::new(live), cache, config.reference_date))
}

/// Validate credentials, then fetch accounts and reports for the configured range
pub async fn run(config: Config, today: NaiveDate) -> Result<RunSummary> {
    info!("Starting the process for '{today}'");
    info!("Fetching Google Analytics for {}", config.date_range);

    config.require_credentials()?;
    let source = build_source(&config).await?;

    execute(&source, &config.date_range).await
}

/// Fetch accounts, then the report of every property, from `source`
pub async fn execute(source: &dyn AnalyticsSource, range: &DateRange) -> Result<RunSummary> {
    let accounts = source.accounts().await?;
    let properties = accounts.iter().map(|a| a.properties.len()).sum();

    let batch = source.reports(&accounts, range).await?;
    let summary = RunSummary::new(range, accounts.len(), properties, &batch);

    if summary.failed_properties.is_empty() {
        info!(
            "Run complete: {} accounts, {} properties, {} rows",
            summary.accounts, summary.properties, summary.rows
        );
    } else {
        warn!(
            "Run complete with {} failed properties ({}): {} accounts, {} properties, {} rows",
            summary.failed_properties.len(),
            summary.failed_properties.join(", "),
            summary.accounts,
            summary.properties,
            summary.rows
        );
    }

    Ok(summary)
}

/// Run `job` on its own task, turning any error or panic into an alert
pub async fn run_guarded<T, F>(notifier: &dyn Notifier, job: F) -> Result<T, JobFailed>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    let report = match tokio::spawn(job).await {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(e)) => {
            error!("An unexpected error occurred: {e:#}");
            format!("{e:?}")
        }
        Err(join_error) if join_error.is_panic() => {
            let payload = join_error.into_panic();
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string());
            error!("The run panicked: {message}");
            format!("panic: {message}")
        }
        Err(join_error) => {
            error!("The run was cancelled: {join_error}");
            join_error.to_string()
        }
    };

    let alert = format!("An unexpected error occurred in Google Analytics process:\n{report}");
    if let Err(e) = notifier.send_message(&alert).await {
        error!("Failed to send failure notification: {e}");
    }

    Err(JobFailed { report })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::NotifyError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send_message(&self, text: &str) -> Result<(), NotifyError> {
            self.messages.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    #[tokio::test]
    async fn successful_job_sends_nothing() {
        let notifier = RecordingNotifier::default();

        let value = run_guarded(&notifier, async { Ok(42) }).await.unwrap();

        assert_eq!(value, 42);
        assert!(notifier.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_job_is_reported_with_its_causes() {
        let notifier = RecordingNotifier::default();

        let result: Result<(), _> = run_guarded(&notifier, async {
            Err(anyhow::anyhow!("token endpoint unreachable"))
                .context("failed to list analytics accounts")
        })
        .await;

        let failure = result.unwrap_err();
        assert!(failure.report.contains("failed to list analytics accounts"));
        assert!(failure.report.contains("token endpoint unreachable"));

        let messages = notifier.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0]
            .starts_with("An unexpected error occurred in Google Analytics process:\n"));
    }

    #[tokio::test]
    async fn panicking_job_is_captured() {
        let notifier = RecordingNotifier::default();

        let result: Result<(), _> = run_guarded(&notifier, async {
            let items: Vec<u32> = Vec::new();
            if items.is_empty() {
                panic!("no items to process");
            }
            Ok(())
        })
        .await;

        assert!(result.unwrap_err().report.contains("no items to process"));
        assert_eq!(notifier.messages.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_credentials_stop_the_run_before_any_fetch() {
        let tmp = tempfile::tempdir().unwrap();
        let secret_dir = tmp.path().join("secret").display().to_string();
        let cache_dir = tmp.path().join("cache").display().to_string();
        let today = NaiveDate::from_ymd_opt(2024, 1, 16).unwrap();
        let config = Config::from_lookup(
            |key| match key {
                "SECRET_DIR" => Some(secret_dir.clone()),
                "CACHE_DIR" => Some(cache_dir.clone()),
                _ => None,
            },
            today,
        )
        .unwrap();

        let err = run(config, today).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<crate::config::ConfigError>(),
            Some(crate::config::ConfigError::MissingFile { .. })
        ));
        assert!(!tmp.path().join("cache").exists());
    }
}
