use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, warn};

use super::disk::{accounts_key, analytics_key, DiskCache};
use crate::fetch::AnalyticsSource;
use crate::models::{Account, DateRange, ReportBatch};

/// Read-through, write-back disk cache in front of another source
///
/// Accounts are keyed by the run's reference date, reports by the requested
/// date range. A hit returns the stored snapshot without touching `inner`.
pub struct CachedSource {
    inner: Arc<dyn AnalyticsSource>,
    cache: DiskCache,
    reference_date: NaiveDate,
}

impl CachedSource {
    pub fn new(
        inner: Arc<dyn AnalyticsSource>,
        cache: DiskCache,
        reference_date: NaiveDate,
    ) -> Self {
        Self {
            inner,
            cache,
            reference_date,
        }
    }

    pub fn cache(&self) -> &DiskCache {
        &self.cache
    }
}

#[async_trait]
impl AnalyticsSource for CachedSource {
    async fn accounts(&self) -> Result<Vec<Account>> {
        let key = accounts_key(self.reference_date);
        if let Some(accounts) = self.cache.load::<Vec<Account>>(&key).await? {
            info!("Loaded {} accounts from cache '{key}'", accounts.len());
            return Ok(accounts);
        }

        let accounts = self.inner.accounts().await?;
        let path = self.cache.store(&key, &accounts).await?;
        info!("Cached accounts to '{}'", path.display());

        Ok(accounts)
    }

    async fn reports(&self, accounts: &[Account], range: &DateRange) -> Result<ReportBatch> {
        let key = analytics_key(range);
        if let Some(batch) = self.cache.load::<ReportBatch>(&key).await? {
            info!(
                "Loaded {} rows for {} properties from cache '{key}'",
                batch.total_rows(),
                batch.reports.len()
            );
            return Ok(batch);
        }

        let batch = self.inner.reports(accounts, range).await?;
        if batch.has_failures() {
            warn!(
                "Not caching '{key}': {} properties failed and will be retried on the next run",
                batch.failures().count()
            );
            return Ok(batch);
        }

        let path = self.cache.store(&key, &batch).await?;
        info!("Cached analytics to '{}'", path.display());

        Ok(batch)
    }
}
