pub mod accounts;
pub mod reports;

pub use accounts::fetch_accounts_and_properties;
pub use reports::{fetch_analytics, run_report};

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::api::{AdminApi, DataApi};
use crate::models::{Account, DateRange, ReportBatch};

/// Where account trees and report batches come from
#[async_trait]
pub trait AnalyticsSource: Send + Sync {
    /// All reachable accounts with their properties
    async fn accounts(&self) -> Result<Vec<Account>>;

    /// One report per property of `accounts` over `range`
    async fn reports(&self, accounts: &[Account], range: &DateRange) -> Result<ReportBatch>;
}

/// Source backed by the remote Admin and Data APIs
pub struct LiveSource {
    admin: Arc<dyn AdminApi>,
    data: Arc<dyn DataApi>,
    report_page_size: u64,
}

impl LiveSource {
    pub fn new(admin: Arc<dyn AdminApi>, data: Arc<dyn DataApi>, report_page_size: u64) -> Self {
        Self {
            admin,
            data,
            report_page_size,
        }
    }
}

#[async_trait]
impl AnalyticsSource for LiveSource {
    async fn accounts(&self) -> Result<Vec<Account>> {
        fetch_accounts_and_properties(self.admin.as_ref()).await
    }

    async fn reports(&self, accounts: &[Account], range: &DateRange) -> Result<ReportBatch> {
        Ok(fetch_analytics(self.data.as_ref(), accounts, range, self.report_page_size).await)
    }
}
