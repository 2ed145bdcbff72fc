//! Per-property usage reports

use tracing::{error, info};

use crate::api::{ApiError, DataApi};
use crate::models::{
    Account, AnalyticsRow, DateRange, FailureKind, Property, PropertyReport, Report,
    ReportBatch, ReportFailure, ReportOutcome,
};

/// Fetch the usage report of every property, in account-then-property order
///
/// A failing property is recorded as [`ReportOutcome::Failed`] and the batch
/// moves on to the next one.
pub async fn fetch_analytics(
    data: &dyn DataApi,
    accounts: &[Account],
    range: &DateRange,
    page_size: u64,
) -> ReportBatch {
    let mut batch = ReportBatch::default();

    for account in accounts {
        info!("Fetching analytics for account '{}'", account.name);
        for property in &account.properties {
            info!("Fetching analytics for property '{}'", property.name);

            let outcome = match run_report(data, property, range, page_size).await {
                Ok(rows) => {
                    info!(
                        "Fetched {} rows for property '{}'",
                        rows.len(),
                        property.name
                    );
                    ReportOutcome::Rows { rows }
                }
                Err(failure) => {
                    error!(
                        "Skipping property '{}' ({}): {}",
                        property.name, property.id, failure.message
                    );
                    ReportOutcome::Failed(failure)
                }
            };

            batch.reports.push(PropertyReport {
                account_id: account.id.clone(),
                property_id: property.id.clone(),
                property_name: property.name.clone(),
                outcome,
            });
        }
    }

    info!("Fetched {} rows in total", batch.total_rows());
    info!("Done fetching analytics");

    batch
}

/// Run the usage report for one property, following offset pagination
pub async fn run_report(
    data: &dyn DataApi,
    property: &Property,
    range: &DateRange,
    page_size: u64,
) -> Result<Vec<AnalyticsRow>, ReportFailure> {
    let report = Report::usage(&property.id, *range);
    let page_size = page_size.max(1);
    let mut rows = Vec::new();

    loop {
        let request = report.to_request(rows.len() as u64, page_size);
        let response = data
            .run_report(&report.property, &request)
            .await
            .map_err(api_failure)?;

        let received = response.rows.len();
        for row in &response.rows {
            let row = AnalyticsRow::from_response_row(
                row,
                &response.dimension_headers,
                &response.metric_headers,
            )
            .map_err(|e| ReportFailure {
                kind: FailureKind::MalformedResponse,
                message: e.to_string(),
            })?;
            rows.push(row);
        }

        if received == 0 || rows.len() as u64 >= response.row_count {
            break;
        }
    }

    Ok(rows)
}

fn api_failure(err: ApiError) -> ReportFailure {
    let kind = if err.is_permission_denied() {
        FailureKind::PermissionDenied
    } else {
        FailureKind::Api
    };
    ReportFailure {
        kind,
        message: err.to_string(),
    }
}
