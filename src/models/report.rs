//! Report request descriptor for the Data API

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::api::data::{Dimension, DimensionOrderBy, Metric, OrderBy, RunReportRequest};

/// Dimensions of the daily usage report, in request order
pub const USAGE_DIMENSIONS: [&str; 5] = ["date", "city", "cityId", "country", "countryId"];

/// Metrics of the daily usage report, in request order
pub const USAGE_METRICS: [&str; 5] = [
    "sessions",
    "newUsers",
    "totalUsers",
    "bounceRate",
    "userEngagementDuration",
];

/// Inclusive range of report dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateRange {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> anyhow::Result<Self> {
        if start_date > end_date {
            anyhow::bail!("date range start {start_date} is after end {end_date}");
        }
        Ok(Self {
            start_date,
            end_date,
        })
    }

    /// Range covering a single day
    pub const fn single(date: NaiveDate) -> Self {
        Self {
            start_date: date,
            end_date: date,
        }
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DateRange(start_date={}, end_date={})",
            self.start_date, self.end_date
        )
    }
}

/// Everything needed to request one property's report
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub property_id: String,
    /// Resource path derived from `property_id` (`properties/<id>`)
    pub property: String,
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
    pub date_ranges: Vec<DateRange>,
    pub order_bys: Vec<OrderBy>,
}

impl Report {
    pub fn new(
        property_id: impl Into<String>,
        dimensions: Vec<Dimension>,
        metrics: Vec<Metric>,
        date_ranges: Vec<DateRange>,
        order_bys: Vec<OrderBy>,
    ) -> Self {
        let property_id = property_id.into();
        Self {
            property: format!("properties/{property_id}"),
            property_id,
            dimensions,
            metrics,
            date_ranges,
            order_bys,
        }
    }

    /// The fixed daily sessions/users/bounce-rate by city/country report
    pub fn usage(property_id: impl Into<String>, range: DateRange) -> Self {
        Self::new(
            property_id,
            USAGE_DIMENSIONS.iter().map(|name| Dimension::named(*name)).collect(),
            USAGE_METRICS.iter().map(|name| Metric::named(*name)).collect(),
            vec![range],
            vec![OrderBy {
                dimension: Some(DimensionOrderBy {
                    dimension_name: "date".to_string(),
                }),
                desc: false,
            }],
        )
    }

    /// Build the request body for one page of this report
    pub fn to_request(&self, offset: u64, limit: u64) -> RunReportRequest {
        RunReportRequest {
            dimensions: self.dimensions.clone(),
            metrics: self.metrics.clone(),
            date_ranges: self.date_ranges.clone(),
            order_bys: self.order_bys.clone(),
            keep_empty_rows: false,
            offset,
            limit,
        }
    }
}
