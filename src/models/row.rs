//! Flattened report rows and per-property result collections

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::api::data::{DimensionHeader, MetricHeader, ResponseRow};

#[derive(Debug, Error, PartialEq)]
pub enum RowError {
    #[error("response row is missing field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' has invalid value '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

/// One denormalized report row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRow {
    pub date: String,
    pub city: String,
    pub city_id: String,
    pub country: String,
    pub country_code: String,
    pub sessions: i64,
    pub new_users: i64,
    pub total_users: i64,
    pub bounce_rate: f64,
    pub user_engagement_duration: i64,
    /// Deterministic id over (date, city id, country code) for idempotent downstream inserts
    pub uuid: Uuid,
}

impl AnalyticsRow {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date: &str,
        city: &str,
        city_id: &str,
        country: &str,
        country_code: &str,
        sessions: i64,
        new_users: i64,
        total_users: i64,
        bounce_rate: f64,
        user_engagement_duration: i64,
    ) -> Self {
        let date = date.trim();
        let city_id = city_id.trim();
        let country_code = country_code.trim();

        Self {
            uuid: row_uuid(date, city_id, country_code),
            date: date.to_string(),
            city: city.trim().to_string(),
            city_id: city_id.to_string(),
            country: country.trim().to_string(),
            country_code: country_code.to_string(),
            sessions,
            new_users,
            total_users,
            bounce_rate,
            user_engagement_duration,
        }
    }

    /// Convert a Data API row by pairing each header with the value at the same position
    pub fn from_response_row(
        row: &ResponseRow,
        dimension_headers: &[DimensionHeader],
        metric_headers: &[MetricHeader],
    ) -> Result<Self, RowError> {
        let mut fields: HashMap<&str, &str> = HashMap::new();
        for (header, value) in dimension_headers.iter().zip(&row.dimension_values) {
            fields.insert(header.name.as_str(), value.value.as_str());
        }
        for (header, value) in metric_headers.iter().zip(&row.metric_values) {
            fields.insert(header.name.as_str(), value.value.as_str());
        }

        let get = |field: &'static str| {
            fields
                .get(field)
                .copied()
                .ok_or(RowError::MissingField(field))
        };

        let raw_date = get("date")?;
        let date = NaiveDate::parse_from_str(raw_date.trim(), "%Y%m%d")
            .map_err(|_| RowError::InvalidValue {
                field: "date",
                value: raw_date.to_string(),
            })?
            .format("%Y-%m-%d")
            .to_string();

        Ok(Self::new(
            &date,
            get("city")?,
            get("cityId")?,
            get("country")?,
            get("countryId")?,
            parse_number(get("sessions")?, "sessions")?,
            parse_number(get("newUsers")?, "newUsers")?,
            parse_number(get("totalUsers")?, "totalUsers")?,
            parse_number(get("bounceRate")?, "bounceRate")?,
            parse_number(get("userEngagementDuration")?, "userEngagementDuration")?,
        ))
    }
}

/// UUIDv5 in the DNS namespace over `<date>_<city_id>_<country_code>`
pub fn row_uuid(date: &str, city_id: &str, country_code: &str) -> Uuid {
    let identifier = format!("{date}_{city_id}_{country_code}");
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, identifier.as_bytes())
}

fn parse_number<T: std::str::FromStr>(value: &str, field: &'static str) -> Result<T, RowError> {
    value.trim().parse().map_err(|_| RowError::InvalidValue {
        field,
        value: value.to_string(),
    })
}

/// Why a property's report could not be fetched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    PermissionDenied,
    Api,
    MalformedResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFailure {
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReportOutcome {
    Rows { rows: Vec<AnalyticsRow> },
    Failed(ReportFailure),
}

/// Report rows for one property, or the reason they are missing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyReport {
    pub account_id: String,
    pub property_id: String,
    pub property_name: String,
    pub outcome: ReportOutcome,
}

impl PropertyReport {
    pub fn rows(&self) -> &[AnalyticsRow] {
        match &self.outcome {
            ReportOutcome::Rows { rows } => rows,
            ReportOutcome::Failed(_) => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    pub fn failure(&self) -> Option<&ReportFailure> {
        match &self.outcome {
            ReportOutcome::Failed(failure) => Some(failure),
            ReportOutcome::Rows { .. } => None,
        }
    }
}

/// All property reports of one run, in account-then-property order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportBatch {
    pub reports: Vec<PropertyReport>,
}

impl ReportBatch {
    pub fn total_rows(&self) -> usize {
        self.reports.iter().map(PropertyReport::len).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PropertyReport> {
        self.reports.iter().filter(|r| r.failure().is_some())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::data::CellValue;

    fn dimension_headers() -> Vec<DimensionHeader> {
        ["date", "city", "cityId", "country", "countryId"]
            .into_iter()
            .map(|name| DimensionHeader { name: name.into() })
            .collect()
    }

    fn metric_headers() -> Vec<MetricHeader> {
        [
            "sessions",
            "newUsers",
            "totalUsers",
            "bounceRate",
            "userEngagementDuration",
        ]
        .into_iter()
        .map(|name| MetricHeader {
            name: name.into(),
            metric_type: None,
        })
        .collect()
    }

    fn cells(values: &[&str]) -> Vec<CellValue> {
        values
            .iter()
            .map(|v| CellValue {
                value: (*v).to_string(),
            })
            .collect()
    }

    fn paris_row() -> ResponseRow {
        ResponseRow {
            dimension_values: cells(&["20240115", "Paris", "abc", "France", "FR"]),
            metric_values: cells(&["10", "2", "8", "0.5", "120"]),
        }
    }

    #[test]
    fn converts_response_row_to_typed_record() {
        let row =
            AnalyticsRow::from_response_row(&paris_row(), &dimension_headers(), &metric_headers())
                .unwrap();

        assert_eq!(row.date, "2024-01-15");
        assert_eq!(row.city, "Paris");
        assert_eq!(row.city_id, "abc");
        assert_eq!(row.country, "France");
        assert_eq!(row.country_code, "FR");
        assert_eq!(row.sessions, 10);
        assert_eq!(row.new_users, 2);
        assert_eq!(row.total_users, 8);
        assert_eq!(row.bounce_rate, 0.5);
        assert_eq!(row.user_engagement_duration, 120);
        assert_eq!(row.uuid, row_uuid("2024-01-15", "abc", "FR"));
    }

    #[test]
    fn header_order_drives_field_mapping() {
        let mut headers = dimension_headers();
        headers.reverse();
        let row = ResponseRow {
            dimension_values: cells(&["FR", "France", "abc", "Paris", "20240115"]),
            metric_values: cells(&["10", "2", "8", "0.5", "120"]),
        };

        let row = AnalyticsRow::from_response_row(&row, &headers, &metric_headers()).unwrap();
        assert_eq!(row.date, "2024-01-15");
        assert_eq!(row.country_code, "FR");
    }

    #[test]
    fn uuid_depends_only_on_date_city_and_country() {
        let a = AnalyticsRow::new("2024-01-15", "Paris", "abc", "France", "FR", 1, 1, 1, 0.1, 1);
        let b = AnalyticsRow::new("2024-01-15", "Lutetia", "abc", "Gaule", "FR", 9, 9, 9, 0.9, 9);
        let c = AnalyticsRow::new("2024-01-16", "Paris", "abc", "France", "FR", 1, 1, 1, 0.1, 1);

        assert_eq!(a.uuid, b.uuid);
        assert_ne!(a.uuid, c.uuid);
        assert_eq!(a.uuid.get_version_num(), 5);
    }

    #[test]
    fn uuid_survives_serialization() {
        let row =
            AnalyticsRow::new(" 2024-01-15", " Paris ", "abc ", "France", "FR", 1, 2, 3, 0.5, 4);
        let json = serde_json::to_string(&row).unwrap();
        let back: AnalyticsRow = serde_json::from_str(&json).unwrap();

        assert_eq!(back, row);
        assert_eq!(back.uuid, row_uuid(&back.date, &back.city_id, &back.country_code));
    }

    #[test]
    fn rejects_missing_and_malformed_values() {
        let mut short = paris_row();
        short.metric_values.pop();
        assert_eq!(
            AnalyticsRow::from_response_row(&short, &dimension_headers(), &metric_headers()),
            Err(RowError::MissingField("userEngagementDuration"))
        );

        let mut bad = paris_row();
        bad.metric_values[0].value = "ten".into();
        assert!(matches!(
            AnalyticsRow::from_response_row(&bad, &dimension_headers(), &metric_headers()),
            Err(RowError::InvalidValue { field: "sessions", .. })
        ));

        let mut bad_date = paris_row();
        bad_date.dimension_values[0].value = "2024-01-15".into();
        assert!(matches!(
            AnalyticsRow::from_response_row(&bad_date, &dimension_headers(), &metric_headers()),
            Err(RowError::InvalidValue { field: "date", .. })
        ));
    }

    #[test]
    fn failed_reports_count_as_empty() {
        let batch = ReportBatch {
            reports: vec![
                PropertyReport {
                    account_id: "1".into(),
                    property_id: "10".into(),
                    property_name: "ok".into(),
                    outcome: ReportOutcome::Rows {
                        rows: vec![AnalyticsRow::new(
                            "2024-01-15", "Paris", "abc", "France", "FR", 1, 1, 1, 0.0, 1,
                        )],
                    },
                },
                PropertyReport {
                    account_id: "1".into(),
                    property_id: "11".into(),
                    property_name: "denied".into(),
                    outcome: ReportOutcome::Failed(ReportFailure {
                        kind: FailureKind::PermissionDenied,
                        message: "no access".into(),
                    }),
                },
            ],
        };

        assert_eq!(batch.total_rows(), 1);
        assert!(batch.has_failures());
        assert_eq!(batch.failures().count(), 1);
        assert!(batch.reports[1].is_empty());
    }
}
