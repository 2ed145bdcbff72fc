//! Google Analytics Data API: `properties.runReport`

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{read_json, ApiError};
use crate::auth::TokenSource;
use crate::models::DateRange;

pub const DEFAULT_DATA_API_URL: &str = "https://analyticsdata.googleapis.com/v1beta";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
}

impl Dimension {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    pub name: String,
}

impl Metric {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DimensionOrderBy {
    pub dimension_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<DimensionOrderBy>,
    pub desc: bool,
}

/// Request body of `runReport`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportRequest {
    pub dimensions: Vec<Dimension>,
    pub metrics: Vec<Metric>,
    pub date_ranges: Vec<DateRange>,
    pub order_bys: Vec<OrderBy>,
    /// Omitted when false so the API drops all-zero rows
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub keep_empty_rows: bool,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DimensionHeader {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricHeader {
    pub name: String,
    #[serde(rename = "type", default)]
    pub metric_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CellValue {
    #[serde(default)]
    pub value: String,
}

/// One result row; values are parallel to the response headers
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseRow {
    #[serde(default)]
    pub dimension_values: Vec<CellValue>,
    #[serde(default)]
    pub metric_values: Vec<CellValue>,
}

/// Response body of `runReport`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RunReportResponse {
    pub dimension_headers: Vec<DimensionHeader>,
    pub metric_headers: Vec<MetricHeader>,
    pub rows: Vec<ResponseRow>,
    /// Total rows in the result, regardless of the requested page
    pub row_count: u64,
}

#[async_trait]
pub trait DataApi: Send + Sync {
    /// Run one report request against `properties/<id>`
    async fn run_report(
        &self,
        property: &str,
        request: &RunReportRequest,
    ) -> Result<RunReportResponse, ApiError>;
}

pub struct DataClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl DataClient {
    pub fn new(client: Client, base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }
}

#[async_trait]
impl DataApi for DataClient {
    async fn run_report(
        &self,
        property: &str,
        request: &RunReportRequest,
    ) -> Result<RunReportResponse, ApiError> {
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(format!("{}/{property}:runReport", self.base_url))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;

        read_json(response).await
    }
}
