//! HTTP clients for the Google Analytics Admin and Data APIs

pub mod admin;
pub mod data;
pub mod error;

pub use admin::{AdminApi, AdminClient, RemoteAccount, RemoteProperty};
pub use data::{DataApi, DataClient, RunReportRequest, RunReportResponse};
pub use error::ApiError;

use std::time::Duration;

use reqwest::Client;

/// Build the shared HTTP client used by both API clients
pub fn http_client(timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .user_agent(concat!("ga-extract/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|e| ApiError::Init(e.to_string()))
}

/// Decode a JSON response body, mapping non-success statuses to [`ApiError`]
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::from_response(status, &body));
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}
