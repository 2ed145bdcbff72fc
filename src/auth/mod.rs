//! Access tokens for the Google APIs

mod service_account;

pub use service_account::{ServiceAccountKey, ServiceAccountTokenSource, ANALYTICS_READONLY_SCOPE};

use async_trait::async_trait;

use crate::api::ApiError;

/// Supplies bearer tokens for API requests
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, ApiError>;
}

/// A fixed token, for tooling and tests
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, ApiError> {
        Ok(self.0.clone())
    }
}
