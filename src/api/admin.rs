//! Google Analytics Admin API: account and property listing

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::{read_json, ApiError};
use crate::auth::TokenSource;

pub const DEFAULT_ADMIN_API_URL: &str = "https://analyticsadmin.googleapis.com/v1beta";

/// Account entry as returned by `accounts.list`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteAccount {
    pub name: String,
    pub display_name: String,
    pub region_code: String,
    pub create_time: String,
    pub update_time: String,
}

/// Property entry as returned by `properties.list`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RemoteProperty {
    pub name: String,
    pub parent: String,
    pub display_name: String,
    pub property_type: String,
    pub industry_category: String,
    pub time_zone: String,
    pub currency_code: String,
    pub create_time: String,
    pub update_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAccountsResponse {
    #[serde(default)]
    accounts: Vec<RemoteAccount>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPropertiesResponse {
    #[serde(default)]
    properties: Vec<RemoteProperty>,
    next_page_token: Option<String>,
}

/// Directory of accounts and properties reachable by a set of credentials
#[async_trait]
pub trait AdminApi: Send + Sync {
    /// List every account, following pagination to the end
    async fn list_accounts(&self) -> Result<Vec<RemoteAccount>, ApiError>;

    /// List every property whose parent is `accounts/<account_id>`
    async fn list_properties(&self, account_id: &str) -> Result<Vec<RemoteProperty>, ApiError>;
}

pub struct AdminClient {
    client: Client,
    base_url: String,
    page_size: u32,
    tokens: Arc<dyn TokenSource>,
}

impl AdminClient {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        page_size: u32,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            page_size,
            tokens,
        }
    }

    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        filter: Option<&str>,
        page_token: Option<&str>,
    ) -> Result<T, ApiError> {
        let token = self.tokens.access_token().await?;

        let mut query: Vec<(&str, String)> = vec![("pageSize", self.page_size.to_string())];
        if let Some(filter) = filter {
            query.push(("filter", filter.to_string()));
        }
        if let Some(page_token) = page_token {
            query.push(("pageToken", page_token.to_string()));
        }

        let response = self
            .client
            .get(format!("{}/{path}", self.base_url))
            .bearer_auth(token)
            .query(&query)
            .send()
            .await?;

        read_json(response).await
    }
}

#[async_trait]
impl AdminApi for AdminClient {
    async fn list_accounts(&self) -> Result<Vec<RemoteAccount>, ApiError> {
        let mut accounts = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: ListAccountsResponse = self
                .get_page("accounts", None, page_token.as_deref())
                .await?;
            debug!("Received page of {} accounts", page.accounts.len());
            accounts.extend(page.accounts);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(accounts)
    }

    async fn list_properties(&self, account_id: &str) -> Result<Vec<RemoteProperty>, ApiError> {
        let filter = format!("parent:accounts/{account_id}");
        let mut properties = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: ListPropertiesResponse = self
                .get_page("properties", Some(&filter), page_token.as_deref())
                .await?;
            debug!(
                "Received page of {} properties for account {account_id}",
                page.properties.len()
            );
            properties.extend(page.properties);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_responses_tolerate_missing_fields() {
        let page: ListAccountsResponse = serde_json::from_str("{}").unwrap();
        assert!(page.accounts.is_empty());
        assert!(page.next_page_token.is_none());

        let page: ListPropertiesResponse = serde_json::from_str(
            r#"{"properties":[{"name":"properties/45","parent":"accounts/123","displayName":"Shop","propertyType":"PROPERTY_TYPE_ORDINARY"}],"nextPageToken":"abc"}"#,
        )
        .unwrap();
        assert_eq!(page.properties[0].display_name, "Shop");
        assert_eq!(page.properties[0].time_zone, "");
        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
    }
}
