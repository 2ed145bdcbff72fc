//! Account and property enumeration

use anyhow::{Context, Result};
use tracing::info;

use crate::api::{AdminApi, RemoteAccount, RemoteProperty};
use crate::models::{Account, Property};

impl From<RemoteAccount> for Account {
    fn from(remote: RemoteAccount) -> Self {
        Account {
            id: remote.name,
            name: remote.display_name,
            region_code: remote.region_code,
            create_time: remote.create_time,
            update_time: remote.update_time,
            properties: Vec::new(),
        }
        .normalized()
    }
}

impl From<RemoteProperty> for Property {
    fn from(remote: RemoteProperty) -> Self {
        Property {
            id: remote.name,
            account_id: remote.parent,
            name: remote.display_name,
            property_type: remote.property_type,
            industry_category: remote.industry_category,
            time_zone: remote.time_zone,
            currency_code: remote.currency_code,
            create_time: remote.create_time,
            update_time: remote.update_time,
        }
        .normalized()
    }
}

/// List every reachable account and populate its properties
///
/// Any listing failure aborts the fetch; there is no useful partial account tree.
pub async fn fetch_accounts_and_properties(admin: &dyn AdminApi) -> Result<Vec<Account>> {
    let mut accounts: Vec<Account> = admin
        .list_accounts()
        .await
        .context("failed to list analytics accounts")?
        .into_iter()
        .map(Account::from)
        .collect();

    info!("Found {} accounts", accounts.len());

    for account in &mut accounts {
        let properties = admin
            .list_properties(&account.id)
            .await
            .with_context(|| format!("failed to list properties for account {}", account.id))?;

        for property in properties {
            account.push_property(Property::from(property));
        }

        info!(
            "Found {} properties for account {}",
            account.properties.len(),
            account.name
        );
    }

    info!("Accounts and properties fetched successfully");

    Ok(accounts)
}
