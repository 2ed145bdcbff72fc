//! Account and property records returned by the Admin API

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

/// An analytics account together with the properties it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub region_code: String,
    pub create_time: String,
    pub update_time: String,
    pub properties: Vec<Property>,
}

/// A trackable analytics surface (website or app) belonging to one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: String,
    /// Id of the owning [`Account`]
    pub account_id: String,
    pub name: String,
    pub property_type: String,
    pub industry_category: String,
    pub time_zone: String,
    pub currency_code: String,
    pub create_time: String,
    pub update_time: String,
}

impl Account {
    /// Strip the resource prefix from the id, normalize timestamps and trim every field
    pub fn normalized(self) -> Self {
        Self {
            id: normalize_resource_id(&self.id),
            name: self.name.trim().to_string(),
            region_code: self.region_code.trim().to_string(),
            create_time: normalize_timestamp(&self.create_time),
            update_time: normalize_timestamp(&self.update_time),
            properties: self.properties,
        }
    }

    /// Append a property, forcing its foreign key to this account
    pub fn push_property(&mut self, mut property: Property) {
        property.account_id = self.id.clone();
        self.properties.push(property);
    }
}

impl Property {
    pub fn normalized(self) -> Self {
        Self {
            id: normalize_resource_id(&self.id),
            account_id: normalize_resource_id(&self.account_id),
            name: self.name.trim().to_string(),
            property_type: self.property_type.trim().to_string(),
            industry_category: self.industry_category.trim().to_string(),
            time_zone: self.time_zone.trim().to_string(),
            currency_code: self.currency_code.trim().to_string(),
            create_time: normalize_timestamp(&self.create_time),
            update_time: normalize_timestamp(&self.update_time),
        }
    }
}

/// Return the last segment of a `/`-separated resource name (`accounts/123` -> `123`)
pub fn normalize_resource_id(name: &str) -> String {
    name.rsplit('/').next().unwrap_or_default().trim().to_string()
}

/// Reformat an RFC 3339 timestamp to second precision with a numeric offset
///
/// The Admin API reports timestamps with nanosecond precision and a `Z` suffix;
/// records carry them as e.g. `2023-04-01T10:20:30+00:00`.
pub fn normalize_timestamp(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match DateTime::parse_from_rfc3339(trimmed) {
        Ok(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, false),
        Err(e) => {
            tracing::warn!("Keeping unparseable timestamp '{trimmed}' as-is: {e}");
            trimmed.to_string()
        }
    }
}
