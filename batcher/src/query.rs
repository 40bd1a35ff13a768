//! Normalized per-panel metric queries.
//!
//! Queries are produced upstream by the query builder and are read-only here: the
//! planner clones them into batch groups but never changes them.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of the panel query a result belongs to (e.g. "A", "B").
pub type RefId = String;

/// Absolute UTC time range of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        Self { from, to }
    }

    /// Start of the range as RFC3339 with a `Z` suffix.
    pub fn start_rfc3339(&self) -> String {
        self.from.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// End of the range as RFC3339 with a `Z` suffix.
    pub fn end_rfc3339(&self) -> String {
        self.to.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

/// One panel's metric request against a set of Azure resources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub ref_id: RefId,
    pub subscription: String,
    /// Azure region of the resources; empty means the global endpoint
    #[serde(default)]
    pub region: String,
    pub metric_namespace: String,
    pub metric_name: String,
    #[serde(default)]
    pub aggregation: String,
    /// ISO-8601 time grain (e.g. "PT5M"); empty lets the service decide
    #[serde(default)]
    pub interval: String,
    /// Dimension filter expression, e.g. "BlobType eq '*'"
    #[serde(default)]
    pub filter: String,
    #[serde(default)]
    pub top: String,
    #[serde(default)]
    pub order_by: String,
    pub time_range: TimeRange,
    /// Azure Resource Manager ids
    pub resource_ids: Vec<String>,
    /// Legend template rendered per series
    #[serde(default)]
    pub alias: String,
}

/// The parts of an ARM resource id that matter for display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub subscription: Option<String>,
    pub resource_group: Option<String>,
    pub provider: Option<String>,
    pub resource_name: Option<String>,
}

impl ResourceDescriptor {
    /// Parse an id shaped like
    /// `/subscriptions/{sub}/resourceGroups/{rg}/providers/{ns}/{type}/{name}`.
    ///
    /// Segment names are matched case-insensitively. Missing parts are `None`.
    pub fn parse(resource_id: &str) -> Self {
        let segments: Vec<&str> = resource_id.split('/').filter(|s| !s.is_empty()).collect();
        let mut descriptor = Self::default();

        let mut i = 0;
        while i + 1 < segments.len() {
            let key = segments[i].to_ascii_lowercase();
            let value = segments[i + 1];
            match key.as_str() {
                "subscriptions" => descriptor.subscription = Some(value.to_string()),
                "resourcegroups" => descriptor.resource_group = Some(value.to_string()),
                "providers" => {
                    descriptor.provider = Some(value.to_string());
                    // {ns}/{type}/{name}[/{subtype}/{subname}...]: the name is the last segment
                    if segments.len() >= i + 4 {
                        descriptor.resource_name = segments.last().map(|s| s.to_string());
                    }
                    break;
                }
                _ => {}
            }
            i += 2;
        }

        descriptor
    }
}

/// Last path segment of a resource id, used as the `resourceName` label.
pub fn resource_name_from_id(resource_id: &str) -> String {
    resource_id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// Display names of subscriptions, keyed case-insensitively by subscription id.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionNames(HashMap<String, String>);

impl SubscriptionNames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, subscription_id: &str, display_name: impl Into<String>) {
        self.0
            .insert(subscription_id.to_lowercase(), display_name.into());
    }

    /// The display name, or an empty string when unknown.
    pub fn get(&self, subscription_id: &str) -> &str {
        self.0
            .get(&subscription_id.to_lowercase())
            .map(String::as_str)
            .unwrap_or("")
    }
}

impl From<HashMap<String, String>> for SubscriptionNames {
    fn from(map: HashMap<String, String>) -> Self {
        let mut names = Self::new();
        for (id, name) in map {
            names.insert(&id, name);
        }
        names
    }
}
