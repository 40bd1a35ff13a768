//! Legend (alias) templating: `{{token}}` placeholders rendered per series.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::query::{Query, ResourceDescriptor};

static LEGEND_KEY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*(.+?)\s*\}\}").expect("legend key pattern is valid"));

/// Values a legend template can refer to for one series.
pub struct LegendContext<'a> {
    pub query: &'a Query,
    pub resource_id: &'a str,
    pub namespace: &'a str,
    pub metric_name: &'a str,
    /// Dimension labels of the series
    pub labels: &'a BTreeMap<String, String>,
    /// Empty when the subscription's display name is unknown
    pub subscription_name: &'a str,
}

/// Render `template`, replacing recognized tokens and leaving unknown ones untouched.
///
/// Tokens are matched case-insensitively. Anything not covered by a named token is
/// looked up as a dimension label, again case-insensitively.
pub fn render(template: &str, ctx: &LegendContext<'_>) -> String {
    let descriptor = ResourceDescriptor::parse(ctx.resource_id);

    LEGEND_KEY
        .replace_all(template, |caps: &Captures<'_>| {
            let token = caps[1].trim().to_lowercase();
            resolve(&token, ctx, &descriptor).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn resolve(
    token: &str,
    ctx: &LegendContext<'_>,
    descriptor: &ResourceDescriptor,
) -> Option<String> {
    match token {
        "subscriptionid" => return Some(ctx.query.subscription.clone()),
        "subscription" => return Some(ctx.subscription_name.to_string()),
        "namespace" => return Some(ctx.namespace.to_string()),
        "metric" => return Some(ctx.metric_name.to_string()),
        // BTreeMap keys iterate in order, so the first key is the smallest
        "dimensionname" => {
            return Some(ctx.labels.keys().next().cloned().unwrap_or_default());
        }
        "dimensionvalue" => {
            return Some(ctx.labels.values().next().cloned().unwrap_or_default());
        }
        "resourcegroup" => {
            if let Some(group) = &descriptor.resource_group {
                return Some(group.clone());
            }
        }
        "resourcename" => {
            if let Some(name) = &descriptor.resource_name {
                return Some(name.clone());
            }
        }
        _ => {}
    }

    ctx.labels
        .iter()
        .find(|(key, _)| key.to_lowercase() == token)
        .map(|(_, value)| value.clone())
}
