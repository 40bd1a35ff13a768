//! Deep links into the Azure Portal metrics explorer.

use serde_json::json;
use url::form_urlencoded;

use crate::frame::Aggregation;
use crate::query::{resource_name_from_id, Query};

pub const DEFAULT_PORTAL_URL: &str = "https://portal.azure.com";

/// Query-escape a JSON fragment for the portal's URL fragment.
///
/// Spaces must be `%20`: the portal does not decode `+`.
fn escape(fragment: &str) -> String {
    form_urlencoded::byte_serialize(fragment.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

/// Link that opens `resource_id`'s chart for the query's metric in the portal.
pub fn metrics_explorer_url(portal_url: &str, query: &Query, resource_id: &str) -> String {
    let timespan = json!({
        "absolute": {
            "startTime": query.time_range.start_rfc3339(),
            "endTime": query.time_range.end_rfc3339(),
        }
    });

    let chart = json!({
        "v2charts": [{
            "metrics": [{
                "resourceMetadata": { "id": resource_id },
                "name": query.metric_name,
                "aggregationType": Aggregation::parse(&query.aggregation).portal_code(),
                "namespace": query.metric_namespace,
                "metricVisualization": {
                    "displayName": query.metric_name,
                    "resourceDisplayName": resource_name_from_id(resource_id),
                },
            }]
        }]
    });

    format!(
        "{}/#blade/Microsoft_Azure_MonitoringMetrics/Metrics.ReactView/Referer/MetricsExplorer/TimeContext/{}/ChartDefinition/{}",
        portal_url.trim_end_matches('/'),
        escape(&timespan.to_string()),
        escape(&chart.to_string()),
    )
}
