//! Regional endpoint selection and `metrics:getBatch` request construction.

use serde::Serialize;
use url::Url;

use crate::error::{BatcherError, Result};
use crate::group::BatchGroup;
use crate::http::HttpRequest;

/// API version of the batch endpoint, and of the response shape in [`crate::response`].
pub const BATCH_API_VERSION: &str = "2023-10-01";

const GLOBAL_ENDPOINT: &str = "global.metrics.monitor.azure.com";

/// Host serving batch metrics for `region`.
///
/// An empty region or "global" (any case) maps to the global endpoint. Other regions
/// are lowercased with whitespace removed, so "East US" becomes "eastus".
pub fn regional_endpoint(region: &str) -> String {
    let trimmed = region.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("global") {
        return GLOBAL_ENDPOINT.to_string();
    }

    let normalized: String = trimmed
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    format!("{normalized}.metrics.monitor.azure.com")
}

/// JSON body of a batch request.
#[derive(Debug, Serialize)]
pub struct BatchRequestBody<'a> {
    #[serde(rename = "resourceIds")]
    pub resource_ids: &'a [String],
}

/// Build the batch URL for a group.
pub fn batch_url(group: &BatchGroup, api_version: &str) -> Result<Url> {
    let params = &group.params;
    let mut url = Url::parse(&format!("https://{}/", regional_endpoint(&params.region)))?;

    url.path_segments_mut()
        .map_err(|_| BatcherError::Plugin("batch endpoint URL cannot be a base".to_string()))?
        .pop_if_empty()
        .push("subscriptions")
        .push(&params.subscription)
        .push("metrics:getBatch");

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("api-version", api_version);
        query.append_pair("metricnamespace", &params.namespace);
        query.append_pair("metricnames", &params.metric_name);
        query.append_pair("starttime", &params.time_range.start_rfc3339());
        query.append_pair("endtime", &params.time_range.end_rfc3339());

        // The batch API takes `filter`, not the OData `$filter`
        let filter = params.filter.trim_start_matches('$');
        let optional = [
            ("interval", params.interval.as_str()),
            ("aggregation", params.aggregation.as_str()),
            ("filter", filter),
            ("top", params.top.as_str()),
            ("orderby", params.order_by.as_str()),
        ];
        for (name, value) in optional {
            if !value.is_empty() {
                query.append_pair(name, value);
            }
        }
    }

    Ok(url)
}

/// Build the full POST request for a group.
pub fn batch_request(group: &BatchGroup, api_version: &str) -> Result<HttpRequest> {
    let url = batch_url(group, api_version)?;
    let body = serde_json::to_string(&BatchRequestBody {
        resource_ids: &group.resource_ids,
    })?;

    Ok(HttpRequest {
        method: "POST".to_string(),
        url,
        headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        body,
    })
}
