//! Demultiplexes one batch response back onto the queries that contributed to it.

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::QueryError;
use crate::frame::{
    to_display_unit, Aggregation, DataLink, Field, FieldConfig, FieldValues, Frame, TIME_FIELD_NAME,
};
use crate::group::BatchGroup;
use crate::legend::{self, LegendContext};
use crate::portal;
use crate::query::{resource_name_from_id, Query, RefId, SubscriptionNames};
use crate::response::{BatchResponse, BatchValue, Metric, TimeSeries};
use crate::result::{merge_into, QueryResult};

pub const RESOURCE_NAME_LABEL: &str = "resourceName";

/// Collaborators needed to render frames.
#[derive(Debug, Clone, Copy)]
pub struct DistributeContext<'a> {
    pub portal_url: &'a str,
    pub subscription_names: &'a SubscriptionNames,
}

/// Build one result per query in `group` from the group's batch response.
///
/// Resources missing from the response are skipped with a warning. Metrics carrying
/// an error code are skipped too; the first such error becomes the query's error
/// only if the query ends up with no frames at all. Which error is "first" follows
/// response order and is not otherwise guaranteed.
pub fn distribute(
    response: &BatchResponse,
    group: &BatchGroup,
    ctx: &DistributeContext<'_>,
) -> HashMap<RefId, QueryResult> {
    let lookup: HashMap<String, &BatchValue> = response
        .values
        .iter()
        .map(|value| (value.resource_id.to_lowercase(), value))
        .collect();

    let mut results: HashMap<RefId, QueryResult> = HashMap::new();

    for query in &group.queries {
        let mut frames = Vec::new();
        let mut first_error: Option<QueryError> = None;
        let mut visited = HashSet::new();

        // Resources outside this group belong to another chunk of a split group
        let resource_ids = query
            .resource_ids
            .iter()
            .filter(|id| group.contains_resource(id))
            .filter(|id| visited.insert(id.to_lowercase()));

        for resource_id in resource_ids {
            let Some(value) = lookup.get(&resource_id.to_lowercase()) else {
                tracing::warn!(
                    ref_id = %query.ref_id,
                    resource_id = %resource_id,
                    "Resource missing from batch response, skipping"
                );
                continue;
            };

            for metric in &value.metrics {
                if let Some((code, message)) = metric.error() {
                    tracing::warn!(
                        ref_id = %query.ref_id,
                        resource_id = %resource_id,
                        metric = %metric.name.value,
                        error_code = code,
                        error_message = message,
                        "Metric failed in batch response"
                    );
                    first_error.get_or_insert_with(|| {
                        QueryError::downstream(format!(
                            "metric '{}' failed for resource {}: {}: {}",
                            metric.name.value, resource_id, code, message
                        ))
                    });
                    continue;
                }

                for series in &metric.timeseries {
                    frames.push(build_frame(query, resource_id, value, metric, series, ctx));
                }
            }
        }

        let result = match first_error {
            Some(error) if frames.is_empty() => QueryResult::from_error(error),
            Some(error) => {
                tracing::debug!(
                    ref_id = %query.ref_id,
                    frames = frames.len(),
                    error = %error,
                    "Returning partial result"
                );
                QueryResult::from_frames(frames)
            }
            None => QueryResult::from_frames(frames),
        };

        merge_into(&mut results, query.ref_id.clone(), result);
    }

    results
}

fn build_frame(
    query: &Query,
    resource_id: &str,
    value: &BatchValue,
    metric: &Metric,
    series: &TimeSeries,
    ctx: &DistributeContext<'_>,
) -> Frame {
    let aggregation = Aggregation::parse(&query.aggregation);
    let metric_name = if metric.name.value.is_empty() {
        query.metric_name.as_str()
    } else {
        metric.name.value.as_str()
    };
    let namespace = value
        .namespace
        .as_deref()
        .unwrap_or(query.metric_namespace.as_str());
    let resource_name = resource_name_from_id(resource_id);

    let dimensions: BTreeMap<String, String> = series
        .metadatavalues
        .iter()
        .map(|m| (m.name.value.clone(), m.value.clone()))
        .collect();

    let display_name = if query.alias.is_empty() {
        default_display_name(metric_name, &resource_name, &dimensions)
    } else {
        legend::render(
            &query.alias,
            &LegendContext {
                query,
                resource_id,
                namespace,
                metric_name,
                labels: &dimensions,
                subscription_name: ctx.subscription_names.get(&query.subscription),
            },
        )
    };

    let mut labels = dimensions;
    labels.insert(RESOURCE_NAME_LABEL.to_string(), resource_name);

    let times = series.data.iter().map(|p| p.time_stamp).collect();
    let values = series.data.iter().map(|p| aggregation.value_of(p)).collect();

    let unit = (!metric.unit.is_empty()).then(|| to_display_unit(&metric.unit));

    Frame {
        name: metric_name.to_string(),
        fields: vec![
            Field {
                name: TIME_FIELD_NAME.to_string(),
                values: FieldValues::Time(times),
                labels: BTreeMap::new(),
                config: None,
            },
            Field {
                name: metric_name.to_string(),
                values: FieldValues::Number(values),
                labels,
                config: Some(FieldConfig {
                    unit,
                    display_name: Some(display_name),
                    links: vec![DataLink {
                        title: "View in Azure Portal".to_string(),
                        url: portal::metrics_explorer_url(ctx.portal_url, query, resource_id),
                        target_blank: true,
                    }],
                }),
            },
        ],
    }
}

/// `metric (resource)`, or `metric (resource, k1=v1, k2=v2)` when the series has dimensions.
fn default_display_name(
    metric_name: &str,
    resource_name: &str,
    dimensions: &BTreeMap<String, String>,
) -> String {
    let mut parts = vec![resource_name.to_string()];
    parts.extend(dimensions.iter().map(|(k, v)| format!("{k}={v}")));
    format!("{} ({})", metric_name, parts.join(", "))
}
