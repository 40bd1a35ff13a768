//! Groups batchable queries into `metrics:getBatch` calls.
//!
//! Two queries share a group only when every shared parameter matches exactly,
//! including the metric name. Groups larger than the per-request resource limit are
//! split into contiguous chunks.
//!
//! A query whose resources straddle a chunk boundary is attached to every chunk it
//! touches. Its per-group results must be merged afterwards, see
//! [`QueryResult::merge`](crate::result::QueryResult::merge).

use std::collections::{HashMap, HashSet};

use chrono::SecondsFormat;
use sha2::{Digest, Sha256};

use crate::query::{Query, TimeRange};

/// Maximum number of resource ids the batch endpoint accepts per request.
pub const MAX_RESOURCES_PER_BATCH: usize = 50;

/// Parameters shared by every query in a group.
///
/// The grouping key only ever carries one metric name, so one group maps to one
/// metric. The request format would accept several comma-joined names; merging
/// different metrics over the same resource set is left as a possible optimization.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchParams {
    pub region: String,
    pub subscription: String,
    pub namespace: String,
    pub metric_name: String,
    pub time_range: TimeRange,
    pub interval: String,
    pub aggregation: String,
    pub filter: String,
    pub top: String,
    pub order_by: String,
}

impl BatchParams {
    pub fn from_query(query: &Query) -> Self {
        Self {
            region: query.region.clone(),
            subscription: query.subscription.clone(),
            namespace: query.metric_namespace.clone(),
            metric_name: query.metric_name.clone(),
            time_range: query.time_range,
            interval: query.interval.clone(),
            aggregation: query.aggregation.clone(),
            filter: query.filter.clone(),
            top: query.top.clone(),
            order_by: query.order_by.clone(),
        }
    }

    /// Hex SHA-256 over the shared parameters.
    ///
    /// Fields are separated by a unit separator so that adjacent values cannot
    /// run together into the same digest input.
    pub fn grouping_key(&self) -> String {
        // full precision: ranges differing below a second must not share a group
        let start = self.time_range.from.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let end = self.time_range.to.to_rfc3339_opts(SecondsFormat::AutoSi, true);
        let fields: [&str; 11] = [
            &self.region,
            &self.subscription,
            &self.namespace,
            &self.metric_name,
            &start,
            &end,
            &self.interval,
            &self.aggregation,
            &self.filter,
            &self.top,
            &self.order_by,
        ];

        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update(field.as_bytes());
            hasher.update([0x1f]);
        }
        format!("{:x}", hasher.finalize())
    }
}

/// A set of compatible queries served by one batch call.
#[derive(Debug, Clone)]
pub struct BatchGroup {
    /// Grouping key shared by all chunks split from the same group
    pub key: String,
    /// Position of this chunk within its split group (0 when unsplit)
    pub chunk: usize,
    pub params: BatchParams,
    /// Deduplicated resource ids, first-seen casing preserved
    pub resource_ids: Vec<String>,
    /// Queries referencing at least one of `resource_ids`
    pub queries: Vec<Query>,
    seen: HashSet<String>,
}

impl BatchGroup {
    fn new(key: String, params: BatchParams) -> Self {
        Self {
            key,
            chunk: 0,
            params,
            resource_ids: Vec::new(),
            queries: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn add_query(&mut self, query: &Query) {
        for resource_id in &query.resource_ids {
            if self.seen.insert(resource_id.to_lowercase()) {
                self.resource_ids.push(resource_id.clone());
            }
        }
        self.queries.push(query.clone());
    }

    /// Case-insensitive membership test against this group's resource ids.
    pub fn contains_resource(&self, resource_id: &str) -> bool {
        self.seen.contains(&resource_id.to_lowercase())
    }

    /// Split into chunks of at most `max` resource ids.
    ///
    /// Every query lands in at least one chunk. Queries with no resource ids are
    /// attached to chunk 0.
    fn split(self, max: usize) -> Vec<BatchGroup> {
        if self.resource_ids.len() <= max {
            return vec![self];
        }

        tracing::debug!(
            key = %self.key,
            resources = self.resource_ids.len(),
            max,
            "Splitting oversized batch group"
        );

        self.resource_ids
            .chunks(max)
            .enumerate()
            .map(|(chunk, resource_ids)| {
                let seen: HashSet<String> =
                    resource_ids.iter().map(|id| id.to_lowercase()).collect();
                // queries without resources ride along with the first chunk
                let queries = self
                    .queries
                    .iter()
                    .filter(|q| {
                        (chunk == 0 && q.resource_ids.is_empty())
                            || q.resource_ids.iter().any(|id| seen.contains(&id.to_lowercase()))
                    })
                    .cloned()
                    .collect();
                BatchGroup {
                    key: self.key.clone(),
                    chunk,
                    params: self.params.clone(),
                    resource_ids: resource_ids.to_vec(),
                    queries,
                    seen,
                }
            })
            .collect()
    }
}

/// Group batchable queries, then split groups holding more than `max_resources` ids.
///
/// `max_resources` is clamped to `1..=MAX_RESOURCES_PER_BATCH`. Output order follows the
/// first appearance of each grouping key in the input.
pub fn group_queries(queries: &[Query], max_resources: usize) -> Vec<BatchGroup> {
    let max_resources = max_resources.clamp(1, MAX_RESOURCES_PER_BATCH);

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<BatchGroup> = Vec::new();

    for query in queries {
        let params = BatchParams::from_query(query);
        let key = params.grouping_key();
        let position = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(BatchGroup::new(key, params));
            groups.len() - 1
        });
        groups[position].add_query(query);
    }

    let groups: Vec<BatchGroup> = groups
        .into_iter()
        .flat_map(|group| group.split(max_resources))
        .collect();

    tracing::debug!(
        queries = queries.len(),
        groups = groups.len(),
        "Planned batch groups"
    );

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::sample_query;

    #[test]
    fn test_empty_input() {
        assert!(group_queries(&[], MAX_RESOURCES_PER_BATCH).is_empty());
    }

    #[test]
    fn test_identical_params_merge() {
        let queries = vec![sample_query("A", &["vm1"]), sample_query("B", &["vm2"])];
        let groups = group_queries(&queries, MAX_RESOURCES_PER_BATCH);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].resource_ids, vec!["vm1", "vm2"]);
        assert_eq!(groups[0].queries.len(), 2);
    }

    #[test]
    fn test_case_insensitive_dedup_keeps_first_casing() {
        let queries = vec![sample_query("A", &["VM1", "vm2"]), sample_query("B", &["vm1", "VM2"])];
        let groups = group_queries(&queries, MAX_RESOURCES_PER_BATCH);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].resource_ids, vec!["VM1", "vm2"]);
        assert!(groups[0].contains_resource("Vm1"));
    }

    #[test]
    fn test_different_metric_names_never_merge() {
        let a = sample_query("A", &["vm1"]);
        let mut b = sample_query("B", &["vm1"]);
        b.metric_name = "Network In Total".to_string();

        let groups = group_queries(&[a, b], MAX_RESOURCES_PER_BATCH);
        assert_eq!(groups.len(), 2);
        assert_ne!(groups[0].key, groups[1].key);
    }

    #[test]
    fn test_every_grouping_field_matters() {
        let base = sample_query("A", &["vm1"]);
        let variants: Vec<Box<dyn Fn(&mut Query)>> = vec![
            Box::new(|q: &mut Query| q.region = "eastus".to_string()),
            Box::new(|q: &mut Query| q.subscription = "other".to_string()),
            Box::new(|q: &mut Query| q.metric_namespace = "Microsoft.Storage/accounts".to_string()),
            Box::new(|q: &mut Query| q.time_range.to += chrono::Duration::minutes(1)),
            Box::new(|q: &mut Query| q.interval = "PT1H".to_string()),
            Box::new(|q: &mut Query| q.aggregation = "Maximum".to_string()),
            Box::new(|q: &mut Query| q.filter = "LUN eq '0'".to_string()),
            Box::new(|q: &mut Query| q.top = "10".to_string()),
            Box::new(|q: &mut Query| q.order_by = "Average desc".to_string()),
        ];

        for change in variants {
            let mut other = base.clone();
            change(&mut other);
            let groups = group_queries(&[base.clone(), other], MAX_RESOURCES_PER_BATCH);
            assert_eq!(groups.len(), 2);
        }
    }

    #[test]
    fn test_sub_second_time_ranges_do_not_merge() {
        let a = sample_query("A", &["vm1"]);
        let mut b = sample_query("B", &["vm2"]);
        b.time_range.to += chrono::Duration::milliseconds(250);

        let groups = group_queries(&[a, b], MAX_RESOURCES_PER_BATCH);
        assert_eq!(groups.len(), 2);
    }

    #[test]
    fn test_grouping_key_is_deterministic() {
        let a = BatchParams::from_query(&sample_query("A", &["vm1"]));
        let b = BatchParams::from_query(&sample_query("B", &["vm9"]));
        assert_eq!(a.grouping_key(), b.grouping_key());
        assert_eq!(a.grouping_key().len(), 64);
    }

    #[test]
    fn test_adjacent_fields_do_not_collide() {
        let mut a = sample_query("A", &["vm1"]);
        a.top = "1".to_string();
        a.order_by = "0".to_string();
        let mut b = sample_query("B", &["vm1"]);
        b.top = "10".to_string();
        b.order_by = String::new();

        assert_eq!(group_queries(&[a, b], MAX_RESOURCES_PER_BATCH).len(), 2);
    }

    #[test]
    fn test_split_51_single_resource_queries() {
        let names: Vec<String> = (0..51).map(|i| format!("vm{i}")).collect();
        let queries: Vec<Query> = names
            .iter()
            .enumerate()
            .map(|(i, name)| sample_query(&format!("Q{i}"), &[name.as_str()]))
            .collect();

        let groups = group_queries(&queries, MAX_RESOURCES_PER_BATCH);

        assert!(groups.len() >= 2);
        assert!(groups.iter().all(|g| g.resource_ids.len() <= MAX_RESOURCES_PER_BATCH));
        assert_eq!(groups.iter().map(|g| g.resource_ids.len()).sum::<usize>(), 51);
        assert!(groups.iter().all(|g| g.key == groups[0].key));

        // each query lands in exactly the chunk holding its resource
        for group in &groups {
            for query in &group.queries {
                assert!(group.contains_resource(&query.resource_ids[0]));
            }
        }
        assert_eq!(groups.iter().map(|g| g.queries.len()).sum::<usize>(), 51);
    }

    #[test]
    fn test_split_preserves_resource_set() {
        let names: Vec<String> = (0..120).map(|i| format!("res{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut queries = vec![sample_query("A", &refs)];
        // duplicates in another casing must not reappear after the split
        let upper: Vec<String> = names.iter().take(10).map(|n| n.to_uppercase()).collect();
        let upper_refs: Vec<&str> = upper.iter().map(String::as_str).collect();
        queries.push(sample_query("B", &upper_refs));

        let groups = group_queries(&queries, MAX_RESOURCES_PER_BATCH);

        let sizes: Vec<usize> = groups.iter().map(|g| g.resource_ids.len()).collect();
        assert_eq!(sizes, vec![50, 50, 20]);
        let chunks: Vec<usize> = groups.iter().map(|g| g.chunk).collect();
        assert_eq!(chunks, vec![0, 1, 2]);

        let union: Vec<String> = groups.iter().flat_map(|g| g.resource_ids.clone()).collect();
        assert_eq!(union, names);
    }

    #[test]
    fn test_straddling_query_attached_to_each_chunk() {
        let first: Vec<String> = (0..49).map(|i| format!("a{i}")).collect();
        let first_refs: Vec<&str> = first.iter().map(String::as_str).collect();
        let queries = vec![
            sample_query("A", &first_refs),
            sample_query("B", &["b0", "b1", "b2"]),
        ];

        let groups = group_queries(&queries, MAX_RESOURCES_PER_BATCH);
        assert_eq!(groups.len(), 2);

        let refs = |g: &BatchGroup| g.queries.iter().map(|q| q.ref_id.clone()).collect::<Vec<_>>();
        assert_eq!(refs(&groups[0]), vec!["A", "B"]);
        assert_eq!(refs(&groups[1]), vec!["B"]);
        assert_eq!(groups[1].resource_ids, vec!["b1", "b2"]);
    }

    #[test]
    fn test_resource_less_query_survives_split() {
        let names: Vec<String> = (0..51).map(|i| format!("vm{i}")).collect();
        let empty: [&str; 0] = [];
        let queries = vec![sample_query("A", &names), sample_query("Z", &empty)];

        let groups = group_queries(&queries, MAX_RESOURCES_PER_BATCH);
        assert_eq!(groups.len(), 2);

        let attached: Vec<usize> = groups
            .iter()
            .map(|g| g.queries.iter().filter(|q| q.ref_id == "Z").count())
            .collect();
        assert_eq!(attached, vec![1, 0]);
    }

    #[test]
    fn test_lone_resource_less_query_gives_empty_group() {
        let empty: [&str; 0] = [];
        let groups = group_queries(&[sample_query("Z", &empty)], MAX_RESOURCES_PER_BATCH);

        assert_eq!(groups.len(), 1);
        assert!(groups[0].resource_ids.is_empty());
        assert_eq!(groups[0].queries[0].ref_id, "Z");
    }

    #[test]
    fn test_smaller_configured_limit() {
        let queries = vec![sample_query("A", &["r1", "r2", "r3", "r4", "r5"])];
        let groups = group_queries(&queries, 2);
        let sizes: Vec<usize> = groups.iter().map(|g| g.resource_ids.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        let queries = vec![sample_query("A", &["r1", "r2"])];
        let groups = group_queries(&queries, 0);
        assert_eq!(groups.len(), 2);
    }
}
