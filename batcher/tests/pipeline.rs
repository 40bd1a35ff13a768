//! Plan → execute → distribute, through the public API only.

use std::collections::HashSet;
use std::sync::Arc;

use azure_monitor_batcher::test_utils::{
    failed_metric_json, metric_json, sample_query, value_json, vm_resource_id, TEST_SUBSCRIPTION,
};
use azure_monitor_batcher::{
    group_queries, partition, regional_endpoint, BatchRunner, Config, HttpResponse, MockHttpClient,
    SubscriptionNames, MAX_RESOURCES_PER_BATCH,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn batch_key() -> String {
    format!("POST /subscriptions/{TEST_SUBSCRIPTION}/metrics:getBatch")
}

#[test]
fn test_two_vms_share_one_batch() {
    let groups = group_queries(
        &[sample_query("A", &["vm1"]), sample_query("B", &["vm2"])],
        MAX_RESOURCES_PER_BATCH,
    );

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].resource_ids.len(), 2);
    assert_eq!(groups[0].queries.len(), 2);
}

#[test]
fn test_large_fan_in_is_split_without_loss() {
    let names: Vec<String> = (0..137).map(|i| format!("vm{i}")).collect();
    let queries: Vec<_> = names
        .iter()
        .map(|name| sample_query(name, &[name.as_str()]))
        .collect();

    let groups = group_queries(&queries, MAX_RESOURCES_PER_BATCH);

    assert!(groups.iter().all(|g| g.resource_ids.len() <= MAX_RESOURCES_PER_BATCH));
    let union: HashSet<String> = groups.iter().flat_map(|g| g.resource_ids.clone()).collect();
    let expected: HashSet<String> = names.into_iter().collect();
    assert_eq!(union, expected);
    assert_eq!(groups.iter().map(|g| g.resource_ids.len()).sum::<usize>(), 137);
}

#[test]
fn test_guest_metrics_are_not_batched() {
    let mut guest = sample_query("A", &["vm1"]);
    guest.metric_namespace = "Azure.VM.Linux.GuestMetrics".to_string();

    let (batchable, non_batchable) = partition(vec![guest, sample_query("B", &["vm1"])]);
    assert_eq!(batchable.len(), 1);
    assert_eq!(non_batchable[0].ref_id, "A");
}

#[test]
fn test_regional_endpoints() {
    assert_eq!(regional_endpoint(""), "global.metrics.monitor.azure.com");
    assert_eq!(regional_endpoint("East US"), "eastus.metrics.monitor.azure.com");
}

#[test_log::test(tokio::test)]
async fn test_partial_success_end_to_end() {
    let vm1 = vm_resource_id("vm1");
    let vm2 = vm_resource_id("vm2");
    let vm3 = vm_resource_id("vm3");

    let cpu = "Percentage CPU";
    let vm1_gone = failed_metric_json(cpu, "ResourceNotFound", "vm1 is gone");
    let vm3_gone = failed_metric_json(cpu, "ResourceNotFound", "vm3 is gone");

    let mock = Arc::new(MockHttpClient::new());
    mock.add_response(
        &batch_key(),
        Ok(HttpResponse {
            status: 200,
            body: json!({
                "values": [
                    value_json(&vm1, vec![vm1_gone]),
                    value_json(&vm2, vec![metric_json(cpu, "Percent", [10.0, 20.0])]),
                    value_json(&vm3, vec![vm3_gone]),
                ]
            })
            .to_string(),
        }),
    );

    let mut names = SubscriptionNames::new();
    names.insert(TEST_SUBSCRIPTION, "Production");
    let runner = BatchRunner::new(mock.clone(), &Config::default()).with_subscription_names(names);

    let mut a = sample_query("A", &[&vm1, &vm2]);
    a.alias = "{{subscription}} / {{resourcename}}".to_string();
    let b = sample_query("B", &[&vm3]);

    let outcome = runner.run(vec![a, b], &CancellationToken::new()).await;

    // one merged call for both queries
    assert_eq!(mock.call_count(), 1);
    let body: serde_json::Value = serde_json::from_str(&mock.get_calls()[0].body).unwrap();
    assert_eq!(body["resourceIds"].as_array().unwrap().len(), 3);

    let a = &outcome.results["A"];
    assert!(a.error.is_none());
    assert_eq!(a.frames.len(), 1);
    let config = a.frames[0].value_field().unwrap().config.as_ref().unwrap();
    assert_eq!(config.display_name.as_deref(), Some("Production / vm2"));

    let b = &outcome.results["B"];
    assert!(b.frames.is_empty());
    assert!(b.error.as_ref().unwrap().message.contains("vm3 is gone"));
}

#[test_log::test(tokio::test)]
async fn test_distinct_metrics_issue_distinct_calls() {
    let mock = Arc::new(MockHttpClient::new());
    for _ in 0..2 {
        mock.add_response(
            &batch_key(),
            Ok(HttpResponse {
                status: 200,
                body: r#"{"values":[]}"#.to_string(),
            }),
        );
    }

    let mut memory = sample_query("B", &["vm1"]);
    memory.metric_name = "Available Memory Bytes".to_string();

    let runner = BatchRunner::new(mock.clone(), &Config::default());
    let outcome = runner
        .run(vec![sample_query("A", &["vm1"]), memory], &CancellationToken::new())
        .await;

    assert_eq!(mock.call_count(), 2);
    let metricnames: HashSet<String> = mock
        .get_calls()
        .iter()
        .filter_map(|call| {
            call.url
                .query_pairs()
                .find(|(k, _)| k == "metricnames")
                .map(|(_, v)| v.into_owned())
        })
        .collect();
    assert!(metricnames.contains("Percentage CPU"));
    assert!(metricnames.contains("Available Memory Bytes"));
    assert!(outcome.results.values().all(|r| r.error.is_none()));
}
