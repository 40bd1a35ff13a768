//! Fixtures shared by unit and integration tests.

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};

use crate::query::{Query, TimeRange};

pub const TEST_SUBSCRIPTION: &str = "44693801-6ee6-49de-9b2d-9106972f9572";

/// Full ARM id of a test virtual machine.
pub fn vm_resource_id(name: &str) -> String {
    format!(
        "/subscriptions/{TEST_SUBSCRIPTION}/resourceGroups/cloud-datasources/providers/Microsoft.Compute/virtualMachines/{name}"
    )
}

/// A batchable "Percentage CPU" query over the given resource ids (used verbatim).
pub fn sample_query<S: AsRef<str>>(ref_id: &str, resource_ids: &[S]) -> Query {
    Query {
        ref_id: ref_id.to_string(),
        subscription: TEST_SUBSCRIPTION.to_string(),
        region: "westeurope".to_string(),
        metric_namespace: "Microsoft.Compute/virtualMachines".to_string(),
        metric_name: "Percentage CPU".to_string(),
        aggregation: "Average".to_string(),
        interval: "PT5M".to_string(),
        filter: String::new(),
        top: String::new(),
        order_by: String::new(),
        time_range: TimeRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
        ),
        resource_ids: resource_ids.iter().map(|id| id.as_ref().to_string()).collect(),
        alias: String::new(),
    }
}

/// One successful metric entry with a single undimensioned series of two points.
pub fn metric_json(name: &str, unit: &str, average: [f64; 2]) -> Value {
    json!({
        "name": { "value": name, "localizedValue": name },
        "unit": unit,
        "errorCode": "Success",
        "timeseries": [{
            "metadatavalues": [],
            "data": [
                { "timeStamp": "2024-01-01T00:00:00Z", "average": average[0] },
                { "timeStamp": "2024-01-01T00:05:00Z", "average": average[1] }
            ]
        }]
    })
}

/// A metric entry that failed with the given code.
pub fn failed_metric_json(name: &str, code: &str, message: &str) -> Value {
    json!({
        "name": { "value": name, "localizedValue": name },
        "unit": "Percent",
        "errorCode": code,
        "errorMessage": message,
        "timeseries": []
    })
}

/// One batch `values` entry for a resource.
pub fn value_json(resource_id: &str, metrics: Vec<Value>) -> Value {
    json!({
        "resourceid": resource_id,
        "starttime": "2024-01-01T00:00:00Z",
        "endtime": "2024-01-01T01:00:00Z",
        "interval": "PT5M",
        "namespace": "Microsoft.Compute/virtualMachines",
        "resourceregion": "westeurope",
        "value": metrics
    })
}
