//! Data frames handed to the visualization layer, and the value/unit conversions
//! that produce them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::response::DataPoint;

pub const TIME_FIELD_NAME: &str = "Time";

/// A single time series ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub name: String,
    pub fields: Vec<Field>,
}

impl Frame {
    /// The value column, if the frame has one.
    pub fn value_field(&self) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| matches!(f.values, FieldValues::Number(_)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub name: String,
    pub values: FieldValues,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<FieldConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum FieldValues {
    Time(Vec<DateTime<Utc>>),
    Number(Vec<Option<f64>>),
}

impl FieldValues {
    pub fn len(&self) -> usize {
        match self {
            FieldValues::Time(v) => v.len(),
            FieldValues::Number(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<DataLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataLink {
    pub title: String,
    pub url: String,
    pub target_blank: bool,
}

/// Which value of a data point a query renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    Average,
    Total,
    Maximum,
    Minimum,
    Count,
}

impl Aggregation {
    /// Parse case-insensitively; anything unrecognized renders counts.
    pub fn parse(aggregation: &str) -> Self {
        match aggregation.trim().to_ascii_lowercase().as_str() {
            "average" => Aggregation::Average,
            "total" => Aggregation::Total,
            "maximum" => Aggregation::Maximum,
            "minimum" => Aggregation::Minimum,
            _ => Aggregation::Count,
        }
    }

    pub fn value_of(&self, point: &DataPoint) -> Option<f64> {
        match self {
            Aggregation::Average => point.average,
            Aggregation::Total => point.total,
            Aggregation::Maximum => point.maximum,
            Aggregation::Minimum => point.minimum,
            Aggregation::Count => point.count,
        }
    }

    /// Numeric aggregation type used by the portal's chart definitions.
    pub fn portal_code(&self) -> u8 {
        match self {
            Aggregation::Total => 1,
            Aggregation::Minimum => 2,
            Aggregation::Maximum => 3,
            Aggregation::Average => 4,
            Aggregation::Count => 7,
        }
    }
}

/// Map an Azure Monitor unit name to a display unit.
///
/// Units without a mapping are passed through unchanged.
pub fn to_display_unit(unit: &str) -> String {
    match unit {
        "BitsPerSecond" => "bps",
        "Percent" => "percent",
        "MilliSeconds" | "Milliseconds" => "ms",
        "Bytes" => "decbytes",
        "BytesPerSecond" => "Bps",
        "Count" => "short",
        "CountPerSecond" => "cps",
        "Seconds" => "s",
        other => other,
    }
    .to_string()
}
