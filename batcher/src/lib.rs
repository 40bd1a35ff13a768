//! Batch query planning and response distribution for Azure Monitor metrics.
//!
//! Dashboard panels author their metric queries independently. Sending each one to
//! Azure separately burns API calls and quota, so this crate:
//! - Partitions queries into those `metrics:getBatch` can serve and those it can't
//! - Groups compatible queries and splits groups over the 50-resource limit
//! - Executes one batch call per group through a pluggable [`HttpClient`]
//! - Demultiplexes each response into per-query frames, tolerating per-resource and
//!   per-metric failures
//!
//! # Example
//! ```ignore
//! use azure_monitor_batcher::{BatchRunner, Config, ReqwestHttpClient};
//!
//! let config = Config::load("azmon-batcher.yaml")?;
//! let client = Arc::new(ReqwestHttpClient::new(config.request_timeout)?.with_bearer_token(token));
//! let runner = BatchRunner::new(client, &config);
//!
//! let outcome = runner.run(queries, &CancellationToken::new()).await;
//! for (ref_id, result) in outcome.results {
//!     println!("{ref_id}: {} frames", result.frames.len());
//! }
//! // outcome.non_batchable still needs the single-resource path
//! ```

pub mod config;
pub mod distribute;
pub mod endpoint;
pub mod error;
pub mod executor;
pub mod frame;
pub mod group;
pub mod http;
pub mod legend;
pub mod partition;
pub mod portal;
pub mod query;
pub mod response;
pub mod result;
pub mod runner;
pub mod telemetry;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export commonly used types
pub use config::Config;
pub use distribute::{distribute, DistributeContext};
pub use endpoint::{batch_request, batch_url, regional_endpoint, BATCH_API_VERSION};
pub use error::{BatcherError, ErrorSource, QueryError, Result};
pub use executor::BatchExecutor;
pub use frame::{FieldValues, Frame};
pub use group::{group_queries, BatchGroup, BatchParams, MAX_RESOURCES_PER_BATCH};
pub use http::{HttpClient, HttpRequest, HttpResponse, MockHttpClient, ReqwestHttpClient};
pub use partition::{is_batchable, partition};
pub use query::{Query, RefId, SubscriptionNames, TimeRange};
pub use response::BatchResponse;
pub use result::QueryResult;
pub use runner::{BatchOutcome, BatchRunner};
