//! End-to-end batch execution: partition, group, execute, distribute, merge.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::distribute::{distribute, DistributeContext};
use crate::error::QueryError;
use crate::executor::BatchExecutor;
use crate::group::{group_queries, BatchGroup};
use crate::http::HttpClient;
use crate::partition::partition;
use crate::query::{Query, RefId, SubscriptionNames};
use crate::result::{merge_into, QueryResult};

/// Results of one batch run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// One merged result per batchable query
    pub results: HashMap<RefId, QueryResult>,
    /// Queries the batch endpoint cannot serve; route them through the
    /// single-resource metrics path
    pub non_batchable: Vec<Query>,
}

/// Plans and runs batch metric queries for a single incoming request.
///
/// Nothing is cached between runs; every call builds its own groups.
pub struct BatchRunner<H: HttpClient> {
    executor: BatchExecutor<H>,
    subscription_names: SubscriptionNames,
    max_resources_per_batch: usize,
    max_concurrent_batches: usize,
    portal_url: String,
}

impl<H: HttpClient> BatchRunner<H> {
    pub fn new(http_client: Arc<H>, config: &Config) -> Self {
        Self {
            executor: BatchExecutor::with_api_version(http_client, config.api_version.clone()),
            subscription_names: SubscriptionNames::new(),
            max_resources_per_batch: config.max_resources_per_batch,
            max_concurrent_batches: config.max_concurrent_batches.max(1),
            portal_url: config.portal_url.clone(),
        }
    }

    pub fn with_subscription_names(mut self, names: SubscriptionNames) -> Self {
        self.subscription_names = names;
        self
    }

    /// Partition and group `queries` without executing anything.
    pub fn plan(&self, queries: Vec<Query>) -> (Vec<BatchGroup>, Vec<Query>) {
        let (batchable, non_batchable) = partition(queries);
        (group_queries(&batchable, self.max_resources_per_batch), non_batchable)
    }

    /// Run every batchable query, executing up to `max_concurrent_batches` groups at once.
    ///
    /// All groups are planned before the first call goes out. Results for a query
    /// split across several groups are merged in group order.
    #[tracing::instrument(skip_all, fields(queries = queries.len()))]
    pub async fn run(&self, queries: Vec<Query>, cancel: &CancellationToken) -> BatchOutcome {
        let (groups, non_batchable) = self.plan(queries);

        tracing::info!(
            groups = groups.len(),
            non_batchable = non_batchable.len(),
            "Executing batch groups"
        );

        let per_group: Vec<HashMap<RefId, QueryResult>> = stream::iter(groups.iter())
            .map(|group| self.run_group(group, cancel))
            .buffered(self.max_concurrent_batches)
            .collect()
            .await;

        let mut results: HashMap<RefId, QueryResult> = HashMap::new();
        for group_results in per_group {
            for (ref_id, result) in group_results {
                merge_into(&mut results, ref_id, result);
            }
        }

        BatchOutcome {
            results,
            non_batchable,
        }
    }

    async fn run_group(
        &self,
        group: &BatchGroup,
        cancel: &CancellationToken,
    ) -> HashMap<RefId, QueryResult> {
        // nothing to ask Azure for; members still get an (empty) result
        if group.resource_ids.is_empty() {
            tracing::debug!(key = %group.key, "Batch group has no resources, skipping call");
            return group
                .queries
                .iter()
                .map(|q| (q.ref_id.clone(), QueryResult::default()))
                .collect();
        }

        match self.executor.execute(group, cancel).await {
            Ok(response) => {
                let ctx = DistributeContext {
                    portal_url: &self.portal_url,
                    subscription_names: &self.subscription_names,
                };
                distribute(&response, group, &ctx)
            }
            Err(e) => {
                tracing::error!(
                    key = %group.key,
                    chunk = group.chunk,
                    error = %e,
                    "Batch group failed"
                );
                let error = QueryError::from(&e);
                group
                    .queries
                    .iter()
                    .map(|q| (q.ref_id.clone(), QueryResult::from_error(error.clone())))
                    .collect()
            }
        }
    }
}
