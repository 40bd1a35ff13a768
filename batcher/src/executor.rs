//! Executes one batch group against the regional `metrics:getBatch` endpoint.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::endpoint::{batch_request, BATCH_API_VERSION};
use crate::error::{BatcherError, Result};
use crate::group::BatchGroup;
use crate::http::HttpClient;
use crate::response::BatchResponse;

/// Sends batch requests through an [`HttpClient`] and decodes the responses.
pub struct BatchExecutor<H: HttpClient> {
    http_client: Arc<H>,
    api_version: String,
}

impl<H: HttpClient> BatchExecutor<H> {
    pub fn new(http_client: Arc<H>) -> Self {
        Self::with_api_version(http_client, BATCH_API_VERSION)
    }

    pub fn with_api_version(http_client: Arc<H>, api_version: impl Into<String>) -> Self {
        Self {
            http_client,
            api_version: api_version.into(),
        }
    }

    /// Execute one group.
    ///
    /// # Errors
    /// - [`BatcherError::Canceled`] if `cancel` fires before the response arrives
    /// - transport errors from the client, and [`BatcherError::Downstream`] for 5xx/429
    /// - [`BatcherError::Plugin`] for other non-2xx statuses
    /// - [`BatcherError::Json`] if the body is not a batch response
    #[tracing::instrument(skip(self, group, cancel), fields(
        key = %group.key,
        chunk = group.chunk,
        metric = %group.params.metric_name,
        resources = group.resource_ids.len(),
    ))]
    pub async fn execute(
        &self,
        group: &BatchGroup,
        cancel: &CancellationToken,
    ) -> Result<BatchResponse> {
        let request = batch_request(group, &self.api_version)?;

        tracing::debug!(url = %request.url, "Sending batch request");

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Batch request canceled");
                return Err(BatcherError::Canceled(format!(
                    "batch request for metric '{}' canceled",
                    group.params.metric_name
                )));
            }
            response = self.http_client.execute(&request) => response?,
        };

        if !response.is_success() {
            tracing::warn!(status = response.status, "Batch request failed");
            return Err(BatcherError::from_status(response.status, &response.body));
        }

        let decoded: BatchResponse = serde_json::from_str(&response.body).map_err(|e| {
            tracing::error!(error = %e, "Failed to decode batch response");
            e
        })?;

        tracing::debug!(values = decoded.values.len(), "Batch request completed");

        Ok(decoded)
    }
}
