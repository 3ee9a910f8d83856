use std::sync::Arc;

use crate::error::{GobanaError, Result};
use crate::query::{build_query, QuerySource};
use crate::result::{decode_result, ElasticsearchResult};
use crate::transport::Transport;

pub const DEFAULT_ENDPOINT: &str = "_search";

#[derive(Debug, Clone, Copy, Default)]
pub struct HandlerOptions {
    /// Dump the decoded result to the debug log after each execute
    pub verbose: bool,
}

/// Gobana holds a prepared query and the transport to send it with
pub struct Gobana {
    transport: Arc<dyn Transport>,
    endpoint: String,
    query: String,
    options: HandlerOptions,
}

impl Gobana {
    /// Build the query from `source`; nothing is sent yet
    pub fn new(
        transport: Arc<dyn Transport>,
        source: &QuerySource,
        endpoint: impl Into<String>,
        options: HandlerOptions,
    ) -> Result<Self> {
        let query = build_query(source).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to build query");
        })?;

        let endpoint = endpoint.into();
        let endpoint = match endpoint.trim_start_matches('/') {
            "" => DEFAULT_ENDPOINT.to_string(),
            trimmed => trimmed.to_string(),
        };

        tracing::debug!(query = %query, endpoint = %endpoint, "Query prepared");
        Ok(Self {
            transport,
            endpoint,
            query,
            options,
        })
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send the query and decode the response
    #[tracing::instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn execute(&self) -> Result<ElasticsearchResult> {
        tracing::debug!(query = %self.query, "Execute");

        let path = format!("/{}", self.endpoint);
        let raw = self
            .transport
            .post(&path, self.query.as_bytes())
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Request failed");
                GobanaError::Transport(format!("{:#}", e))
            })?;
        tracing::info!("Successfully executed query");

        let result = decode_result(&raw).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to decode response");
        })?;

        if self.options.verbose {
            match serde_json::to_string_pretty(&result) {
                Ok(pretty) => tracing::debug!("{}", pretty),
                Err(e) => tracing::error!(error = %e, "Failed to render result"),
            }
            tracing::debug!("{:#?}", result);
        }

        Ok(result)
    }
}
