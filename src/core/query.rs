use serde::Serialize;

use super::aggregator::{AggregateResult, Aggregator};
use super::config::SourceConfig;
use super::error::{ConsultaError, Result};
use super::store::{HistoryEntry, ResponseStore, StoredRecord};

/// What a successful search hands back: the aggregate exactly as stored,
/// plus the name it was stored under.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome {
    #[serde(flatten)]
    pub aggregate: AggregateResult,
    #[serde(rename = "archivo_guardado")]
    pub identifier: String,
}

pub struct QueryService {
    aggregator: Aggregator,
    store: ResponseStore,
}

impl QueryService {
    pub fn new(aggregator: Aggregator, store: ResponseStore) -> Self {
        Self { aggregator, store }
    }

    pub fn sources(&self) -> &[SourceConfig] {
        self.aggregator.sources()
    }

    pub async fn handle(
        &self,
        query_key: &str,
        page: Option<u32>,
        page_size: Option<u32>,
    ) -> Result<QueryOutcome> {
        let query_key = query_key.trim();
        if query_key.is_empty() {
            return Err(ConsultaError::InvalidInput(
                "El NUC es requerido".to_string(),
            ));
        }
        let page = page.unwrap_or(1).max(1);
        let page_size = page_size.map(|size| size.max(1));

        let aggregate = self.aggregator.aggregate(query_key, page, page_size).await;

        let body = serde_json::to_value(&aggregate)
            .map_err(|e| ConsultaError::storage("Failed to serialize aggregate", e))?;
        let identifier = self.store.save(query_key, &body).await?;

        Ok(QueryOutcome {
            aggregate,
            identifier,
        })
    }

    pub async fn history(&self) -> Result<Vec<HistoryEntry>> {
        self.store.list().await
    }

    pub async fn record(&self, identifier: &str) -> Result<StoredRecord> {
        self.store.get(identifier).await
    }
}
