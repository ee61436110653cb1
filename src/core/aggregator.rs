use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info};

use super::config::SourceConfig;
use super::error::{ConsultaError, Result};
use super::upstream::{SourceResult, UpstreamClient, classify};

/// Merged view of every configured source for one NUC.
///
/// On the wire each source is a top-level key next to `success` and `nuc`,
/// and the observed statuses sit under `debug` as `<source>_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateResult {
    pub success: bool,
    #[serde(rename = "nuc")]
    pub query_key: String,
    #[serde(rename = "debug", with = "status_keys")]
    pub source_statuses: BTreeMap<String, u16>,
    #[serde(flatten)]
    pub sources: BTreeMap<String, Value>,
}

impl AggregateResult {
    pub fn merge(query_key: &str, results: Vec<(String, SourceResult)>) -> Self {
        let mut sources = BTreeMap::new();
        let mut source_statuses = BTreeMap::new();

        for (name, result) in results {
            source_statuses.insert(name.clone(), result.status_code);
            let entry = match classify(result) {
                Ok(payload) => payload,
                Err(message) => json!({ "error": message, "datos": [] }),
            };
            sources.insert(name, entry);
        }

        Self {
            success: true,
            query_key: query_key.to_string(),
            source_statuses,
            sources,
        }
    }
}

mod status_keys {
    use serde::ser::SerializeMap;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::collections::BTreeMap;

    const SUFFIX: &str = "_status";

    pub fn serialize<S: Serializer>(
        statuses: &BTreeMap<String, u16>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(statuses.len()))?;
        for (name, code) in statuses {
            map.serialize_entry(&format!("{name}{SUFFIX}"), code)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, u16>, D::Error> {
        let raw = BTreeMap::<String, u16>::deserialize(deserializer)?;
        Ok(raw
            .into_iter()
            .map(|(key, code)| match key.strip_suffix(SUFFIX) {
                Some(name) => (name.to_string(), code),
                None => (key, code),
            })
            .collect())
    }
}

pub struct Aggregator {
    client: UpstreamClient,
    sources: Arc<[SourceConfig]>,
}

impl Aggregator {
    pub fn new(client: UpstreamClient, sources: Vec<SourceConfig>) -> Result<Self> {
        if sources.is_empty() {
            return Err(ConsultaError::Config(
                "at least one upstream source must be configured".to_string(),
            ));
        }
        Ok(Self {
            client,
            sources: sources.into(),
        })
    }

    pub fn sources(&self) -> &[SourceConfig] {
        &self.sources
    }

    /// Queries every source once, concurrently. Each call is bounded by the
    /// client timeout, so a hung source only delays the aggregate by that.
    /// `page_size = None` uses each source's own default.
    pub async fn aggregate(
        &self,
        query_key: &str,
        page: u32,
        page_size: Option<u32>,
    ) -> AggregateResult {
        let mut set = JoinSet::new();
        for source in self.sources.iter().cloned() {
            let client = self.client.clone();
            let query_key = query_key.to_string();
            set.spawn(async move {
                let size = page_size.unwrap_or(source.page_size);
                let result = client.fetch(&source, &query_key, page, size).await;
                (source.name, result)
            });
        }

        let mut results = Vec::with_capacity(self.sources.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(pair) => results.push(pair),
                Err(e) => error!("Upstream task for NUC {} failed: {}", query_key, e),
            }
        }

        // A panicked task leaves no name behind; fill the gap so every source
        // is still represented.
        for source in self.sources.iter() {
            if !results.iter().any(|(name, _)| name == &source.name) {
                results.push((
                    source.name.clone(),
                    SourceResult::transport_failure("upstream task aborted"),
                ));
            }
        }

        let aggregate = AggregateResult::merge(query_key, results);
        info!(
            "Aggregated NUC {} from {} source(s): {:?}",
            query_key,
            aggregate.sources.len(),
            aggregate.source_statuses
        );
        aggregate
    }
}
