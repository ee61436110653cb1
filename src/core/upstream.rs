use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{info, warn};

use super::config::{SourceConfig, UpstreamConfig};

/// Status recorded when the request never produced an HTTP response.
pub const TRANSPORT_FAILURE_STATUS: u16 = 500;

pub const UNPARSABLE_RESPONSE: &str = "unparsable response";

/// Outcome of one upstream call. Every failure mode is a value.
#[derive(Debug, Clone, Serialize)]
pub struct SourceResult {
    pub status_code: u16,
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Raw body kept when it could not be parsed as JSON.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
}

impl SourceResult {
    pub fn transport_failure(message: impl Into<String>) -> Self {
        Self {
            status_code: TRANSPORT_FAILURE_STATUS,
            payload: None,
            error: Some(message.into()),
            raw_body: None,
        }
    }

    fn from_body(status_code: u16, body: String) -> Self {
        match serde_json::from_str::<Value>(&body) {
            Ok(payload) => Self {
                status_code,
                payload: Some(payload),
                error: None,
                raw_body: None,
            },
            Err(_) => Self {
                status_code,
                payload: None,
                error: Some(UNPARSABLE_RESPONSE.to_string()),
                raw_body: Some(body),
            },
        }
    }
}

/// The one place that decides whether a source answered usefully.
/// `Ok` carries the payload to embed verbatim, `Err` the message for the
/// normalized failure entry.
pub fn classify(result: SourceResult) -> std::result::Result<Value, String> {
    match (result.status_code, result.payload) {
        (200, Some(payload)) => Ok(payload),
        (code, _) => Err(result
            .error
            .unwrap_or_else(|| format!("Status {}", code))),
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_str(&config.accept).context("Invalid Accept header value")?,
        );

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .context("Failed to build upstream HTTP client")?;

        Ok(Self { client })
    }

    pub async fn fetch(
        &self,
        source: &SourceConfig,
        query_key: &str,
        page: u32,
        page_size: u32,
    ) -> SourceResult {
        let started = Instant::now();
        let request = self.client.get(&source.url).query(&[
            ("Nuc", query_key.to_string()),
            ("PaginaActual", page.to_string()),
            ("RegistrosPorPagina", page_size.to_string()),
        ]);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let message = describe_transport_error(&e);
                warn!("Error querying {} ({}): {}", source.name, source.url, message);
                return SourceResult::transport_failure(message);
            }
        };

        let status_code = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                let message = describe_transport_error(&e);
                warn!("Error reading {} response body: {}", source.name, message);
                return SourceResult::transport_failure(message);
            }
        };

        let result = SourceResult::from_body(status_code, body);
        info!(
            "Source {} answered {} in {}ms{}",
            source.name,
            status_code,
            started.elapsed().as_millis(),
            if result.payload.is_none() {
                " (body is not JSON)"
            } else {
                ""
            }
        );
        result
    }
}

/// reqwest's Display hides the underlying cause, so walk the source chain.
fn describe_transport_error(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    if err.is_timeout() && !message.contains("timed out") {
        message.push_str(": operation timed out");
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testing::{MockBehavior, MockUpstream, unreachable_url};
    use serde_json::json;
    use std::time::Duration;

    fn source(url: String) -> SourceConfig {
        SourceConfig {
            name: "decisiones".to_string(),
            url,
            page_size: 15,
        }
    }

    fn client_with_timeout(timeout: Duration) -> UpstreamClient {
        let config = UpstreamConfig::default();
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent)
            .default_headers(headers)
            .build()
            .unwrap();
        UpstreamClient { client }
    }

    #[test]
    fn classify_accepts_only_200_with_payload() {
        let ok = SourceResult::from_body(200, r#"{"datos":[{"id":1}]}"#.to_string());
        assert_eq!(classify(ok).unwrap(), json!({"datos": [{"id": 1}]}));

        let not_found = SourceResult::from_body(404, r#"{"msg":"not found"}"#.to_string());
        assert_eq!(classify(not_found).unwrap_err(), "Status 404");

        let garbled = SourceResult::from_body(200, "<html>oops</html>".to_string());
        assert_eq!(classify(garbled).unwrap_err(), UNPARSABLE_RESPONSE);

        let down = SourceResult::transport_failure("connection refused");
        assert_eq!(classify(down).unwrap_err(), "connection refused");
    }

    #[test]
    fn unparsable_body_keeps_raw_text_and_status() {
        let result = SourceResult::from_body(502, "Bad Gateway".to_string());
        assert_eq!(result.status_code, 502);
        assert!(result.payload.is_none());
        assert_eq!(result.error.as_deref(), Some(UNPARSABLE_RESPONSE));
        assert_eq!(result.raw_body.as_deref(), Some("Bad Gateway"));
    }

    #[tokio::test]
    async fn fetch_sends_paging_params_and_headers() {
        let mock = MockUpstream::start(MockBehavior::Json(200, json!({"datos": []}))).await;
        let client = UpstreamClient::new(&UpstreamConfig::default()).unwrap();

        let result = client
            .fetch(&source(mock.url()), "199-2020-ELAB-00094", 2, 20)
            .await;

        assert_eq!(result.status_code, 200);
        assert_eq!(result.payload, Some(json!({"datos": []})));
        assert!(result.error.is_none());

        let query = mock.last_query().expect("request recorded");
        assert_eq!(query.get("Nuc").map(String::as_str), Some("199-2020-ELAB-00094"));
        assert_eq!(query.get("PaginaActual").map(String::as_str), Some("2"));
        assert_eq!(query.get("RegistrosPorPagina").map(String::as_str), Some("20"));
        assert_eq!(mock.last_header("accept").as_deref(), Some("application/json"));
        assert!(
            mock.last_header("user-agent")
                .unwrap_or_default()
                .starts_with("Mozilla/5.0")
        );
    }

    #[tokio::test]
    async fn fetch_parses_json_error_bodies() {
        let mock = MockUpstream::start(MockBehavior::Json(404, json!({"msg": "not found"}))).await;
        let client = UpstreamClient::new(&UpstreamConfig::default()).unwrap();

        let result = client.fetch(&source(mock.url()), "123", 1, 15).await;
        assert_eq!(result.status_code, 404);
        assert_eq!(result.payload, Some(json!({"msg": "not found"})));
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn fetch_reports_non_json_body() {
        let mock = MockUpstream::start(MockBehavior::Text(200, "maintenance".to_string())).await;
        let client = UpstreamClient::new(&UpstreamConfig::default()).unwrap();

        let result = client.fetch(&source(mock.url()), "123", 1, 15).await;
        assert_eq!(result.status_code, 200);
        assert!(result.payload.is_none());
        assert_eq!(result.error.as_deref(), Some(UNPARSABLE_RESPONSE));
        assert_eq!(result.raw_body.as_deref(), Some("maintenance"));
    }

    #[tokio::test]
    async fn fetch_turns_timeout_into_sentinel_result() {
        let mock = MockUpstream::start(MockBehavior::Delay(
            Duration::from_secs(5),
            json!({"datos": []}),
        ))
        .await;
        let client = client_with_timeout(Duration::from_millis(200));

        let result = client.fetch(&source(mock.url()), "123", 1, 15).await;
        assert_eq!(result.status_code, TRANSPORT_FAILURE_STATUS);
        assert!(result.payload.is_none());
        assert!(result.error.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn fetch_turns_connection_failure_into_sentinel_result() {
        let client = client_with_timeout(Duration::from_secs(2));
        let result = client.fetch(&source(unreachable_url()), "123", 1, 15).await;
        assert_eq!(result.status_code, TRANSPORT_FAILURE_STATUS);
        assert!(result.payload.is_none());
        assert!(!result.error.unwrap().is_empty());
    }
}
