//! In-process stand-ins for the judicial record APIs.

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing::get};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Debug)]
pub(crate) enum MockBehavior {
    Json(u16, Value),
    Text(u16, String),
    Delay(Duration, Value),
}

#[derive(Clone)]
struct MockState {
    behavior: MockBehavior,
    hits: Arc<AtomicUsize>,
    last_query: Arc<Mutex<Option<HashMap<String, String>>>>,
    last_headers: Arc<Mutex<Option<HeaderMap>>>,
}

pub(crate) struct MockUpstream {
    addr: SocketAddr,
    state: MockState,
    handle: tokio::task::JoinHandle<()>,
}

async fn mock_endpoint(
    State(state): State<MockState>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    *state.last_query.lock().unwrap_or_else(|e| e.into_inner()) = Some(query);
    *state.last_headers.lock().unwrap_or_else(|e| e.into_inner()) = Some(headers);

    match state.behavior {
        MockBehavior::Json(code, body) => (status(code), Json(body)).into_response(),
        MockBehavior::Text(code, body) => (status(code), body).into_response(),
        MockBehavior::Delay(delay, body) => {
            tokio::time::sleep(delay).await;
            Json(body).into_response()
        }
    }
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

impl MockUpstream {
    pub(crate) async fn start(behavior: MockBehavior) -> Self {
        let state = MockState {
            behavior,
            hits: Arc::new(AtomicUsize::new(0)),
            last_query: Arc::new(Mutex::new(None)),
            last_headers: Arc::new(Mutex::new(None)),
        };
        let app = Router::new()
            .route("/api", get(mock_endpoint))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock upstream");
        let addr = listener.local_addr().expect("mock upstream addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub(crate) fn url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub(crate) fn hits(&self) -> usize {
        self.state.hits.load(Ordering::SeqCst)
    }

    pub(crate) fn last_query(&self) -> Option<HashMap<String, String>> {
        self.state
            .last_query
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub(crate) fn last_header(&self, name: &str) -> Option<String> {
        self.state
            .last_headers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .and_then(|h| h.get(name))
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A URL on a port nobody listens on.
pub(crate) fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind probe port");
    let port = listener.local_addr().expect("probe addr").port();
    drop(listener);
    format!("http://127.0.0.1:{}/api", port)
}
