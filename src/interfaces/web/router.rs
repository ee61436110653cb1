use axum::{
    Router,
    body::Body,
    http::{HeaderValue, Method, Request, header},
    middleware,
    middleware::Next,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;

use super::AppState;
use super::handlers::{buscar, fuentes, historial};

fn build_cors(api_host: &str, api_port: u16) -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        format!("http://{}:{}", api_host, api_port),
        format!("http://127.0.0.1:{}", api_port),
        format!("http://localhost:{}", api_port),
    ]
    .iter()
    .filter_map(|o| o.parse().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(tower_http::cors::Any)
}

pub fn build_api_router(state: AppState) -> Router {
    Router::new()
        .route("/api/buscar", post(buscar::buscar_endpoint))
        .route("/api/historial", get(historial::list_history))
        .route(
            "/api/historial/{identifier}",
            get(historial::get_history_record),
        )
        .route("/api/fuentes", get(fuentes::list_sources))
        .layer(middleware::from_fn(security_headers))
        .layer(build_cors(&state.api_host, state.api_port))
        .with_state(state)
}

async fn security_headers(req: Request<Body>, next: Next) -> axum::response::Response {
    let mut response = next.run(req).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    response
}
