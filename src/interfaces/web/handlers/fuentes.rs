use axum::{Json, extract::State};

use super::super::AppState;

pub async fn list_sources(State(state): State<AppState>) -> Json<serde_json::Value> {
    let sources: Vec<_> = state
        .service
        .sources()
        .iter()
        .map(|s| {
            serde_json::json!({
                "nombre": s.name,
                "url": s.url,
                "registros": s.page_size,
            })
        })
        .collect();
    Json(serde_json::Value::Array(sources))
}
