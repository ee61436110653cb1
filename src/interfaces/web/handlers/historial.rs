use axum::{
    Json,
    extract::{Path, State},
};

use super::super::AppState;
use crate::core::error::ConsultaError;
use crate::core::store::{HistoryEntry, StoredRecord};

pub async fn list_history(
    State(state): State<AppState>,
) -> Result<Json<Vec<HistoryEntry>>, ConsultaError> {
    Ok(Json(state.service.history().await?))
}

pub async fn get_history_record(
    Path(identifier): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<StoredRecord>, ConsultaError> {
    Ok(Json(state.service.record(&identifier).await?))
}
