use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};

use super::super::AppState;
use crate::core::error::ConsultaError;
use crate::core::query::QueryOutcome;

#[derive(serde::Deserialize)]
pub struct BuscarRequest {
    #[serde(default)]
    nuc: Option<String>,
    pagina: Option<i64>,
    registros: Option<i64>,
}

fn positive(value: Option<i64>) -> Option<u32> {
    value.map(|v| v.clamp(1, i64::from(u32::MAX)) as u32)
}

/// Fans the NUC out to every source, stores the merge and returns it with
/// the saved file name.
pub async fn buscar_endpoint(
    State(state): State<AppState>,
    payload: Result<Json<BuscarRequest>, JsonRejection>,
) -> Result<Json<QueryOutcome>, ConsultaError> {
    let Json(payload) =
        payload.map_err(|e| ConsultaError::InvalidInput(format!("Invalid request body: {}", e)))?;

    let nuc = payload.nuc.unwrap_or_default();
    let outcome = state
        .service
        .handle(&nuc, positive(payload.pagina), positive(payload.registros))
        .await?;
    Ok(Json(outcome))
}
