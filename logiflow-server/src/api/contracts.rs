//! Contract endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use logiflow_common::deletion::{delete_or_deactivate, DeletionOutcome};
use logiflow_common::models::Contract;
use logiflow_common::time::now;
use tracing::info;
use uuid::Uuid;

use crate::db::contracts::{self, NewContract, CONTRACT_DELETION};
use crate::db::customers;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::AppState;

/// GET /api/contracts
pub async fn list_contracts(State(state): State<AppState>) -> ApiResult<Json<Vec<Contract>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(contracts::list_contracts(&mut conn).await?))
}

/// POST /api/contracts
pub async fn create_contract(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewContract>,
) -> ApiResult<(StatusCode, Json<Contract>)> {
    let contract = input.into_contract(now())?;

    let mut conn = state.db.acquire().await?;
    if let Some(customer_id) = contract.customer_id {
        if customers::load_customer(&mut conn, customer_id).await?.is_none() {
            return Err(ApiError::BadRequest(format!("Unknown customer: {}", customer_id)));
        }
    }
    contracts::insert_contract(&mut conn, &contract).await?;

    info!(contract_id = %contract.id, pricing_model = contract.pricing_model.as_str(), "Created contract");
    Ok((StatusCode::CREATED, Json(contract)))
}

/// GET /api/contracts/:id
pub async fn get_contract(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Contract>> {
    let mut conn = state.db.acquire().await?;
    contracts::load_contract(&mut conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Contract {}", id)))
}

/// DELETE /api/contracts/:id
///
/// Deactivates instead when routes or packages are billed under it.
pub async fn delete_contract(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeletionOutcome>> {
    let outcome = delete_or_deactivate(&state.db, &CONTRACT_DELETION, id).await?;
    Ok(Json(outcome))
}

pub fn contract_routes() -> Router<AppState> {
    Router::new()
        .route("/api/contracts", get(list_contracts).post(create_contract))
        .route("/api/contracts/:id", get(get_contract).delete(delete_contract))
}
