//! Customer endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use logiflow_common::deletion::{delete_or_deactivate, DeletionOutcome};
use logiflow_common::models::Customer;
use logiflow_common::time::now;
use tracing::info;
use uuid::Uuid;

use crate::db::customers::{self, NewCustomer, CUSTOMER_DELETION};
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;
use crate::AppState;

/// GET /api/customers
pub async fn list_customers(State(state): State<AppState>) -> ApiResult<Json<Vec<Customer>>> {
    let mut conn = state.db.acquire().await?;
    Ok(Json(customers::list_customers(&mut conn).await?))
}

/// POST /api/customers
pub async fn create_customer(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<NewCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    let customer = input.into_customer(now())?;

    let mut conn = state.db.acquire().await?;
    customers::insert_customer(&mut conn, &customer).await?;

    info!(customer_id = %customer.id, "Created customer");
    Ok((StatusCode::CREATED, Json(customer)))
}

/// GET /api/customers/:id
pub async fn get_customer(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Customer>> {
    let mut conn = state.db.acquire().await?;
    customers::load_customer(&mut conn, id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Customer {}", id)))
}

/// DELETE /api/customers/:id
///
/// Deactivates instead when contracts still reference the customer.
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeletionOutcome>> {
    let outcome = delete_or_deactivate(&state.db, &CUSTOMER_DELETION, id).await?;
    Ok(Json(outcome))
}

pub fn customer_routes() -> Router<AppState> {
    Router::new()
        .route("/api/customers", get(list_customers).post(create_customer))
        .route("/api/customers/:id", get(get_customer).delete(delete_customer))
}
