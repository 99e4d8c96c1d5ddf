use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::error;

use super::{AppState, ErrorResponse};

/// GET /v1/orders
pub async fn list_orders(State(state): State<AppState>) -> impl IntoResponse {
    match state.list_orders_uc.execute().await {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => {
            error!(error = %e, "failed to list orders");
            let err = ErrorResponse::new("ORDERS_LIST_FAILED", "failed to list orders");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(err)).into_response()
        }
    }
}
