use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Deserialize;
use tracing::{error, info};

use super::{AppState, ErrorResponse};
use crate::usecase::{CreateProductError, CreateProductInput};

/// GET /v1/products
pub async fn list_products(State(state): State<AppState>) -> impl IntoResponse {
    match state.list_products_uc.execute().await {
        Ok(products) => (StatusCode::OK, Json(products)).into_response(),
        Err(e) => {
            error!(error = %e, "failed to list products");
            let err = ErrorResponse::new("CATALOG_LIST_FAILED", "failed to list products");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(err)).into_response()
        }
    }
}

/// POST /v1/products
pub async fn create_product(
    State(state): State<AppState>,
    Json(req): Json<CreateProductRequest>,
) -> impl IntoResponse {
    let input = CreateProductInput {
        sku: req.sku,
        name: req.name,
    };

    match state.create_product_uc.execute(&input).await {
        Ok(product) => {
            info!(product_id = product.id, sku = %product.sku, "product created");
            (StatusCode::CREATED, Json(product)).into_response()
        }
        Err(CreateProductError::Validation(msg)) => {
            let err = ErrorResponse::new("CATALOG_VALIDATION", &msg);
            (StatusCode::BAD_REQUEST, Json(err)).into_response()
        }
        Err(e @ CreateProductError::Conflict(_)) => {
            let err = ErrorResponse::new("CATALOG_SKU_CONFLICT", &e.to_string());
            (StatusCode::CONFLICT, Json(err)).into_response()
        }
        Err(e @ CreateProductError::Internal(_)) => {
            error!(error = %e, "failed to create product");
            let err = ErrorResponse::new("CATALOG_CREATE_FAILED", "failed to create product");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(err)).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub name: String,
}
