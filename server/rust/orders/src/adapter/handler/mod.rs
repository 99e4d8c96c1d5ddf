pub mod health;
pub mod order_handler;

use std::sync::Arc;

use asrp_auth::{auth_middleware, require_roles, AuthState, OidcVerifier};
use asrp_correlation::RequestIdLayer;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::infrastructure::config::{AppConfig, RbacConfig};
use crate::usecase::ListOrdersUseCase;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AppConfig>,
    pub rbac: Arc<RbacConfig>,
    pub verifier: Arc<OidcVerifier>,
    pub list_orders_uc: Arc<ListOrdersUseCase>,
}

/// router はアプリケーションのルーターを構築する。
///
/// レイヤーは外側から RequestId → 認証 → ルートごとのロール判定の順に適用される。
/// `/health` は認証なしで公開する。
pub fn router(state: AppState) -> Router {
    let auth_state = AuthState::new(Arc::clone(&state.verifier));

    let protected = Router::new()
        .route(
            "/v1/orders",
            get(order_handler::list_orders)
                .route_layer(from_fn(require_roles(state.rbac.list_orders.clone()))),
        )
        .route_layer(from_fn_with_state(auth_state, auth_middleware));

    Router::new()
        .route("/health", get(health::health))
        .merge(protected)
        .with_state(state)
        .layer(RequestIdLayer::new())
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            error: ErrorBody {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }
}
