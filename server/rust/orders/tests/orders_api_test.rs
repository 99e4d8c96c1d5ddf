//! orders-api のルーターをモック OIDC プロバイダーに対して検証する。

use std::sync::Arc;

use asrp_auth::{AuthConfig, OidcVerifier};
use asrp_orders_server::adapter::handler::{router, AppState};
use asrp_orders_server::infrastructure::config::{AppConfig, RbacConfig};
use asrp_orders_server::infrastructure::static_order_repository::StaticOrderRepository;
use asrp_orders_server::usecase::ListOrdersUseCase;
use asrp_test_helper::jwt::{jwks, TestClaims, TestSigningKey};
use asrp_test_helper::mock_server::MockOidcProvider;
use asrp_test_helper::AssertionHelper;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

const CLIENT_ID: &str = "asrp-orders";

async fn setup() -> (MockOidcProvider, Router) {
    let idp = MockOidcProvider::start("asrp").await;
    idp.mount_discovery(None).await;
    idp.mount_jwks(jwks(&[TestSigningKey::primary()]), None).await;

    let mut auth = AuthConfig::new(idp.issuer(), CLIENT_ID);
    auth.enforce_audience = false;
    auth.include_realm_roles = true;
    let verifier = Arc::new(OidcVerifier::from_config(&auth).unwrap());

    let state = AppState {
        service: Arc::new(AppConfig {
            name: "orders-api".to_string(),
            version: "0.1.0".to_string(),
            environment: "test".to_string(),
        }),
        rbac: Arc::new(RbacConfig::default()),
        verifier,
        list_orders_uc: Arc::new(ListOrdersUseCase::new(Arc::new(
            StaticOrderRepository::default(),
        ))),
    };
    (idp, router(state))
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn orders_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/v1/orders");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_is_public() {
    let (_idp, app) = setup().await;
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, headers, body) = send(app, req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "ok", "service": "orders-api", "env": "test", "version": "0.1.0"})
    );
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn test_list_orders_with_client_role() {
    let (idp, app) = setup().await;
    let token = TestSigningKey::primary().sign(
        &TestClaims::new(idp.issuer(), CLIENT_ID)
            .with_client_roles(CLIENT_ID, &["orders_read"])
            .build(),
    );

    let (status, _, body) = send(app, orders_request(Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"id": "ord_001", "status": "created"},
            {"id": "ord_002", "status": "paid"},
        ])
    );
}

#[tokio::test]
async fn test_list_orders_with_realm_role() {
    let (idp, app) = setup().await;
    let token = TestSigningKey::primary().sign(
        &TestClaims::new(idp.issuer(), "account")
            .with_realm_roles(&["orders_read"])
            .build(),
    );

    let (status, _, _) = send(app, orders_request(Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_list_orders_without_token_is_unauthorized() {
    let (_idp, app) = setup().await;
    let req = Request::builder()
        .uri("/v1/orders")
        .header("x-request-id", "req-orders-1")
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = send(app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(headers[header::WWW_AUTHENTICATE], "Bearer");
    assert_eq!(headers["x-request-id"], "req-orders-1");
    AssertionHelper::assert_auth_error(&body, "unauthorized", "Missing bearer token");
    assert_eq!(body["requestId"], "req-orders-1");
}

#[tokio::test]
async fn test_list_orders_with_foreign_issuer_is_unauthorized() {
    let (_idp, app) = setup().await;
    let token = TestSigningKey::primary().sign(
        &TestClaims::new("http://evil.test/realms/asrp", CLIENT_ID)
            .with_client_roles(CLIENT_ID, &["orders_read"])
            .build(),
    );

    let (status, _, body) = send(app, orders_request(Some(&token))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    AssertionHelper::assert_auth_error(&body, "unauthorized", "Invalid token");
}

#[tokio::test]
async fn test_list_orders_without_role_is_forbidden() {
    let (idp, app) = setup().await;
    let token = TestSigningKey::primary().sign(
        &TestClaims::new(idp.issuer(), CLIENT_ID)
            .with_client_roles(CLIENT_ID, &["orders_write"])
            .build(),
    );

    let (status, headers, body) = send(app, orders_request(Some(&token))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(!headers.contains_key(header::WWW_AUTHENTICATE));
    AssertionHelper::assert_auth_error(&body, "forbidden", "Insufficient permissions");
    assert!(body["requestId"].is_string());
}

#[tokio::test]
async fn test_unknown_route_is_not_found_without_auth() {
    let (_idp, app) = setup().await;
    let req = Request::builder().uri("/v1/unknown").body(Body::empty()).unwrap();
    let (status, _, _) = send(app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
