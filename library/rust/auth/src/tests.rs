//! テスト: 検証器全体（キャッシュ・鍵ローテーション・ミドルウェア）

#[cfg(test)]
mod tests {
    use crate::config::AuthConfig;
    use crate::error::{AuthError, InvalidClaim};
    use crate::fetcher::{FetchError, OidcFetcher};
    use crate::middleware::{auth_middleware, require_roles, AuthState};
    use crate::roles::RoleSet;
    use crate::verifier::OidcVerifier;
    use asrp_test_helper::jwt::{jwks, TestClaims, TestSigningKey};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::routing::get;
    use axum::{Extension, Router};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    const ISSUER: &str = "http://idp.test/realms/asrp";
    const DISCOVERY_URL: &str = "http://idp.test/realms/asrp/.well-known/openid-configuration";
    const JWKS_URL: &str = "http://idp.test/realms/asrp/protocol/openid-connect/certs";
    const CLIENT_ID: &str = "asrp-orders";

    /// テスト用の IdP。エンドポイントごとの呼び出し回数を数える。
    struct FakeIdp {
        discovery: Mutex<Result<Value, u16>>,
        jwks: Mutex<Result<Value, u16>>,
        discovery_calls: AtomicUsize,
        jwks_calls: AtomicUsize,
        latency: Duration,
    }

    impl FakeIdp {
        fn new(keys: &[&TestSigningKey]) -> Arc<Self> {
            Arc::new(Self {
                discovery: Mutex::new(Ok(json!({
                    "issuer": ISSUER,
                    "jwks_uri": JWKS_URL,
                }))),
                jwks: Mutex::new(Ok(jwks(keys))),
                discovery_calls: AtomicUsize::new(0),
                jwks_calls: AtomicUsize::new(0),
                latency: Duration::from_millis(20),
            })
        }

        fn publish(&self, keys: &[&TestSigningKey]) {
            *self.jwks.lock().unwrap() = Ok(jwks(keys));
        }

        fn fail_jwks(&self, status: u16) {
            *self.jwks.lock().unwrap() = Err(status);
        }

        fn discovery_calls(&self) -> usize {
            self.discovery_calls.load(Ordering::SeqCst)
        }

        fn jwks_calls(&self) -> usize {
            self.jwks_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl OidcFetcher for FakeIdp {
        async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
            tokio::time::sleep(self.latency).await;
            let response = match url {
                DISCOVERY_URL => {
                    self.discovery_calls.fetch_add(1, Ordering::SeqCst);
                    self.discovery.lock().unwrap().clone()
                }
                JWKS_URL => {
                    self.jwks_calls.fetch_add(1, Ordering::SeqCst);
                    self.jwks.lock().unwrap().clone()
                }
                other => panic!("unexpected url {other}"),
            };
            response.map_err(FetchError::Status)
        }
    }

    fn config() -> AuthConfig {
        let mut cfg = AuthConfig::new(ISSUER, CLIENT_ID);
        cfg.expected_audience = Some(CLIENT_ID.to_string());
        cfg.enforce_audience = true;
        cfg.jwks_ttl_seconds = 300;
        cfg.discovery_ttl_seconds = 300;
        cfg
    }

    fn verifier(idp: &Arc<FakeIdp>, cfg: &AuthConfig) -> Arc<OidcVerifier> {
        Arc::new(OidcVerifier::with_fetcher(cfg, idp.clone()).unwrap())
    }

    fn token(key: &TestSigningKey, roles: &[&str]) -> String {
        key.sign(
            &TestClaims::new(ISSUER, CLIENT_ID)
                .with_client_roles(CLIENT_ID, roles)
                .build(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_verify_token_success() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());

        let claims = verifier
            .verify_token(&token(TestSigningKey::primary(), &["orders_read"]))
            .await
            .unwrap();

        assert_eq!(claims.iss.as_deref(), Some(ISSUER));
        assert_eq!(verifier.roles(&claims).as_slice(), ["orders_read"]);
        assert_eq!(idp.discovery_calls(), 1);
        assert_eq!(idp.jwks_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cold_cache_burst_fetches_once() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());
        let token = token(TestSigningKey::primary(), &["orders_read"]);

        let mut handles = Vec::new();
        for _ in 0..100 {
            let verifier = Arc::clone(&verifier);
            let token = token.clone();
            handles.push(tokio::spawn(async move { verifier.verify_token(&token).await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        assert_eq!(idp.discovery_calls(), 1);
        assert_eq!(idp.jwks_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_key_rotation_forces_single_refresh() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());

        verifier
            .verify_token(&token(TestSigningKey::primary(), &[]))
            .await
            .unwrap();
        assert_eq!(idp.jwks_calls(), 1);

        idp.publish(&[TestSigningKey::primary(), TestSigningKey::secondary()]);
        let claims = verifier
            .verify_token(&token(TestSigningKey::secondary(), &["orders_read"]))
            .await
            .unwrap();

        assert!(verifier.roles(&claims).contains("orders_read"));
        assert_eq!(idp.jwks_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_kid_after_refresh() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());

        let err = verifier
            .verify_token(&token(TestSigningKey::secondary(), &[]))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::UnknownSigningKey { kid } if kid == "k2"));
        assert_eq!(idp.jwks_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_unknown_kid_shares_forced_refresh() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());
        let token = token(TestSigningKey::secondary(), &[]);

        let mut handles = Vec::new();
        for _ in 0..10 {
            let verifier = Arc::clone(&verifier);
            let token = token.clone();
            handles.push(tokio::spawn(async move { verifier.verify_token(&token).await }));
        }
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Err(AuthError::UnknownSigningKey { .. })
            ));
        }

        // 初回取得 1 回 + 強制再取得 1 回
        assert_eq!(idp.jwks_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_keys_survive_outage_within_ttl() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());
        let token = token(TestSigningKey::primary(), &[]);

        verifier.verify_token(&token).await.unwrap();
        idp.fail_jwks(503);
        tokio::time::advance(Duration::from_secs(200)).await;

        assert!(verifier.verify_token(&token).await.is_ok());
        assert_eq!(idp.jwks_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_outage_after_ttl_is_fail_closed() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());
        let token = token(TestSigningKey::primary(), &[]);

        verifier.verify_token(&token).await.unwrap();
        idp.fail_jwks(503);
        tokio::time::advance(Duration::from_secs(301)).await;

        let err = verifier.verify_token(&token).await.unwrap_err();
        assert!(matches!(err, AuthError::JwksUnavailable(_)));
        assert!(verifier.key_set().cached().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_outage_burst_shares_one_failed_fetch() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());
        let token = token(TestSigningKey::primary(), &[]);

        verifier.verify_token(&token).await.unwrap();
        idp.fail_jwks(503);
        tokio::time::advance(Duration::from_secs(301)).await;

        let started = tokio::time::Instant::now();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let verifier = Arc::clone(&verifier);
            let token = token.clone();
            handles.push(tokio::spawn(async move { verifier.verify_token(&token).await }));
        }
        for handle in handles {
            assert!(matches!(
                handle.await.unwrap(),
                Err(AuthError::JwksUnavailable(_))
            ));
        }

        // 初回取得 1 回 + 障害中の取得 1 回。待機していたリクエストは同じ失敗を受け取る
        assert_eq!(idp.jwks_calls(), 2);
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry_triggers_one_fetch_per_cache() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());
        let token = token(TestSigningKey::primary(), &[]);

        verifier.verify_token(&token).await.unwrap();
        tokio::time::advance(Duration::from_secs(100)).await;
        verifier.verify_token(&token).await.unwrap();
        assert_eq!(idp.discovery_calls(), 1);
        assert_eq!(idp.jwks_calls(), 1);

        tokio::time::advance(Duration::from_secs(201)).await;
        verifier.verify_token(&token).await.unwrap();
        assert_eq!(idp.discovery_calls(), 2);
        assert_eq!(idp.jwks_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_issuer_from_discovery_when_not_configured() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());

        let foreign = TestSigningKey::primary().sign(
            &TestClaims::new("http://other-idp/realms/asrp", CLIENT_ID).build(),
        );
        let err = verifier.verify_token(&foreign).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::ClaimInvalid { claim: InvalidClaim::Issuer, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_issuer_overrides_discovery() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let mut cfg = config();
        cfg.expected_issuer = Some("http://public-host/realms/asrp".to_string());
        let verifier = verifier(&idp, &cfg);

        let public = TestSigningKey::primary().sign(
            &TestClaims::new("http://public-host/realms/asrp", CLIENT_ID).build(),
        );
        assert!(verifier.verify_token(&public).await.is_ok());

        let internal = token(TestSigningKey::primary(), &[]);
        assert!(verifier.verify_token(&internal).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_audience_mismatch_rejected() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());

        let token = TestSigningKey::primary().sign(&TestClaims::new(ISSUER, "account").build());
        let err = verifier.verify_token(&token).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::ClaimInvalid { claim: InvalidClaim::Audience, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rogue_key_with_known_kid() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());

        let forged = token(TestSigningKey::rogue(), &["orders_admin"]);
        let err = verifier.verify_token(&forged).await.unwrap_err();
        assert!(matches!(err, AuthError::SignatureInvalid(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_authorize_reports_missing_roles() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let verifier = verifier(&idp, &config());
        let claims = verifier
            .verify_token(&token(TestSigningKey::primary(), &["orders_read"]))
            .await
            .unwrap();

        let required = crate::rbac::RequiredRoles::new(["orders_read", "orders_write"]);
        let err = verifier.authorize(&claims, &required).unwrap_err();
        assert!(matches!(
            err,
            AuthError::InsufficientRole { missing } if missing == vec!["orders_write".to_string()]
        ));
    }

    fn app(verifier: Arc<OidcVerifier>) -> Router {
        let state = AuthState::new(verifier);
        Router::new()
            .route(
                "/v1/orders",
                get(|Extension(roles): Extension<RoleSet>| async move {
                    roles.as_slice().join(",")
                }),
            )
            .route_layer(axum::middleware::from_fn(require_roles(["orders_read"])))
            .layer(axum::middleware::from_fn_with_state(state, auth_middleware))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_router_missing_token_is_401() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let app = app(verifier(&idp, &config()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/orders")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
        assert_eq!(
            body_json(response).await,
            json!({"error": "unauthorized", "message": "Missing bearer token", "requestId": "req-42"})
        );
        assert_eq!(idp.discovery_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_router_allows_required_role() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let app = app(verifier(&idp, &config()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/orders")
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", token(TestSigningKey::primary(), &["orders_read"])),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"orders_read");
    }

    #[tokio::test(start_paused = true)]
    async fn test_router_missing_role_is_403() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let app = app(verifier(&idp, &config()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/orders")
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", token(TestSigningKey::primary(), &["orders_write"])),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
        assert_eq!(
            body_json(response).await,
            json!({"error": "forbidden", "message": "Insufficient permissions", "requestId": null})
        );
    }

    /// 発行されたイベントをフィールド付きの 1 行文字列として記録するレイヤー。
    #[derive(Clone, Default)]
    struct CapturedEvents(Arc<Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CapturedEvents {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            let mut line = String::new();
            let mut visit = |field: &tracing::field::Field, value: &dyn std::fmt::Debug| {
                line.push_str(&format!("{}={:?} ", field.name(), value));
            };
            event.record(&mut visit);
            self.0.lock().unwrap().push(line);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_router_missing_role_logs_single_rejection() {
        use tracing_subscriber::layer::SubscriberExt;

        let events = CapturedEvents::default();
        let _guard =
            tracing::subscriber::set_default(tracing_subscriber::registry().with(events.clone()));

        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let app = app(verifier(&idp, &config()));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/orders")
                    .header("x-request-id", "req-7")
                    .header(
                        header::AUTHORIZATION,
                        format!("Bearer {}", token(TestSigningKey::primary(), &["orders_write"])),
                    )
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let rejections: Vec<String> = events
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains("request rejected") || line.contains("insufficient role"))
            .cloned()
            .collect();
        assert_eq!(rejections.len(), 1, "{rejections:?}");
        let line = &rejections[0];
        assert!(line.contains("request_id=req-7"), "{line}");
        assert!(line.contains("principal="), "{line}");
        assert!(line.contains("required=[\"orders_read\"]"), "{line}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_router_expired_token_is_401_without_details() {
        let idp = FakeIdp::new(&[TestSigningKey::primary()]);
        let app = app(verifier(&idp, &config()));
        let expired = TestSigningKey::primary().sign(
            &TestClaims::new(ISSUER, CLIENT_ID)
                .expires_in(-3600)
                .with_client_roles(CLIENT_ID, &["orders_read"])
                .build(),
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/orders")
                    .header(header::AUTHORIZATION, format!("Bearer {expired}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["message"], "Invalid token");
        assert!(!body.to_string().contains("exp"));
    }
}
