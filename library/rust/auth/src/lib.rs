//! asrp-auth: OIDC ベアラートークン検証 + クライアントロール RBAC ライブラリ
//!
//! discovery ドキュメントと JWKS を TTL 付きでキャッシュし、
//! Keycloak が発行したアクセストークンの署名・issuer・audience・有効期限を検証する。
//! 検証済みトークンの `resource_access.<client>.roles` からロールを取り出し、
//! エンドポイントごとの必須ロールと照合する。
//!
//! # 使い方
//!
//! ```ignore
//! use asrp_auth::{middleware, AuthConfig, OidcVerifier};
//! use std::sync::Arc;
//!
//! let config = AuthConfig::new("http://keycloak:8080/realms/asrp", "asrp-orders");
//! let verifier = Arc::new(OidcVerifier::from_config(&config)?);
//! let state = middleware::AuthState::new(verifier);
//!
//! let app = Router::new()
//!     .route("/v1/orders", get(list_orders))
//!     .route_layer(axum::middleware::from_fn(middleware::require_roles(["orders_read"])))
//!     .layer(axum::middleware::from_fn_with_state(state, middleware::auth_middleware));
//! ```

mod cache;

pub mod claims;
pub mod config;
pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod jwks;
pub mod middleware;
pub mod rbac;
pub mod roles;
pub mod selector;
pub mod validator;
pub mod verifier;

pub use cache::Snapshot;
pub use claims::{Audience, Claims};
pub use config::{normalize_discovery_url, AuthConfig, AuthConfigError};
pub use discovery::{DiscoveryCache, DiscoveryDocument};
pub use error::{AuthError, AuthStatus, InvalidClaim};
pub use fetcher::{FetchError, HttpOidcFetcher, OidcFetcher};
pub use jwks::{KeySet, KeySetCache, SigningKey};
pub use middleware::{auth_middleware, require_roles, AuthErrorResponse, AuthState};
pub use rbac::{authorize, Decision, RequiredRoles};
pub use roles::{extract_roles, RoleSet};
pub use selector::KeySelector;
pub use validator::{validate, ValidationPolicy};
pub use verifier::OidcVerifier;

#[cfg(test)]
mod tests;
