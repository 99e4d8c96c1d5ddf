//! asrp-test-helper: asrp サービスのテスト用ヘルパー
//!
//! - `jwt`: RS256 署名鍵・JWKS・Keycloak 形式のトークン生成
//! - `mock-server`: discovery / JWKS エンドポイントを提供するモック OIDC プロバイダー

pub mod assertion;
#[cfg(feature = "jwt")]
pub mod jwt;
#[cfg(feature = "mock-server")]
pub mod mock_server;

pub use assertion::AssertionHelper;
#[cfg(feature = "jwt")]
pub use jwt::{jwks, TestClaims, TestSigningKey};
#[cfg(feature = "mock-server")]
pub use mock_server::MockOidcProvider;
