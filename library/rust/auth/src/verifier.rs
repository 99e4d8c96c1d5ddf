//! OIDC 検証器: discovery・JWKS キャッシュ、鍵選択、claim 検証、ロール抽出をまとめる。

use std::sync::Arc;

use tracing::debug;

use crate::claims::Claims;
use crate::config::{AuthConfig, AuthConfigError};
use crate::discovery::DiscoveryCache;
use crate::error::AuthError;
use crate::fetcher::{HttpOidcFetcher, OidcFetcher};
use crate::jwks::KeySetCache;
use crate::rbac::{self, Decision, RequiredRoles};
use crate::roles::{self, RoleSet};
use crate::selector::KeySelector;
use crate::validator::{self, ValidationPolicy};

/// OidcVerifier はベアラートークンを検証し、ロールを解決する。
///
/// プロセスで 1 つ生成し、`Arc` で各リクエストと共有する。
pub struct OidcVerifier {
    discovery: DiscoveryCache,
    selector: KeySelector,
    /// 設定で固定された issuer。None なら discovery の issuer を使う
    expected_issuer: Option<String>,
    policy: ValidationPolicy,
    client_id: String,
    include_realm_roles: bool,
}

impl OidcVerifier {
    /// 設定から HTTP フェッチャー付きの検証器を生成する。
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthConfigError> {
        let fetcher = HttpOidcFetcher::new(config.http_timeout())
            .map_err(|e| AuthConfigError::HttpClient(e.to_string()))?;
        Self::with_fetcher(config, Arc::new(fetcher))
    }

    /// カスタムフェッチャーを指定して生成する（テスト用）。
    pub fn with_fetcher(
        config: &AuthConfig,
        fetcher: Arc<dyn OidcFetcher>,
    ) -> Result<Self, AuthConfigError> {
        config.validate()?;

        let discovery = DiscoveryCache::new(
            config.normalized_discovery_url(),
            config.discovery_ttl(),
            Arc::clone(&fetcher),
        );
        let keys = KeySetCache::new(discovery.clone(), config.jwks_ttl(), fetcher);
        let expected_issuer = config
            .expected_issuer
            .as_deref()
            .map(str::trim)
            .filter(|iss| !iss.is_empty())
            .map(str::to_string);

        Ok(Self {
            discovery,
            selector: KeySelector::new(keys),
            policy: ValidationPolicy {
                expected_issuer: expected_issuer.clone().unwrap_or_default(),
                expected_audience: config.audience_to_enforce().map(str::to_string),
                algorithms: config.algorithms()?,
                leeway_seconds: config.leeway_seconds,
            },
            expected_issuer,
            client_id: config.rbac_client_id.clone(),
            include_realm_roles: config.include_realm_roles,
        })
    }

    pub fn discovery(&self) -> &DiscoveryCache {
        &self.discovery
    }

    pub fn key_set(&self) -> &KeySetCache {
        self.selector.key_set()
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// トークンを検証して claims を返す。
    pub async fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let key = self.selector.select_key(token).await?;

        let claims = if self.expected_issuer.is_some() {
            validator::validate(token, &key, &self.policy)?
        } else {
            let doc = self.discovery.get_discovery().await?;
            if doc.issuer.is_empty() {
                return Err(AuthError::DiscoveryUnavailable(
                    "discovery document has no issuer and auth.expected_issuer is not set"
                        .to_string(),
                ));
            }
            let policy = ValidationPolicy {
                expected_issuer: doc.issuer.clone(),
                ..self.policy.clone()
            };
            validator::validate(token, &key, &policy)?
        };

        debug!(principal = %claims.principal(), kid = %key.kid(), "token verified");
        Ok(claims)
    }

    /// 検証済み claims から、このサービスのロールを取り出す。
    pub fn roles(&self, claims: &Claims) -> RoleSet {
        roles::extract_roles(claims, &self.client_id, self.include_realm_roles)
    }

    /// 必須ロールを満たすかを判定する。満たさない場合は InsufficientRole。
    pub fn authorize(&self, claims: &Claims, required: &RequiredRoles) -> Result<RoleSet, AuthError> {
        let roles = self.roles(claims);
        match rbac::authorize(&roles, required) {
            Decision::Allow => Ok(roles),
            Decision::Deny { missing } => Err(AuthError::InsufficientRole { missing }),
        }
    }
}
