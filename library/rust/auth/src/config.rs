//! 認証設定（サービスの config.yaml の `auth` セクション）。

use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use serde::Deserialize;

/// OIDC discovery の標準パス。
pub const DISCOVERY_SUFFIX: &str = "/.well-known/openid-configuration";

/// AuthConfig は OIDC ベアラートークン検証の設定を表す。
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// discovery ドキュメントの URL。レルムのベース URL だけでもよい。
    pub discovery_url: String,
    /// 期待する iss。未設定の場合は discovery ドキュメントの issuer を使う。
    #[serde(default)]
    pub expected_issuer: Option<String>,
    #[serde(default)]
    pub expected_audience: Option<String>,
    #[serde(default = "default_enforce_audience")]
    pub enforce_audience: bool,
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<String>,
    #[serde(default = "default_leeway_seconds")]
    pub leeway_seconds: u64,
    #[serde(default = "default_cache_ttl_seconds")]
    pub discovery_ttl_seconds: u64,
    #[serde(default = "default_cache_ttl_seconds")]
    pub jwks_ttl_seconds: u64,
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    /// ロールを読み出す resource_access のクライアント ID。
    pub rbac_client_id: String,
    /// realm_access のロールも合算するかどうか。
    #[serde(default)]
    pub include_realm_roles: bool,
}

fn default_enforce_audience() -> bool {
    true
}

fn default_allowed_algorithms() -> Vec<String> {
    vec!["RS256".to_string()]
}

fn default_leeway_seconds() -> u64 {
    10
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

fn default_http_timeout_seconds() -> u64 {
    3
}

/// AuthConfigError は起動時に検出する設定エラーを表す。
#[derive(Debug, thiserror::Error)]
pub enum AuthConfigError {
    #[error("auth.discovery_url must not be empty")]
    EmptyDiscoveryUrl,

    #[error("auth.rbac_client_id must not be empty")]
    EmptyClientId,

    #[error("auth.allowed_algorithms must not be empty")]
    NoAlgorithms,

    #[error("auth.allowed_algorithms contains unsupported algorithm {0:?}")]
    UnsupportedAlgorithm(String),

    #[error("auth.enforce_audience is true but auth.expected_audience is not set")]
    MissingAudience,

    #[error("auth.{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("failed to build OIDC HTTP client: {0}")]
    HttpClient(String),
}

impl AuthConfig {
    /// 必須項目だけを指定し、残りをデフォルト値で埋めた設定を生成する。
    ///
    /// audience は `rbac_client_id` と同じ値で検証する（YAML の既定と同じく有効）。
    pub fn new(discovery_url: impl Into<String>, rbac_client_id: impl Into<String>) -> Self {
        let rbac_client_id = rbac_client_id.into();
        Self {
            discovery_url: discovery_url.into(),
            expected_issuer: None,
            expected_audience: Some(rbac_client_id.clone()),
            enforce_audience: default_enforce_audience(),
            allowed_algorithms: default_allowed_algorithms(),
            leeway_seconds: default_leeway_seconds(),
            discovery_ttl_seconds: default_cache_ttl_seconds(),
            jwks_ttl_seconds: default_cache_ttl_seconds(),
            http_timeout_seconds: default_http_timeout_seconds(),
            rbac_client_id,
            include_realm_roles: false,
        }
    }

    /// 設定値の整合性を確認する。
    pub fn validate(&self) -> Result<(), AuthConfigError> {
        if self.discovery_url.trim().is_empty() {
            return Err(AuthConfigError::EmptyDiscoveryUrl);
        }
        if self.rbac_client_id.trim().is_empty() {
            return Err(AuthConfigError::EmptyClientId);
        }
        if self.enforce_audience
            && self
                .expected_audience
                .as_deref()
                .is_none_or(|aud| aud.trim().is_empty())
        {
            return Err(AuthConfigError::MissingAudience);
        }
        for (name, value) in [
            ("http_timeout_seconds", self.http_timeout_seconds),
            ("discovery_ttl_seconds", self.discovery_ttl_seconds),
            ("jwks_ttl_seconds", self.jwks_ttl_seconds),
        ] {
            if value == 0 {
                return Err(AuthConfigError::ZeroDuration(name));
            }
        }
        self.algorithms().map(|_| ())
    }

    /// allowed_algorithms を jsonwebtoken の Algorithm に変換する。
    pub fn algorithms(&self) -> Result<Vec<Algorithm>, AuthConfigError> {
        let mut algorithms = Vec::with_capacity(self.allowed_algorithms.len());
        for name in &self.allowed_algorithms {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let alg = Algorithm::from_str(name)
                .map_err(|_| AuthConfigError::UnsupportedAlgorithm(name.to_string()))?;
            if !algorithms.contains(&alg) {
                algorithms.push(alg);
            }
        }
        if algorithms.is_empty() {
            return Err(AuthConfigError::NoAlgorithms);
        }
        Ok(algorithms)
    }

    /// 正規化済みの discovery URL。
    pub fn normalized_discovery_url(&self) -> String {
        normalize_discovery_url(&self.discovery_url)
    }

    /// 検証対象とする audience。enforce_audience が false の場合は None。
    pub fn audience_to_enforce(&self) -> Option<&str> {
        if self.enforce_audience {
            self.expected_audience.as_deref()
        } else {
            None
        }
    }

    pub fn discovery_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery_ttl_seconds)
    }

    pub fn jwks_ttl(&self) -> Duration {
        Duration::from_secs(self.jwks_ttl_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

/// discovery URL を正規化する。
///
/// レルムのベース URL（`<base>/realms/<realm>`）だけが設定されている場合は
/// 標準の discovery パスを付与する。
pub fn normalize_discovery_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.ends_with(DISCOVERY_SUFFIX) {
        trimmed.to_string()
    } else {
        format!("{trimmed}{DISCOVERY_SUFFIX}")
    }
}
