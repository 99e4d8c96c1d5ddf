//! 認証・認可エラーの閉じた列挙。
//!
//! 検証処理はすべてこの `AuthError` を返し、HTTP レスポンスへの変換は
//! `middleware::AuthErrorResponse` の一箇所で行う。

use std::fmt;

/// InvalidClaim は検証に失敗した claim の種別を表す。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidClaim {
    Issuer,
    Audience,
    Expired,
    NotYetValid,
}

impl InvalidClaim {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Issuer => "issuer",
            Self::Audience => "audience",
            Self::Expired => "expired",
            Self::NotYetValid => "not yet valid",
        }
    }
}

impl fmt::Display for InvalidClaim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// AuthStatus は呼び出し元に見せる結果の分類。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    /// 401: 認証されていない
    Unauthenticated,
    /// 403: 認証済みだが権限が不足している
    Forbidden,
}

/// AuthError は認証・認可エラーを表す。
///
/// 各バリアントの詳細文字列は運用者向けログ専用であり、レスポンスには含めない。
#[derive(thiserror::Error, Debug, Clone)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingToken,

    #[error("invalid Authorization header format")]
    MalformedHeader,

    #[error("malformed token: {0}")]
    MalformedToken(String),

    #[error("no signing key for kid {kid:?}")]
    UnknownSigningKey { kid: String },

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("claim invalid ({claim}): {detail}")]
    ClaimInvalid { claim: InvalidClaim, detail: String },

    #[error("OIDC discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    #[error("JWKS unavailable: {0}")]
    JwksUnavailable(String),

    #[error("insufficient role: missing {missing:?}")]
    InsufficientRole { missing: Vec<String> },
}

impl AuthError {
    pub(crate) fn claim(claim: InvalidClaim, detail: impl Into<String>) -> Self {
        Self::ClaimInvalid {
            claim,
            detail: detail.into(),
        }
    }

    /// 呼び出し元に返す分類を返す。InsufficientRole 以外はすべて 401 扱い。
    pub fn status(&self) -> AuthStatus {
        match self {
            Self::InsufficientRole { .. } => AuthStatus::Forbidden,
            _ => AuthStatus::Unauthenticated,
        }
    }

    /// ログ集計用の安定したラベル。
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::MalformedHeader => "malformed_header",
            Self::MalformedToken(_) => "malformed_token",
            Self::UnknownSigningKey { .. } => "unknown_signing_key",
            Self::SignatureInvalid(_) => "signature_invalid",
            Self::ClaimInvalid { .. } => "claim_invalid",
            Self::DiscoveryUnavailable(_) => "discovery_unavailable",
            Self::JwksUnavailable(_) => "jwks_unavailable",
            Self::InsufficientRole { .. } => "insufficient_role",
        }
    }

    /// 上流（IdP）の障害に起因するエラーかどうか。
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryUnavailable(_) | Self::JwksUnavailable(_)
        )
    }
}
