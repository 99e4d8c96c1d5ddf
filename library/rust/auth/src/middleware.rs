//! axum 用の認証・認可ミドルウェアとエラーレスポンス。

use std::sync::Arc;

use asrp_correlation::{RequestId, REQUEST_ID_HEADER};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{info, warn};

use crate::claims::Claims;
use crate::error::{AuthError, AuthStatus};
use crate::rbac::{self, Decision, RequiredRoles};
use crate::roles::RoleSet;
use crate::verifier::OidcVerifier;

/// ミドルウェアファクトリの戻り値型。
type AuthMiddlewareFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<Response, AuthErrorResponse>> + Send>,
>;

/// AuthState はミドルウェアが使用する共有状態。
#[derive(Clone)]
pub struct AuthState {
    pub verifier: Arc<OidcVerifier>,
}

impl AuthState {
    pub fn new(verifier: Arc<OidcVerifier>) -> Self {
        Self { verifier }
    }
}

/// auth_middleware はベアラートークン認証ミドルウェア。
///
/// 検証に成功すると Claims と RoleSet をリクエストエクステンションに格納する。
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthErrorResponse> {
    let request_id = request_id_of(&req);

    let token = extract_bearer_token(req.headers()).map_err(|e| reject(e, request_id.clone()))?;
    let claims = state
        .verifier
        .verify_token(&token)
        .await
        .map_err(|e| reject(e, request_id))?;
    let roles = state.verifier.roles(&claims);

    req.extensions_mut().insert(claims);
    req.extensions_mut().insert(roles);

    Ok(next.run(req).await)
}

/// require_roles は指定ロールをすべて必須とするミドルウェアファクトリ。
/// auth_middleware の後に使用すること。
pub fn require_roles<I, S>(
    required: I,
) -> impl Fn(Request<Body>, Next) -> AuthMiddlewareFuture + Clone
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let required = Arc::new(RequiredRoles::new(required));
    move |req: Request<Body>, next: Next| {
        let required = Arc::clone(&required);
        Box::pin(async move {
            let request_id = request_id_of(&req);
            let Some(roles) = req.extensions().get::<RoleSet>() else {
                return Err(reject(AuthError::MissingToken, request_id));
            };

            if let Decision::Deny { missing } = rbac::authorize(roles, &required) {
                let principal = req
                    .extensions()
                    .get::<Claims>()
                    .map_or("unknown", Claims::principal)
                    .to_string();
                let err = AuthError::InsufficientRole { missing };
                warn!(
                    request_id = %request_id.as_deref().unwrap_or("-"),
                    principal = %principal,
                    required = ?required.as_slice(),
                    kind = err.kind(),
                    error = %err,
                    "request rejected: insufficient role"
                );
                return Err(AuthErrorResponse::from_auth_error(&err, request_id));
            }

            Ok(next.run(req).await)
        })
    }
}

/// Authorization ヘッダーから Bearer トークンを取り出す。
///
/// スキーム名は大文字小文字を区別しない。
pub fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AuthError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(AuthError::MissingToken);
    };
    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedHeader)?
        .trim();
    if value.is_empty() {
        return Err(AuthError::MissingToken);
    }

    let (scheme, token) = value
        .split_once(char::is_whitespace)
        .ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthError::MalformedHeader);
    }
    Ok(token.to_string())
}

fn request_id_of(req: &Request<Body>) -> Option<String> {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_string())
        .or_else(|| {
            req.headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
}

/// エラーの詳細をログに残し、詳細を含まないレスポンスに変換する。
fn reject(err: AuthError, request_id: Option<String>) -> AuthErrorResponse {
    let request_id_field = request_id.as_deref().unwrap_or("-");
    if err.is_upstream() {
        warn!(
            request_id = %request_id_field,
            kind = err.kind(),
            error = %err,
            "authentication failed: identity provider unavailable"
        );
    } else {
        info!(
            request_id = %request_id_field,
            kind = err.kind(),
            error = %err,
            "request rejected"
        );
    }
    AuthErrorResponse::from_auth_error(&err, request_id)
}

/// AuthErrorResponse は認証・認可エラーの HTTP レスポンス。
///
/// 401 と 403 の 2 種類だけを返し、失敗理由の詳細は含めない。
#[derive(Debug)]
pub struct AuthErrorResponse {
    pub status: StatusCode,
    pub error: &'static str,
    pub message: &'static str,
    pub request_id: Option<String>,
}

impl AuthErrorResponse {
    pub fn from_auth_error(err: &AuthError, request_id: Option<String>) -> Self {
        match (err.status(), err) {
            (AuthStatus::Forbidden, _) => Self {
                status: StatusCode::FORBIDDEN,
                error: "forbidden",
                message: "Insufficient permissions",
                request_id,
            },
            (AuthStatus::Unauthenticated, AuthError::MissingToken | AuthError::MalformedHeader) => {
                Self {
                    status: StatusCode::UNAUTHORIZED,
                    error: "unauthorized",
                    message: "Missing bearer token",
                    request_id,
                }
            }
            (AuthStatus::Unauthenticated, _) => Self {
                status: StatusCode::UNAUTHORIZED,
                error: "unauthorized",
                message: "Invalid token",
                request_id,
            },
        }
    }
}

impl IntoResponse for AuthErrorResponse {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.error,
            "message": self.message,
            "requestId": self.request_id,
        });

        let mut response = (self.status, Json(body)).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}
