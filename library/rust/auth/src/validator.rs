//! 署名と標準 claim（iss / aud / exp / nbf）の検証。

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, Validation};

use crate::claims::Claims;
use crate::error::{AuthError, InvalidClaim};
use crate::jwks::SigningKey;

/// ValidationPolicy はトークン検証の条件。
#[derive(Debug, Clone)]
pub struct ValidationPolicy {
    pub expected_issuer: String,
    /// None の場合は audience を検証しない
    pub expected_audience: Option<String>,
    pub algorithms: Vec<Algorithm>,
    pub leeway_seconds: u64,
}

/// 現在時刻でトークンを検証し、claims を返す。
pub fn validate(
    token: &str,
    key: &SigningKey,
    policy: &ValidationPolicy,
) -> Result<Claims, AuthError> {
    validate_at(token, key, policy, chrono::Utc::now().timestamp())
}

/// `now`（Unix 秒）を基準にトークンを検証する。
///
/// 検査順は署名、issuer、audience、有効期限の順で、最初に失敗した項目を返す。
pub fn validate_at(
    token: &str,
    key: &SigningKey,
    policy: &ValidationPolicy,
    now: i64,
) -> Result<Claims, AuthError> {
    let claims = verify_signature(token, key, &policy.algorithms)?;

    check_issuer(&claims, &policy.expected_issuer)?;
    if let Some(audience) = &policy.expected_audience {
        check_audience(&claims, audience)?;
    }
    check_lifetime(&claims, now, policy.leeway_seconds)?;

    Ok(claims)
}

fn verify_signature(
    token: &str,
    key: &SigningKey,
    algorithms: &[Algorithm],
) -> Result<Claims, AuthError> {
    let header = decode_header(token)
        .map_err(|e| AuthError::MalformedToken(format!("invalid header: {e}")))?;

    if !algorithms.contains(&header.alg) {
        return Err(AuthError::SignatureInvalid(format!(
            "algorithm {:?} is not allowed",
            header.alg
        )));
    }
    if let Some(declared) = key.algorithm() {
        if declared != header.alg {
            return Err(AuthError::SignatureInvalid(format!(
                "token algorithm {:?} does not match key {} ({declared:?})",
                header.alg,
                key.kid()
            )));
        }
    }

    // 時刻と audience は jsonwebtoken に任せず後段で検査する
    let mut validation = Validation::new(header.alg);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation.leeway = 0;

    decode::<Claims>(token, key.decoding_key(), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_) => AuthError::MalformedToken(e.to_string()),
            _ => AuthError::SignatureInvalid(e.to_string()),
        })
}

fn check_issuer(claims: &Claims, expected: &str) -> Result<(), AuthError> {
    let expected = expected.trim_end_matches('/');
    match claims.iss.as_deref() {
        Some(iss) if iss.trim_end_matches('/') == expected => Ok(()),
        Some(iss) => Err(AuthError::claim(
            InvalidClaim::Issuer,
            format!("iss {iss:?} does not match {expected:?}"),
        )),
        None => Err(AuthError::claim(InvalidClaim::Issuer, "iss is missing")),
    }
}

fn check_audience(claims: &Claims, expected: &str) -> Result<(), AuthError> {
    if claims.aud.contains(expected) {
        Ok(())
    } else {
        Err(AuthError::claim(
            InvalidClaim::Audience,
            format!("aud {:?} does not contain {expected:?}", claims.aud.0),
        ))
    }
}

fn check_lifetime(claims: &Claims, now: i64, leeway_seconds: u64) -> Result<(), AuthError> {
    let leeway = i64::try_from(leeway_seconds).unwrap_or(i64::MAX);

    let exp = claims
        .exp
        .ok_or_else(|| AuthError::claim(InvalidClaim::Expired, "exp is missing"))?;
    if exp < now.saturating_sub(leeway) {
        return Err(AuthError::claim(
            InvalidClaim::Expired,
            format!("exp {exp} is before now {now} (leeway {leeway}s)"),
        ));
    }

    if let Some(nbf) = claims.nbf {
        if nbf > now.saturating_add(leeway) {
            return Err(AuthError::claim(
                InvalidClaim::NotYetValid,
                format!("nbf {nbf} is after now {now} (leeway {leeway}s)"),
            ));
        }
    }
    Ok(())
}
