//! テスト用 RS256 署名鍵とトークン生成。

use std::sync::OnceLock;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::rngs::OsRng;
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde_json::{json, Map, Value};

static PRIMARY: OnceLock<TestSigningKey> = OnceLock::new();
static SECONDARY: OnceLock<TestSigningKey> = OnceLock::new();
static ROGUE: OnceLock<TestSigningKey> = OnceLock::new();

/// TestSigningKey はテスト用の RSA 2048 鍵ペア。
///
/// 鍵生成は重いため、共有鍵は `primary()` などからプロセス内で 1 回だけ生成する。
pub struct TestSigningKey {
    kid: String,
    encoding: EncodingKey,
    modulus: String,
    exponent: String,
}

impl TestSigningKey {
    /// 新しい鍵ペアを生成する。
    pub fn generate(kid: &str) -> Self {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("RSA key generation");
        let public_key = private_key.to_public_key();
        let pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .expect("PKCS#1 PEM encoding");

        Self {
            kid: kid.to_string(),
            encoding: EncodingKey::from_rsa_pem(pem.as_bytes()).expect("RSA encoding key"),
            modulus: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            exponent: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        }
    }

    /// kid `k1` の共有鍵。
    pub fn primary() -> &'static Self {
        PRIMARY.get_or_init(|| Self::generate("k1"))
    }

    /// kid `k2` の共有鍵（ローテーション後の鍵として使う）。
    pub fn secondary() -> &'static Self {
        SECONDARY.get_or_init(|| Self::generate("k2"))
    }

    /// `primary()` と同じ kid `k1` を名乗る別の鍵（偽造トークン用）。
    pub fn rogue() -> &'static Self {
        ROGUE.get_or_init(|| Self::generate("k1"))
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// 公開鍵の modulus（base64url）。
    pub fn modulus(&self) -> &str {
        &self.modulus
    }

    /// 公開鍵の JWK 表現。
    pub fn jwk(&self) -> Value {
        json!({
            "kid": self.kid,
            "kty": "RSA",
            "alg": "RS256",
            "use": "sig",
            "n": self.modulus,
            "e": self.exponent,
        })
    }

    /// kid 付き RS256 ヘッダー。
    pub fn header(&self) -> Header {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());
        header
    }

    /// claims に署名したトークンを返す。
    pub fn sign(&self, claims: &Value) -> String {
        self.sign_with_header(&self.header(), claims)
    }

    pub fn sign_with_header(&self, header: &Header, claims: &Value) -> String {
        encode(header, claims, &self.encoding).expect("JWT signing")
    }
}

/// 鍵一覧から JWKS レスポンスを組み立てる。
pub fn jwks(keys: &[&TestSigningKey]) -> Value {
    json!({ "keys": keys.iter().map(|k| k.jwk()).collect::<Vec<_>>() })
}

/// TestClaims は Keycloak 形式のアクセストークン claims のビルダー。
///
/// 既定では発行時刻が現在、有効期限が 5 分後になる。
#[derive(Debug, Clone)]
pub struct TestClaims {
    claims: Map<String, Value>,
}

impl TestClaims {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        let mut claims = Map::new();
        claims.insert("iss".into(), Value::String(issuer.into()));
        claims.insert("aud".into(), Value::String(audience.into()));
        claims.insert("sub".into(), json!("3f2a6f0e-0000-4000-8000-000000000001"));
        claims.insert("preferred_username".into(), json!("alice"));
        claims.insert("typ".into(), json!("Bearer"));
        Self { claims }.issued_at(Utc::now().timestamp())
    }

    /// 発行時刻を設定し、有効期限をその 5 分後にする。
    #[must_use]
    pub fn issued_at(mut self, iat: i64) -> Self {
        self.claims.insert("iat".into(), json!(iat));
        self.claims.insert("exp".into(), json!(iat + 300));
        self
    }

    /// 有効期限を発行時刻からの相対秒で設定する。負の値なら期限切れ。
    #[must_use]
    pub fn expires_in(mut self, seconds: i64) -> Self {
        let iat = self
            .claims
            .get("iat")
            .and_then(Value::as_i64)
            .unwrap_or_else(|| Utc::now().timestamp());
        self.claims.insert("exp".into(), json!(iat + seconds));
        self
    }

    /// `resource_access.<client_id>.roles` を設定する。
    #[must_use]
    pub fn with_client_roles(mut self, client_id: &str, roles: &[&str]) -> Self {
        let access = self
            .claims
            .entry("resource_access")
            .or_insert_with(|| json!({}));
        if let Value::Object(map) = access {
            map.insert(client_id.to_string(), json!({ "roles": roles }));
        }
        self
    }

    /// `realm_access.roles` を設定する。
    #[must_use]
    pub fn with_realm_roles(self, roles: &[&str]) -> Self {
        self.set("realm_access", json!({ "roles": roles }))
    }

    /// 任意の claim を設定する（不正な値のテスト用）。
    #[must_use]
    pub fn set(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn without(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    pub fn build(&self) -> Value {
        Value::Object(self.claims.clone())
    }
}
