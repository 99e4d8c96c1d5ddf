//! JWKS（署名鍵セット）の解釈とキャッシュ。

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::{CacheKind, RefreshingCache, Snapshot};
use crate::discovery::DiscoveryCache;
use crate::error::AuthError;
use crate::fetcher::OidcFetcher;

/// SigningKey は kid で識別される検証用公開鍵。
#[derive(Clone)]
pub struct SigningKey {
    kid: String,
    algorithm: Option<Algorithm>,
    key: DecodingKey,
}

impl SigningKey {
    pub fn new(kid: impl Into<String>, algorithm: Option<Algorithm>, key: DecodingKey) -> Self {
        Self {
            kid: kid.into(),
            algorithm,
            key,
        }
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    /// JWK の `alg` で宣言されたアルゴリズム。宣言がなければ None。
    pub fn algorithm(&self) -> Option<Algorithm> {
        self.algorithm
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.key
    }

    /// JWKS の 1 エントリを鍵に変換する。暗号化用（use=enc）の鍵は `Ok(None)`。
    fn from_jwk_value(entry: &Value) -> Result<Option<Self>, String> {
        let kid = entry
            .get("kid")
            .and_then(Value::as_str)
            .filter(|kid| !kid.is_empty())
            .ok_or_else(|| "entry has no kid".to_string())?;

        if entry.get("use").and_then(Value::as_str) == Some("enc") {
            return Ok(None);
        }

        let algorithm = match entry.get("alg").and_then(Value::as_str) {
            Some(alg) => Some(
                Algorithm::from_str(alg)
                    .map_err(|_| format!("kid {kid}: unsupported alg {alg:?}"))?,
            ),
            None => None,
        };

        let jwk: Jwk = serde_json::from_value(entry.clone())
            .map_err(|e| format!("kid {kid}: invalid JWK: {e}"))?;
        let key = DecodingKey::from_jwk(&jwk)
            .map_err(|e| format!("kid {kid}: unusable key material: {e}"))?;

        Ok(Some(Self::new(kid, algorithm, key)))
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// KeySet は kid をキーとした署名鍵の集合。
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<SigningKey>,
    by_kid: HashMap<String, usize>,
}

impl KeySet {
    /// JWKS レスポンスの JSON を解釈する。
    ///
    /// 使えないエントリは警告を出して読み飛ばす。同じ kid が複数ある場合は先頭を採用する。
    pub fn from_json(body: &Value) -> Result<Self, AuthError> {
        let entries = body
            .get("keys")
            .and_then(Value::as_array)
            .ok_or_else(|| AuthError::JwksUnavailable("JWKS has no keys array".to_string()))?;

        let mut set = Self::default();
        for entry in entries {
            match SigningKey::from_jwk_value(entry) {
                Ok(Some(key)) => set.insert(key),
                Ok(None) => {}
                Err(reason) => warn!(reason = %reason, "skipping unusable JWKS entry"),
            }
        }
        Ok(set)
    }

    fn insert(&mut self, key: SigningKey) {
        if self.by_kid.contains_key(key.kid()) {
            warn!(kid = %key.kid(), "duplicate kid in JWKS, keeping the first entry");
            return;
        }
        self.by_kid.insert(key.kid.clone(), self.keys.len());
        self.keys.push(key);
    }

    pub fn get(&self, kid: &str) -> Option<&SigningKey> {
        self.by_kid.get(kid).map(|&idx| &self.keys[idx])
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn kids(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(SigningKey::kid)
    }
}

/// KeySetCache は discovery の jwks_uri から取得した鍵セットを TTL 付きでキャッシュする。
#[derive(Clone)]
pub struct KeySetCache {
    discovery: DiscoveryCache,
    fetcher: Arc<dyn OidcFetcher>,
    cache: RefreshingCache<KeySet>,
}

impl KeySetCache {
    pub fn new(discovery: DiscoveryCache, ttl: Duration, fetcher: Arc<dyn OidcFetcher>) -> Self {
        Self {
            discovery,
            fetcher,
            cache: RefreshingCache::new(CacheKind::KeySet, ttl),
        }
    }

    /// TTL 内であればキャッシュを返し、そうでなければ取得し直す。
    pub async fn get_keys(&self) -> Result<Snapshot<KeySet>, AuthError> {
        self.cache.get(self.fetch_fn()).await
    }

    /// TTL を無視して鍵セットを取得し直す（鍵ローテーション対応）。
    ///
    /// `observed` には呼び出し元が参照したスナップショットの世代を渡す。
    /// 同時に複数の強制更新が要求されても取得は 1 回にまとめられる。
    pub async fn refresh_keys(&self, observed: Option<u64>) -> Result<Snapshot<KeySet>, AuthError> {
        self.cache.force_refresh(observed, self.fetch_fn()).await
    }

    pub async fn cached(&self) -> Option<Snapshot<KeySet>> {
        self.cache.current().await
    }

    fn fetch_fn(
        &self,
    ) -> impl FnOnce() -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<KeySet, AuthError>> + Send>,
    > {
        let discovery = self.discovery.clone();
        let fetcher = Arc::clone(&self.fetcher);
        move || {
            Box::pin(async move {
                let doc = discovery.get_discovery().await?;
                let body = fetcher.fetch_json(&doc.jwks_uri).await.map_err(|e| {
                    AuthError::JwksUnavailable(format!("GET {}: {e}", doc.jwks_uri))
                })?;
                let keys = KeySet::from_json(&body)?;
                info!(
                    jwks_uri = %doc.jwks_uri,
                    key_count = keys.len(),
                    kids = ?keys.kids().collect::<Vec<_>>(),
                    "fetched JWKS"
                );
                Ok(keys)
            })
        }
    }
}
