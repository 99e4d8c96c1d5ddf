//! OIDC discovery ドキュメントのキャッシュ。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::info;

use crate::cache::{CacheKind, RefreshingCache, Snapshot};
use crate::error::AuthError;
use crate::fetcher::OidcFetcher;

/// DiscoveryDocument は discovery ドキュメントのうち検証に必要な項目。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub jwks_uri: String,
}

impl DiscoveryDocument {
    /// discovery レスポンスの JSON を解釈する。jwks_uri は必須。
    pub fn from_json(body: &Value) -> Result<Self, AuthError> {
        let jwks_uri = body
            .get("jwks_uri")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|uri| !uri.is_empty())
            .ok_or_else(|| {
                AuthError::DiscoveryUnavailable("discovery document has no jwks_uri".to_string())
            })?;
        let issuer = body
            .get("issuer")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Ok(Self {
            issuer: issuer.to_string(),
            jwks_uri: jwks_uri.to_string(),
        })
    }
}

/// DiscoveryCache は discovery ドキュメントを TTL 付きでキャッシュする。
#[derive(Clone)]
pub struct DiscoveryCache {
    url: Arc<str>,
    fetcher: Arc<dyn OidcFetcher>,
    cache: RefreshingCache<DiscoveryDocument>,
}

impl DiscoveryCache {
    /// `url` は正規化済みの discovery URL を渡す。
    pub fn new(url: impl Into<String>, ttl: Duration, fetcher: Arc<dyn OidcFetcher>) -> Self {
        Self {
            url: Arc::from(url.into()),
            fetcher,
            cache: RefreshingCache::new(CacheKind::Discovery, ttl),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// TTL 内であればキャッシュを返し、そうでなければ取得し直す。
    pub async fn get_discovery(&self) -> Result<Snapshot<DiscoveryDocument>, AuthError> {
        let url = Arc::clone(&self.url);
        let fetcher = Arc::clone(&self.fetcher);
        self.cache
            .get(move || async move {
                info!(discovery_url = %url, "fetching OIDC discovery document");
                let body = fetcher.fetch_json(&url).await.map_err(|e| {
                    AuthError::DiscoveryUnavailable(format!("GET {url}: {e}"))
                })?;
                DiscoveryDocument::from_json(&body)
            })
            .await
    }

    /// 現在キャッシュされているエントリ（TTL 切れを含む）。
    pub async fn cached(&self) -> Option<Snapshot<DiscoveryDocument>> {
        self.cache.current().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::FetchError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const URL: &str = "http://idp/realms/r/.well-known/openid-configuration";

    /// 呼び出し回数を数え、用意したレスポンスを順に返すモック。
    struct ScriptedFetcher {
        calls: AtomicUsize,
        responses: Mutex<Vec<Result<Value, FetchError>>>,
    }

    impl ScriptedFetcher {
        fn new(responses: Vec<Result<Value, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses),
            })
        }
    }

    #[async_trait::async_trait]
    impl OidcFetcher for ScriptedFetcher {
        async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
            assert_eq!(url, URL);
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                return Err(FetchError::Status(500));
            }
            responses.remove(0)
        }
    }

    fn doc(issuer: &str) -> Value {
        json!({
            "issuer": issuer,
            "jwks_uri": "http://idp/realms/r/protocol/openid-connect/certs",
            "token_endpoint": "http://idp/realms/r/protocol/openid-connect/token",
        })
    }

    #[test]
    fn test_from_json_requires_jwks_uri() {
        let err = DiscoveryDocument::from_json(&json!({"issuer": "http://idp/realms/r"}))
            .unwrap_err();
        assert!(matches!(err, AuthError::DiscoveryUnavailable(_)));

        let err = DiscoveryDocument::from_json(&json!({"jwks_uri": "  "})).unwrap_err();
        assert!(matches!(err, AuthError::DiscoveryUnavailable(_)));
    }

    #[test]
    fn test_from_json_tolerates_missing_issuer() {
        let parsed = DiscoveryDocument::from_json(&json!({"jwks_uri": "http://idp/certs"})).unwrap();
        assert_eq!(parsed.issuer, "");
        assert_eq!(parsed.jwks_uri, "http://idp/certs");
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_discovery_caches_within_ttl() {
        let fetcher = ScriptedFetcher::new(vec![Ok(doc("http://idp/realms/r"))]);
        let cache = DiscoveryCache::new(URL, Duration::from_secs(300), fetcher.clone());

        for _ in 0..5 {
            let snapshot = cache.get_discovery().await.unwrap();
            assert_eq!(snapshot.issuer, "http://idp/realms/r");
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_discovery_refetches_after_ttl() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(doc("http://idp/realms/r")),
            Ok(doc("http://idp/realms/r2")),
        ]);
        let cache = DiscoveryCache::new(URL, Duration::from_secs(300), fetcher.clone());

        cache.get_discovery().await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;
        let snapshot = cache.get_discovery().await.unwrap();

        assert_eq!(snapshot.issuer, "http://idp/realms/r2");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_discovery_failure_after_expiry_is_fail_closed() {
        let fetcher = ScriptedFetcher::new(vec![
            Ok(doc("http://idp/realms/r")),
            Err(FetchError::Transport("connection refused".into())),
        ]);
        let cache = DiscoveryCache::new(URL, Duration::from_secs(300), fetcher.clone());

        cache.get_discovery().await.unwrap();
        tokio::time::advance(Duration::from_secs(301)).await;

        let err = cache.get_discovery().await.unwrap_err();
        assert!(matches!(err, AuthError::DiscoveryUnavailable(_)));
        assert!(cache.cached().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_get_discovery_fetches_once() {
        let fetcher = ScriptedFetcher::new(vec![Ok(doc("http://idp/realms/r"))]);
        let cache = DiscoveryCache::new(URL, Duration::from_secs(300), fetcher.clone());

        let mut handles = Vec::new();
        for _ in 0..20 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.get_discovery().await }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }
}
