//! wiremock ベースのモック OIDC プロバイダー（Keycloak のパス構成）。

use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// MockOidcProvider は discovery と JWKS エンドポイントを提供する HTTP モック。
///
/// `expect` を指定したエンドポイントは、サーバーのドロップ時に呼び出し回数が検証される。
pub struct MockOidcProvider {
    server: MockServer,
    realm: String,
}

impl MockOidcProvider {
    pub async fn start(realm: &str) -> Self {
        Self {
            server: MockServer::start().await,
            realm: realm.to_string(),
        }
    }

    pub fn server(&self) -> &MockServer {
        &self.server
    }

    /// レルムのベース URL。issuer と同じ値になる。
    pub fn issuer(&self) -> String {
        format!("{}/realms/{}", self.server.uri(), self.realm)
    }

    pub fn discovery_path(&self) -> String {
        format!("/realms/{}/.well-known/openid-configuration", self.realm)
    }

    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.server.uri(), self.discovery_path())
    }

    pub fn jwks_path(&self) -> String {
        format!("/realms/{}/protocol/openid-connect/certs", self.realm)
    }

    pub fn jwks_url(&self) -> String {
        format!("{}{}", self.server.uri(), self.jwks_path())
    }

    /// Keycloak 形式の discovery ドキュメント。
    pub fn discovery_document(&self) -> Value {
        let issuer = self.issuer();
        json!({
            "issuer": issuer,
            "authorization_endpoint": format!("{issuer}/protocol/openid-connect/auth"),
            "token_endpoint": format!("{issuer}/protocol/openid-connect/token"),
            "jwks_uri": self.jwks_url(),
            "id_token_signing_alg_values_supported": ["RS256"],
        })
    }

    /// discovery エンドポイントを登録する。`expected_calls` が Some なら回数を検証する。
    pub async fn mount_discovery(&self, expected_calls: Option<u64>) {
        let mut mock = Mock::given(method("GET"))
            .and(path(self.discovery_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.discovery_document()));
        if let Some(n) = expected_calls {
            mock = mock.expect(n);
        }
        mock.mount(&self.server).await;
    }

    /// JWKS エンドポイントを登録する。
    pub async fn mount_jwks(&self, jwks: Value, expected_calls: Option<u64>) {
        let mut mock = Mock::given(method("GET"))
            .and(path(self.jwks_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks));
        if let Some(n) = expected_calls {
            mock = mock.expect(n);
        }
        mock.mount(&self.server).await;
    }

    /// 最初の `times` 回だけ応答する JWKS を登録する。
    ///
    /// 後から `mount_jwks` した応答より優先されるため、鍵ローテーションの再現に使う。
    pub async fn mount_jwks_for(&self, jwks: Value, times: u64) {
        Mock::given(method("GET"))
            .and(path(self.jwks_path()))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .up_to_n_times(times)
            .with_priority(1)
            .expect(times)
            .mount(&self.server)
            .await;
    }

    /// 指定パスがステータス `status` を返すように登録する。
    pub async fn mount_failure(&self, endpoint_path: &str, status: u16) {
        Mock::given(method("GET"))
            .and(path(endpoint_path))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.server)
            .await;
    }

    /// これまでに受けたリクエストのうち、指定パスへのものの件数。
    pub async fn request_count(&self, endpoint_path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|req| req.url.path() == endpoint_path)
            .count()
    }
}
