//! OIDC エンドポイント（discovery / JWKS）からの JSON 取得。

use std::time::Duration;

use reqwest::header::ACCEPT;
use serde_json::Value;

/// FetchError は上流からの取得失敗を表す。
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("unexpected status {0}")]
    Status(u16),

    #[error("invalid JSON body: {0}")]
    Decode(String),
}

/// OidcFetcher は OIDC エンドポイントへの HTTP GET を抽象化するトレイト。
///
/// テストではカウンタ付きのモック実装に差し替える。
#[async_trait::async_trait]
pub trait OidcFetcher: Send + Sync {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// HttpOidcFetcher はタイムアウト付きの reqwest クライアントで取得するデフォルト実装。
#[derive(Debug, Clone)]
pub struct HttpOidcFetcher {
    client: reqwest::Client,
}

impl HttpOidcFetcher {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl OidcFetcher for HttpOidcFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}
