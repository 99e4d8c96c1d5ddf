//! トークンヘッダーの kid から検証鍵を選ぶ。

use jsonwebtoken::decode_header;
use tracing::debug;

use crate::error::AuthError;
use crate::jwks::{KeySetCache, SigningKey};

/// KeySelector はキャッシュ済み JWKS から署名鍵を選択する。
///
/// kid が見つからない場合は鍵ローテーションとみなし、1 回だけ強制再取得して再検索する。
#[derive(Clone)]
pub struct KeySelector {
    keys: KeySetCache,
}

impl KeySelector {
    pub fn new(keys: KeySetCache) -> Self {
        Self { keys }
    }

    pub fn key_set(&self) -> &KeySetCache {
        &self.keys
    }

    pub async fn select_key(&self, token: &str) -> Result<SigningKey, AuthError> {
        let kid = token_kid(token)?;

        let snapshot = self.keys.get_keys().await?;
        if let Some(key) = snapshot.get(&kid) {
            return Ok(key.clone());
        }

        debug!(kid = %kid, "kid not in cached JWKS, forcing refresh");
        let refreshed = self.keys.refresh_keys(Some(snapshot.generation())).await?;
        refreshed
            .get(&kid)
            .cloned()
            .ok_or(AuthError::UnknownSigningKey { kid })
    }
}

/// 署名を検証せずにヘッダーを読み、kid を取り出す。
pub fn token_kid(token: &str) -> Result<String, AuthError> {
    if token.split('.').count() != 3 {
        return Err(AuthError::MalformedToken(
            "token must have three dot-separated segments".to_string(),
        ));
    }
    let header = decode_header(token)
        .map_err(|e| AuthError::MalformedToken(format!("invalid header: {e}")))?;
    header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or_else(|| AuthError::MalformedToken("header has no kid".to_string()))
}
