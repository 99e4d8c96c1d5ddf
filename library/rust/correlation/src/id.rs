use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// リクエスト ID のヘッダー名。
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// 受け入れる外部リクエスト ID の最大長。
const MAX_LEN: usize = 128;

/// RequestId は 1 つの HTTP リクエストを識別する ID を表す。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    /// 新しい RequestId を UUID v4 で生成する。
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// 呼び出し元が送ってきた値を検証して RequestId にする。
    ///
    /// 空、長すぎる、またはヘッダー値として安全でない文字を含む場合は None。
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let valid = !value.is_empty()
            && value.len() <= MAX_LEN
            && value.bytes().all(|b| b.is_ascii_graphic());
        valid.then(|| Self(value.to_string()))
    }

    /// 受信値が使えればそれを、使えなければ新しい ID を返す。
    pub fn from_incoming(value: Option<&str>) -> Self {
        value.and_then(Self::parse).unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
