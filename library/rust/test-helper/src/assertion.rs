use serde_json::Value;

/// テスト用アサーションヘルパー。
pub struct AssertionHelper;

impl AssertionHelper {
    /// JSON 部分一致アサーション。
    ///
    /// `actual` が `expected` の全キー・値を含んでいることを検証する。
    /// `actual` に余分なキーがあっても失敗しない。
    pub fn assert_json_contains(actual: &Value, expected: &Value) {
        assert!(
            json_contains(actual, expected),
            "JSON partial match failed.\nActual: {actual}\nExpected: {expected}"
        );
    }

    /// 認証・認可エラーのレスポンスボディを検証する。
    ///
    /// ボディは `error` / `message` / `requestId` の 3 キーだけで構成され、
    /// 失敗理由の詳細を含まないこと。
    pub fn assert_auth_error(body: &Value, error: &str, message: &str) {
        let Some(object) = body.as_object() else {
            panic!("auth error body is not an object: {body}");
        };
        let mut keys: Vec<&str> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            vec!["error", "message", "requestId"],
            "unexpected keys in auth error body: {body}"
        );
        assert_eq!(body["error"], error, "error code mismatch: {body}");
        assert_eq!(body["message"], message, "message mismatch: {body}");
    }
}

fn json_contains(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(a), Value::Object(e)) => e
            .iter()
            .all(|(k, v)| a.get(k).is_some_and(|av| json_contains(av, v))),
        (Value::Array(a), Value::Array(e)) => {
            e.iter().all(|ev| a.iter().any(|av| json_contains(av, ev)))
        }
        _ => actual == expected,
    }
}
