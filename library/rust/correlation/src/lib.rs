//! asrp-correlation: リクエスト ID の生成・伝播ライブラリ。
//!
//! 受信したリクエストに ID を割り当て、ログ・エラーレスポンス・レスポンスヘッダーで
//! 同じ ID を参照できるようにする。

pub mod id;
#[cfg(any(feature = "tower-layer", test))]
pub mod layer;

pub use id::{RequestId, REQUEST_ID_HEADER};
#[cfg(any(feature = "tower-layer", test))]
pub use layer::{RequestIdLayer, RequestIdService};
