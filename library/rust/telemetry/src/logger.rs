//! 構造化ログユーティリティ。
//! tracing クレートを使用し、JSON またはテキスト形式の構造化ログを出力する。
//!
//! # 使用例
//!
//! ```ignore
//! use tracing::{info, warn, error};
//!
//! info!(service = "asrp-orders", "Request completed");
//! warn!(kind = "jwks_unavailable", "identity provider unavailable");
//! error!(error = %e, "Failed to process request");
//! ```

use serde::Deserialize;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// LogConfig はサービスの config.yaml の `log` セクションを表す。
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// EnvFilter 形式のディレクティブ（例: "info,asrp_auth=debug"）。
    /// 未設定の場合は環境名から決める。
    #[serde(default)]
    pub level: Option<String>,
    /// "text" ならプレーンテキスト、それ以外は JSON
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "json".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: default_format(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("invalid log filter {directive:?}: {reason}")]
    InvalidFilter { directive: String, reason: String },

    #[error("global logger already initialized: {0}")]
    AlreadyInitialized(String),
}

/// 環境名に応じた既定のログレベル。
///
/// - dev: debug
/// - staging: info
/// - prod: warn
pub fn default_level_for_env(env: &str) -> &'static str {
    match env {
        "dev" => "debug",
        "staging" => "info",
        _ => "warn",
    }
}

/// 実際に使うフィルタディレクティブを決める。
/// RUST_LOG > log.level > 環境名の既定値 の順に優先する。
pub fn resolve_directive(cfg: &LogConfig, env: &str, rust_log: Option<&str>) -> String {
    rust_log
        .filter(|v| !v.trim().is_empty())
        .or(cfg.level.as_deref().filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| default_level_for_env(env))
        .to_string()
}

/// init_logger は tracing-subscriber を初期化する。
/// format が "text" の場合はプレーンテキスト出力、それ以外は JSON 出力。
pub fn init_logger(cfg: &LogConfig, env: &str) -> Result<(), LoggerError> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = resolve_directive(cfg, env, rust_log.as_deref());
    let filter = EnvFilter::try_new(&directive).map_err(|e| LoggerError::InvalidFilter {
        directive: directive.clone(),
        reason: e.to_string(),
    })?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = if cfg.format == "text" {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(fmt::format::FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(fmt::format::FmtSpan::CLOSE),
            )
            .try_init()
    };
    result.map_err(|e| LoggerError::AlreadyInitialized(e.to_string()))
}
