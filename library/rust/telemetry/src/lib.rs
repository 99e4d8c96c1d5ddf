//! asrp-telemetry: asrp サービス共通のログ初期化。

pub mod logger;

pub use logger::{init_logger, LogConfig, LoggerError};
