use asrp_auth::AuthConfig;
use asrp_telemetry::LogConfig;
use serde::Deserialize;

/// Application configuration for orders server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub app: AppConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub rbac: RbacConfig,
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// YAML 文字列から設定を読み込み、認証設定を検証する。
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(content)?;
        cfg.auth.validate()?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default = "default_environment", alias = "env")]
    pub environment: String,
}

fn default_name() -> String {
    "orders-api".to_string()
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_environment() -> String {
    "dev".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8001
}

/// RbacConfig はエンドポイントごとの必須ロールを表す。
#[derive(Debug, Clone, Deserialize)]
pub struct RbacConfig {
    #[serde(default = "default_list_orders")]
    pub list_orders: Vec<String>,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            list_orders: default_list_orders(),
        }
    }
}

fn default_list_orders() -> Vec<String> {
    vec!["orders_read".to_string()]
}
