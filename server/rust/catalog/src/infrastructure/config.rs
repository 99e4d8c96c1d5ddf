use asrp_auth::AuthConfig;
use asrp_telemetry::LogConfig;
use serde::Deserialize;

/// Application configuration for catalog server.
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

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "auth.rbac_client_id ({client_id}) must equal auth.expected_audience ({audience:?})"
    )]
    ClientAudienceMismatch {
        client_id: String,
        audience: Option<String>,
    },
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// YAML 文字列から設定を読み込み、認証設定を検証する。
    ///
    /// catalog はトークンの audience と同じクライアントのロールを参照するため、
    /// rbac_client_id と expected_audience は一致していなければならない。
    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(content)?;
        cfg.auth.validate()?;
        if cfg.auth.expected_audience.as_deref() != Some(cfg.auth.rbac_client_id.as_str()) {
            return Err(ConfigError::ClientAudienceMismatch {
                client_id: cfg.auth.rbac_client_id.clone(),
                audience: cfg.auth.expected_audience.clone(),
            }
            .into());
        }
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
    "catalog-api".to_string()
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
    8002
}

/// RbacConfig は参照系・更新系エンドポイントの必須ロールを表す。
#[derive(Debug, Clone, Deserialize)]
pub struct RbacConfig {
    #[serde(default = "default_read")]
    pub read: Vec<String>,
    #[serde(default = "default_write")]
    pub write: Vec<String>,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            read: default_read(),
            write: default_write(),
        }
    }
}

fn default_read() -> Vec<String> {
    vec!["catalog_read".to_string()]
}

fn default_write() -> Vec<String> {
    vec!["catalog_write".to_string()]
}
