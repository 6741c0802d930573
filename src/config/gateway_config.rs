use crate::utils::error::{DonlyError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_secret, validate_url, Validate,
};
use alloy_primitives::Address;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

static ENV_VAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub blockchain: BlockchainConfig,
    pub telegram: TelegramConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub static_files: StaticFilesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    /// mini app 前端所在目錄，作為 fallback 路由
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "./data/donly.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Local,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub local_path: String,
    pub s3: Option<S3Config>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Local,
            local_path: "./data/static".to_string(),
            s3: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// MinIO 等 S3 相容服務的端點
    pub endpoint: Option<String>,
    #[serde(default = "default_s3_region")]
    pub region: String,
    pub bucket: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

fn default_s3_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockchainConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    pub contract_address: Option<String>,
    pub poll_interval_secs: u64,
    pub max_block_range: u64,
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            chain_id: 80002,
            contract_address: None,
            poll_interval_secs: 10,
            max_block_range: 50_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,
    #[serde(default = "default_init_data_max_age")]
    pub init_data_max_age_secs: i64,
}

fn default_init_data_max_age() -> i64 {
    86_400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
}

fn default_session_ttl() -> u64 {
    30 * 24 * 60 * 60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// 圖片網址前綴：`<base_url>/static/<id>`
    pub base_url: String,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
        }
    }
}

impl GatewayConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置，先替換 ${VAR}
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = substitute_env_vars(content);
        toml::from_str(&processed).map_err(|e| DonlyError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 沒有設定檔時，從環境變數建立
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| DonlyError::MissingConfigError {
                    field: key.to_string(),
                })
        };

        let mut config = Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            storage: StorageConfig::default(),
            blockchain: BlockchainConfig::default(),
            telegram: TelegramConfig {
                bot_token: required("TELEGRAM_BOT_TOKEN")?,
                init_data_max_age_secs: default_init_data_max_age(),
            },
            auth: AuthConfig {
                jwt_secret: required("JWT_SECRET")?,
                session_ttl_secs: default_session_ttl(),
            },
            static_files: StaticFilesConfig::default(),
        };

        if let Some(v) = lookup("DONLY_HOST") {
            config.server.host = v;
        }
        if let Some(v) = lookup("DONLY_PORT") {
            config.server.port = parse_value("DONLY_PORT", &v)?;
        }
        if let Some(v) = lookup("DONLY_ALLOWED_ORIGINS") {
            config.server.allowed_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        config.server.static_dir = lookup("DONLY_STATIC_DIR");
        if let Some(v) = lookup("DONLY_DATABASE_PATH") {
            config.database.path = v;
        }
        if let Some(v) = lookup("DONLY_STORAGE_PATH") {
            config.storage.local_path = v;
        }
        if let Some(v) = lookup("POLYGON_RPC_URL") {
            config.blockchain.rpc_url = v;
        }
        if let Some(v) = lookup("POLYGON_CHAIN_ID") {
            config.blockchain.chain_id = parse_value("POLYGON_CHAIN_ID", &v)?;
        }
        config.blockchain.contract_address =
            lookup("POLYGON_CONTRACT_ADDRESS").filter(|v| !v.is_empty());
        if let Some(v) = lookup("STATIC_BASE_URL") {
            config.static_files.base_url = v;
        }
        if let Some(v) = lookup("SESSION_TTL_SECS") {
            config.auth.session_ttl_secs = parse_value("SESSION_TTL_SECS", &v)?;
        }

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.blockchain.poll_interval_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 未設定合約地址時回傳 None（停用鏈上監控）
    pub fn contract_address(&self) -> Result<Option<Address>> {
        match self.blockchain.contract_address.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => Address::from_str(raw).map(Some).map_err(|e| {
                DonlyError::InvalidConfigValueError {
                    field: "blockchain.contract_address".to_string(),
                    value: raw.to_string(),
                    reason: e.to_string(),
                }
            }),
        }
    }
}

/// 替換環境變數 (例如 ${JWT_SECRET})；未設定的保留原樣
fn substitute_env_vars(content: &str) -> String {
    ENV_VAR
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
}

fn parse_value<T: FromStr>(field: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| DonlyError::InvalidConfigValueError {
            field: field.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

/// 密鑰必須有值，且不能是沒被替換的 ${VAR}
fn validate_resolved_secret(field: &str, value: &str) -> Result<()> {
    validate_secret(field, value)?;
    if ENV_VAR.is_match(value) {
        return Err(DonlyError::MissingConfigError {
            field: field.to_string(),
        });
    }
    Ok(())
}

impl Validate for GatewayConfig {
    fn validate(&self) -> Result<()> {
        validate_range("server.port", self.server.port, 1, u16::MAX)?;
        if self.server.allowed_origins.is_empty() {
            return Err(DonlyError::InvalidConfigValueError {
                field: "server.allowed_origins".to_string(),
                value: "[]".to_string(),
                reason: "At least one origin is required".to_string(),
            });
        }
        if let Some(dir) = &self.server.static_dir {
            validate_path("server.static_dir", dir)?;
        }

        validate_path("database.path", &self.database.path)?;

        match self.storage.backend {
            StorageBackend::Local => validate_path("storage.local_path", &self.storage.local_path)?,
            StorageBackend::S3 => {
                let s3 = self
                    .storage
                    .s3
                    .as_ref()
                    .ok_or_else(|| DonlyError::MissingConfigError {
                        field: "storage.s3".to_string(),
                    })?;
                validate_non_empty_string("storage.s3.bucket", &s3.bucket)?;
                if let Some(endpoint) = &s3.endpoint {
                    validate_url("storage.s3.endpoint", endpoint)?;
                }
            }
        }

        validate_url("blockchain.rpc_url", &self.blockchain.rpc_url)?;
        validate_positive_number("blockchain.chain_id", self.blockchain.chain_id, 1)?;
        validate_positive_number(
            "blockchain.poll_interval_secs",
            self.blockchain.poll_interval_secs,
            1,
        )?;
        validate_positive_number(
            "blockchain.max_block_range",
            self.blockchain.max_block_range,
            1,
        )?;
        self.contract_address()?;

        validate_resolved_secret("telegram.bot_token", &self.telegram.bot_token)?;
        validate_range(
            "telegram.init_data_max_age_secs",
            self.telegram.init_data_max_age_secs,
            1,
            i64::MAX,
        )?;
        validate_resolved_secret("auth.jwt_secret", &self.auth.jwt_secret)?;
        validate_positive_number("auth.session_ttl_secs", self.auth.session_ttl_secs, 60)?;

        validate_url("static_files.base_url", &self.static_files.base_url)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"
[telegram]
bot_token = "123:abc"

[auth]
jwt_secret = "secret"
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = GatewayConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.blockchain.chain_id, 80002);
        assert_eq!(config.blockchain.max_block_range, 50_000);
        assert_eq!(config.auth.session_ttl_secs, 30 * 24 * 3600);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert!(config.contract_address().unwrap().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("DONLY_TEST_JWT_SECRET", "from-env");
        let content = r#"
[telegram]
bot_token = "${DONLY_TEST_UNSET_TOKEN}"

[auth]
jwt_secret = "${DONLY_TEST_JWT_SECRET}"
"#;
        let config = GatewayConfig::from_toml_str(content).unwrap();
        assert_eq!(config.auth.jwt_secret, "from-env");
        // 沒被替換的密鑰視為缺少
        let err = config.validate().unwrap_err();
        assert!(matches!(err, DonlyError::MissingConfigError { field } if field == "telegram.bot_token"));
        std::env::remove_var("DONLY_TEST_JWT_SECRET");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let content = format!(
            "{}\n[blockchain]\nrpc_url = \"not-a-url\"\n",
            MINIMAL
        );
        let config = GatewayConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());

        let content = format!(
            "{}\n[blockchain]\ncontract_address = \"0x1234\"\n",
            MINIMAL
        );
        let config = GatewayConfig::from_toml_str(&content).unwrap();
        assert!(config.contract_address().is_err());

        let content = format!("{}\n[storage]\nbackend = \"s3\"\n", MINIMAL);
        let config = GatewayConfig::from_toml_str(&content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("TELEGRAM_BOT_TOKEN", "1:x"),
            ("JWT_SECRET", "s"),
            ("DONLY_PORT", "9000"),
            ("DONLY_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
            ("POLYGON_CONTRACT_ADDRESS", "0x52908400098527886E0F7030069857D2E4169EE7"),
        ]
        .into_iter()
        .collect();
        let config = GatewayConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.allowed_origins.len(), 2);
        assert!(config.contract_address().unwrap().is_some());
        assert!(config.validate().is_ok());

        let missing = GatewayConfig::from_lookup(|_| None).unwrap_err();
        assert!(matches!(missing, DonlyError::MissingConfigError { .. }));

        let bad_port = GatewayConfig::from_lookup(|k| match k {
            "DONLY_PORT" => Some("eighty".to_string()),
            _ => vars.get(k).map(|v| v.to_string()),
        });
        assert!(matches!(bad_port, Err(DonlyError::InvalidConfigValueError { .. })));
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = GatewayConfig::from_file(file.path()).unwrap();
        assert_eq!(config.telegram.bot_token, "123:abc");
    }
}
