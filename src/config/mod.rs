pub mod cli;
pub mod gateway_config;

pub use cli::{DeployArgs, GatewayArgs};
pub use gateway_config::{
    AuthConfig, BlockchainConfig, DatabaseConfig, GatewayConfig, S3Config, ServerConfig,
    StaticFilesConfig, StorageBackend, StorageConfig, TelegramConfig,
};
