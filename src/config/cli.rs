use crate::core::deploy::{DeployConfig, DEFAULT_GAS_MARGIN, DEFAULT_GAS_PRICE_WEI};
use crate::utils::error::Result;
use crate::utils::validation::{validate_path, validate_positive_number, validate_url, Validate};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "donly-gateway")]
#[command(about = "Donly gateway: streamer profiles, wishlists and donation events")]
pub struct GatewayArgs {
    /// TOML 設定檔；未指定時從環境變數讀取
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub json_logs: bool,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "deploy-contract")]
#[command(about = "Deploy the compiled donation contract through an unlocked node account")]
pub struct DeployArgs {
    #[arg(long, default_value = "http://geth-dev:8545")]
    pub rpc_url: String,

    #[arg(long, default_value = "/output")]
    pub artifacts_dir: PathBuf,

    #[arg(long = "contract", default_value = "DonationContract")]
    pub contract_name: String,

    /// 預設為 <artifacts_dir>/deployment.json
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_GAS_PRICE_WEI, help = "Gas price in wei")]
    pub gas_price: u64,

    #[arg(long, default_value_t = DEFAULT_GAS_MARGIN, help = "Gas added on top of the estimate")]
    pub gas_margin: u64,

    #[arg(long, default_value_t = 120, help = "Seconds to wait for the receipt")]
    pub receipt_timeout: u64,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl DeployArgs {
    pub fn to_deploy_config(&self) -> DeployConfig {
        DeployConfig {
            artifacts_dir: self.artifacts_dir.clone(),
            contract_name: self.contract_name.clone(),
            output_path: self
                .output
                .clone()
                .unwrap_or_else(|| self.artifacts_dir.join("deployment.json")),
            gas_price_wei: self.gas_price,
            gas_margin: self.gas_margin,
            receipt_timeout: Duration::from_secs(self.receipt_timeout),
            ..DeployConfig::default()
        }
    }
}

impl Validate for DeployArgs {
    fn validate(&self) -> Result<()> {
        validate_url("rpc_url", &self.rpc_url)?;
        validate_path("artifacts_dir", &self.artifacts_dir.to_string_lossy())?;
        validate_positive_number("gas_price", self.gas_price, 1)?;
        validate_positive_number("receipt_timeout", self.receipt_timeout, 1)?;
        Ok(())
    }
}
