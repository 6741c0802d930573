use crate::domain::chain::{TransactionReceipt, TransactionRequest};
use crate::domain::ports::ChainClient;
use crate::utils::error::{DonlyError, Result};
use alloy_primitives::{Address, Bytes, B256, U256, U64};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

pub const DEFAULT_GAS_PRICE_WEI: u64 = 20_000_000_000;
pub const DEFAULT_GAS_MARGIN: u64 = 100_000;

/// 編譯產物：`<name>.abi`（JSON）與 `<name>.bin`（hex bytecode）
#[derive(Debug, Clone)]
pub struct ContractArtifact {
    pub abi: Value,
    pub bytecode: Bytes,
}

impl ContractArtifact {
    pub async fn load(dir: &Path, contract_name: &str) -> Result<Self> {
        let abi_path = dir.join(format!("{}.abi", contract_name));
        let bin_path = dir.join(format!("{}.bin", contract_name));

        if !abi_path.is_file() || !bin_path.is_file() {
            let available = list_files(dir).await;
            return Err(DonlyError::contract(format!(
                "contract files for {} not found in {}. Available files: [{}]",
                contract_name,
                dir.display(),
                available.join(", ")
            )));
        }

        let abi: Value = serde_json::from_str(&fs::read_to_string(&abi_path).await?)?;
        let bytecode = parse_bytecode(&fs::read_to_string(&bin_path).await?)?;
        Ok(Self { abi, bytecode })
    }
}

async fn list_files(dir: &Path) -> Vec<String> {
    let mut names = Vec::new();
    if let Ok(mut entries) = fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    names
}

/// 接受有或沒有 `0x` 前綴的 hex，忽略前後空白
pub fn parse_bytecode(raw: &str) -> Result<Bytes> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    if digits.is_empty() {
        return Err(DonlyError::contract("bytecode is empty"));
    }
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| DonlyError::contract(format!("invalid bytecode hex: {}", e)))
}

#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub artifacts_dir: PathBuf,
    pub contract_name: String,
    pub output_path: PathBuf,
    pub gas_price_wei: u64,
    pub gas_margin: u64,
    pub receipt_timeout: Duration,
    pub receipt_poll_interval: Duration,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            artifacts_dir: PathBuf::from("/output"),
            contract_name: "DonationContract".to_string(),
            output_path: PathBuf::from("/output/deployment.json"),
            gas_price_wei: DEFAULT_GAS_PRICE_WEI,
            gas_margin: DEFAULT_GAS_MARGIN,
            receipt_timeout: Duration::from_secs(120),
            receipt_poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentInfo {
    pub address: Address,
    pub abi: Value,
    pub deployer: Address,
    pub timestamp: String,
    pub transaction_hash: B256,
    pub block_number: Option<u64>,
    pub chain_id: u64,
}

pub struct ContractDeployer {
    chain: Arc<dyn ChainClient>,
    config: DeployConfig,
}

impl ContractDeployer {
    pub fn new(chain: Arc<dyn ChainClient>, config: DeployConfig) -> Self {
        Self { chain, config }
    }

    pub async fn deploy(&self) -> Result<DeploymentInfo> {
        let accounts = self.chain.accounts().await?;
        info!("Available accounts: {:?}", accounts);
        let deployer = *accounts
            .first()
            .ok_or_else(|| DonlyError::contract("no accounts available"))?;
        info!("🔑 Deploying from account {}", deployer);

        let artifact =
            ContractArtifact::load(&self.config.artifacts_dir, &self.config.contract_name).await?;
        debug!("Loaded {} bytes of bytecode", artifact.bytecode.len());

        let chain_id = self.chain.chain_id().await?;

        let estimate_tx = TransactionRequest {
            from: deployer,
            data: Some(artifact.bytecode.clone()),
            ..Default::default()
        };
        let estimated = self.chain.estimate_gas(&estimate_tx).await?;
        let gas = estimated.saturating_add(self.config.gas_margin);
        info!("⛽ Estimated gas {}, sending with {}", estimated, gas);

        let tx = TransactionRequest {
            gas: Some(U64::from(gas)),
            gas_price: Some(U256::from(self.config.gas_price_wei)),
            ..estimate_tx
        };
        let tx_hash = self.chain.send_transaction(&tx).await?;
        info!("📤 Deployment transaction sent: {:#x}", tx_hash);

        let receipt = self.wait_for_receipt(tx_hash).await?;
        if !receipt.succeeded() {
            return Err(DonlyError::contract(format!(
                "deployment reverted in transaction {:#x}",
                tx_hash
            )));
        }
        let address = receipt.contract_address.ok_or_else(|| {
            DonlyError::contract("receipt does not contain a contract address")
        })?;
        info!("✅ Contract deployed at {}", address);

        let deployment = DeploymentInfo {
            address,
            abi: artifact.abi,
            deployer,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            transaction_hash: tx_hash,
            block_number: receipt.block_number.map(|n| n.to::<u64>()),
            chain_id,
        };
        self.write_output(&deployment).await?;
        Ok(deployment)
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TransactionReceipt> {
        let poll = async {
            loop {
                if let Some(receipt) = self.chain.transaction_receipt(tx_hash).await? {
                    return Ok::<_, DonlyError>(receipt);
                }
                tokio::time::sleep(self.config.receipt_poll_interval).await;
            }
        };
        tokio::time::timeout(self.config.receipt_timeout, poll)
            .await
            .map_err(|_| {
                DonlyError::contract(format!(
                    "timed out after {:?} waiting for receipt of {:#x}",
                    self.config.receipt_timeout, tx_hash
                ))
            })?
    }

    async fn write_output(&self, deployment: &DeploymentInfo) -> Result<()> {
        let path = &self.config.output_path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::write(path, serde_json::to_string_pretty(deployment)?).await?;
        info!("💾 Deployment info saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bytecode() {
        assert_eq!(parse_bytecode("6080\n").unwrap().as_ref(), &[0x60, 0x80]);
        assert_eq!(parse_bytecode(" 0x6080 ").unwrap().as_ref(), &[0x60, 0x80]);
        assert!(parse_bytecode("").is_err());
        assert!(parse_bytecode("0xzz").is_err());
    }

    #[tokio::test]
    async fn test_missing_artifacts_lists_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Other.abi"), "[]").unwrap();
        std::fs::write(dir.path().join("DonationContract.abi"), "[]").unwrap();

        let err = ContractArtifact::load(dir.path(), "DonationContract")
            .await
            .unwrap_err()
            .to_string();
        assert!(err.contains("DonationContract.abi, Other.abi"), "{}", err);
    }

    #[tokio::test]
    async fn test_load_artifact() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("C.abi"), r#"[{"type":"constructor"}]"#).unwrap();
        std::fs::write(dir.path().join("C.bin"), "600a").unwrap();
        let artifact = ContractArtifact::load(dir.path(), "C").await.unwrap();
        assert_eq!(artifact.abi[0]["type"], "constructor");
        assert_eq!(artifact.bytecode.len(), 2);
    }
}
