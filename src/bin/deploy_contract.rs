use anyhow::Context;
use clap::Parser;
use donly::adapters::JsonRpcClient;
use donly::config::DeployArgs;
use donly::core::ContractDeployer;
use donly::utils::{logger, validation::Validate};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = DeployArgs::parse();
    logger::init_cli_logger(args.verbose);

    tracing::info!("🚀 Deploying {} via {}", args.contract_name, args.rpc_url);

    if let Err(e) = args.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(e.exit_code());
    }

    let client = JsonRpcClient::new(&args.rpc_url).context("failed to build RPC client")?;
    let deployer = ContractDeployer::new(Arc::new(client), args.to_deploy_config());

    match deployer.deploy().await {
        Ok(deployment) => {
            println!("✅ Contract deployed at {}", deployment.address);
            println!("🧾 Transaction: {:#x}", deployment.transaction_hash);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                "❌ Deployment failed: {} (Category: {:?})",
                e,
                e.category()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(e.exit_code());
        }
    }
}
