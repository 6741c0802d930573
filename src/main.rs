use clap::Parser;
use donly::adapters::{BroadcastEventBus, JsonRpcClient, LocalStorage, SqliteStore};
use donly::auth::{InitDataVerifier, JwtService};
use donly::config::{GatewayArgs, GatewayConfig, StorageBackend};
use donly::core::{
    ChainMonitor, DonationService, MonitorConfig, StaticService, UserService, WishService,
};
use donly::domain::ports::{ChainClient, FileStorage};
use donly::utils::{logger, validation::Validate};
use donly::{AppState, DonlyError, Result};
use std::sync::Arc;
use tokio::sync::watch;

#[tokio::main]
async fn main() {
    let args = GatewayArgs::parse();
    logger::init_logger(args.verbose, args.json_logs);

    if let Err(e) = run(args).await {
        tracing::error!("❌ Gateway failed: {} (Category: {:?})", e, e.category());
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());
        std::process::exit(e.exit_code());
    }
}

async fn run(args: GatewayArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => {
            tracing::info!("📄 Loading config from {}", path.display());
            GatewayConfig::from_file(path)?
        }
        None => GatewayConfig::from_env()?,
    };
    config.validate()?;
    tracing::debug!("Gateway config: {:?}", config.server);

    let store = Arc::new(SqliteStore::open(&config.database.path)?);
    tracing::info!("🗄️  Database ready at {}", config.database.path);

    let storage = build_storage(&config).await?;
    let bus = Arc::new(BroadcastEventBus::default());

    let files_base = config.static_files.base_url.clone();
    let users = Arc::new(UserService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        files_base.clone(),
    ));
    let wishes = Arc::new(WishService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        files_base,
    ));
    let statics = Arc::new(StaticService::new(store.clone(), storage));
    let donations = Arc::new(DonationService::new(store.clone(), store.clone(), bus));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let monitor = match config.contract_address()? {
        Some(contract) => {
            let chain: Arc<dyn ChainClient> =
                Arc::new(JsonRpcClient::new(&config.blockchain.rpc_url)?);
            check_chain(chain.as_ref(), &config, contract).await;

            let monitor = ChainMonitor::new(
                chain,
                store.clone(),
                store.clone(),
                donations.clone(),
                MonitorConfig {
                    contract,
                    poll_interval: config.poll_interval(),
                    max_block_range: config.blockchain.max_block_range,
                },
            );
            Some(tokio::spawn(monitor.run(shutdown_rx)))
        }
        None => {
            tracing::warn!("⚠️  No contract address configured, chain monitor disabled");
            None
        }
    };

    let state = AppState {
        users,
        wishes,
        statics,
        donations,
        jwt: Arc::new(JwtService::new(&config.auth.jwt_secret)),
        verifier: Arc::new(InitDataVerifier::new(
            config.telegram.bot_token.clone(),
            config.telegram.init_data_max_age_secs,
        )),
        session_ttl_secs: config.auth.session_ttl_secs,
    };
    let app = donly::router(state, &config.server);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!("🚀 Donly gateway listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = monitor {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("❌ Chain monitor exited with error: {}", e),
            Err(e) => tracing::error!("❌ Chain monitor task panicked: {}", e),
        }
    }
    tracing::info!("👋 Gateway stopped");
    Ok(())
}

async fn build_storage(config: &GatewayConfig) -> Result<Arc<dyn FileStorage>> {
    match config.storage.backend {
        StorageBackend::Local => {
            tracing::info!("📁 Storing images under {}", config.storage.local_path);
            Ok(Arc::new(LocalStorage::new(&config.storage.local_path)))
        }
        #[cfg(feature = "s3")]
        StorageBackend::S3 => {
            let s3 = config
                .storage
                .s3
                .as_ref()
                .ok_or_else(|| DonlyError::MissingConfigError {
                    field: "storage.s3".to_string(),
                })?;
            tracing::info!("☁️  Storing images in bucket {}", s3.bucket);
            Ok(Arc::new(donly::adapters::S3Storage::connect(s3).await?))
        }
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(DonlyError::ConfigError {
            message: "storage.backend = \"s3\" requires building with the `s3` feature"
                .to_string(),
        }),
    }
}

/// 啟動前檢查節點；失敗只記錄警告
async fn check_chain(
    chain: &dyn ChainClient,
    config: &GatewayConfig,
    contract: alloy_primitives::Address,
) {
    match chain.chain_id().await {
        Ok(id) if id == config.blockchain.chain_id => {
            tracing::info!("🔗 Connected to chain {}", id)
        }
        Ok(id) => tracing::warn!(
            "⚠️  Node reports chain id {}, expected {}",
            id,
            config.blockchain.chain_id
        ),
        Err(e) => tracing::warn!("⚠️  Could not query chain id: {}", e),
    }
    match chain.get_code(contract).await {
        Ok(code) if code.is_empty() => {
            tracing::warn!("⚠️  No contract code at {}", contract)
        }
        Ok(_) => tracing::info!("📜 Contract found at {}", contract),
        Err(e) => tracing::warn!("⚠️  Could not fetch contract code: {}", e),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("🛑 Shutdown signal received");
}
