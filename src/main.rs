// Game Wager Backend Server
// HTTP API over the escrow contract + optional event indexer

use anyhow::Result;
use gamechain_backend::auth::JwtVerifier;
use gamechain_backend::chain::JsonRpcClient;
use gamechain_backend::config::{Config, LogFormat};
use gamechain_backend::escrow::{ContractBootstrap, RpcConnector};
use gamechain_backend::indexer::{Indexer, WagerIndex};
use gamechain_backend::AppState;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gamechain_backend=info,tower_http=info"));
    match config.log_format {
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_target(false)
            .with_level(true)
            .with_env_filter(filter)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }

    info!("Starting Game Wager Backend");

    info!("Configuration:");
    info!("  Ethereum node: {}", config.node_url);
    info!(
        "  Contract: {}",
        config
            .contract_address
            .as_deref()
            .unwrap_or("(from deployment manifest)")
    );
    info!("  Deployment manifest: {}", config.manifest_path.display());
    info!("  Indexer: {}", if config.indexer_enabled { "enabled" } else { "disabled" });
    info!("  Server Port: {}", config.port);

    let rpc = Arc::new(JsonRpcClient::new(config.node_url.clone(), config.rpc_timeout)?);
    let connector = RpcConnector::new(
        rpc,
        config.contract_address.clone(),
        config.manifest_path.clone(),
        config.confirm_timeout,
    );
    let bootstrap = Arc::new(ContractBootstrap::new(Box::new(connector)));

    // First attempt at startup; later requests retry when this fails
    match bootstrap.ensure_ready().await {
        Ok(contract) => info!("Escrow contract ready at {}", contract.address()),
        Err(e) if config.require_contract => {
            anyhow::bail!("Contract initialization failed: {}", e)
        }
        Err(e) => warn!("Contract initialization failed, will retry on demand: {}", e),
    }

    let index = if config.indexer_enabled {
        let index = Arc::new(WagerIndex::new());
        let indexer = Indexer::new(bootstrap.clone(), index.clone(), config.indexer_poll_interval);
        tokio::spawn(async move { indexer.run().await });
        Some(index)
    } else {
        None
    };

    let state = Arc::new(AppState {
        bootstrap,
        index,
        jwt: JwtVerifier::new(&config.jwt_secret),
    });
    let app = gamechain_backend::router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Game Wager Backend listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
