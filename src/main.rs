use alloy::network::EthereumWallet;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use keeper_rs::api::LlmOracle;
use keeper_rs::chain::{ChainReader, ChainSubmitter, NonceAllocator};
use keeper_rs::config::Config;
use keeper_rs::feeds::{FactoryFeed, FeedItem};
use keeper_rs::keeper::Coordinator;
use keeper_rs::state::MarketRegistry;
use keeper_rs::telemetry;

const DEFAULT_CONFIG: &str = "keeper.toml";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let from_file = Path::new(&path).exists();
    let cfg = if from_file {
        Config::load(Path::new(&path))?
    } else {
        Config::from_env()
    };

    telemetry::init(&cfg.general);
    if !from_file {
        info!(path = %path, "no config file found, using env-only config");
    }
    cfg.validate()?;

    let signer = PrivateKeySigner::from_str(cfg.private_key()?).context("invalid keeper private key")?;
    let keeper = signer.address();
    let factory = cfg.factory_address()?;

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect(cfg.rpc_url()?)
        .await
        .context("failed to connect to RPC")?
        .erased();
    let chain_id = provider.get_chain_id().await.context("failed to read chain id")?;
    info!(keeper = %keeper, factory = %factory, chain_id, "keeper v{} starting", env!("CARGO_PKG_VERSION"));

    // Collaborators
    let reader = Arc::new(ChainReader::new(provider.clone(), factory));
    let submitter = Arc::new(
        ChainSubmitter::new(provider, keeper, Arc::new(NonceAllocator::new()))
            .await_resolve_receipt(cfg.keeper.await_resolve_receipt),
    );
    let oracle = Arc::new(LlmOracle::new(&cfg.oracle)?);
    if cfg.oracle.api_key.is_empty() {
        warn!("no oracle API key configured (OPENAI_API_KEY)");
    }

    // Factory event feed
    let (tx, rx) = mpsc::channel::<FeedItem>(100);
    let feed = FactoryFeed::new(cfg.ws_url()?.to_string(), factory)
        .reconnect_delay(Duration::from_secs(cfg.chain.reconnect_delay_secs))
        .max_consecutive_failures(cfg.chain.max_consecutive_failures)
        .spawn(tx);

    let coordinator = Coordinator::new(reader.clone(), reader, oracle, submitter, cfg.coordinator_settings());
    let summary = spawn_summary(
        coordinator.registry(),
        Duration::from_secs(cfg.resolution.summary_interval_secs),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    let result = coordinator.run(rx, shutdown_rx).await;
    feed.abort();
    summary.abort();

    match result {
        Ok(report) => {
            info!(?report, "keeper stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "keeper stopped");
            Err(e.into())
        }
    }
}

/// Log how many markets sit in each phase, so stuck or failed ones show up.
fn spawn_summary(registry: MarketRegistry, every: Duration) -> JoinHandle<()> {
    let every = every.max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick fires immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let counts = registry.phase_counts().await;
            let phases = counts
                .iter()
                .map(|(phase, n)| format!("{phase}={n}"))
                .collect::<Vec<_>>()
                .join(" ");
            info!(tracked = counts.values().sum::<usize>(), phases = %phases, "registry summary");
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {}", e);
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
}
