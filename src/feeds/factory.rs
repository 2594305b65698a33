use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use futures_util::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::chain::contracts::IMarketFactory::MarketCreated as MarketCreatedLog;
use crate::error::{DiscoveryError, SourceError};
use crate::events::{MarketCreated, MarketId};

/// What the feed pushes to the coordinator.
pub type FeedItem = Result<MarketCreated, SourceError>;

/// Live `MarketCreated` subscription on the factory contract.
///
/// Reconnects after a dropped or failed session. After
/// `max_consecutive_failures` sessions in a row fail to subscribe, it sends
/// `SourceError::Transport` and stops. Forward-only: logs emitted while
/// disconnected are not backfilled.
pub struct FactoryFeed {
    ws_url: String,
    factory: Address,
    reconnect_delay: Duration,
    max_consecutive_failures: u32,
}

enum SessionEnd {
    /// The node closed the subscription.
    StreamClosed,
    /// Nobody is listening anymore.
    ReceiverClosed,
}

impl FactoryFeed {
    pub fn new(ws_url: String, factory: Address) -> Self {
        Self {
            ws_url,
            factory,
            reconnect_delay: Duration::from_secs(5),
            max_consecutive_failures: 10,
        }
    }

    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn max_consecutive_failures(mut self, max: u32) -> Self {
        self.max_consecutive_failures = max.max(1);
        self
    }

    /// Spawns the subscription loop. Returns immediately.
    pub fn spawn(self, tx: mpsc::Sender<FeedItem>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run_forever(tx).await })
    }

    async fn run_forever(&self, tx: mpsc::Sender<FeedItem>) {
        let mut failures: u32 = 0;

        loop {
            info!(url = %self.ws_url, factory = %self.factory, "connecting to factory log stream");

            match self.run_session(&tx, &mut failures).await {
                Ok(SessionEnd::ReceiverClosed) => {
                    info!("coordinator gone, stopping factory feed");
                    return;
                }
                Ok(SessionEnd::StreamClosed) => {
                    warn!("factory log stream closed by node");
                }
                Err(e) => {
                    failures += 1;
                    error!(error = %e, failures, "factory log session failed");
                    if failures >= self.max_consecutive_failures {
                        let reason = format!("giving up after {failures} failed sessions: {e}");
                        let _ = tx.send(Err(SourceError::Transport(reason))).await;
                        return;
                    }
                }
            }

            if tx.is_closed() {
                return;
            }
            warn!(delay_secs = self.reconnect_delay.as_secs(), "reconnecting to factory log stream");
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    /// One connection: subscribe and forward decoded logs until the stream
    /// ends. `failures` is cleared once the subscription is live.
    async fn run_session(&self, tx: &mpsc::Sender<FeedItem>, failures: &mut u32) -> anyhow::Result<SessionEnd> {
        let provider = ProviderBuilder::new()
            .connect_ws(WsConnect::new(self.ws_url.as_str()))
            .await?;

        let filter = Filter::new()
            .address(self.factory)
            .event_signature(MarketCreatedLog::SIGNATURE_HASH);
        let subscription = provider.subscribe_logs(&filter).await?;
        *failures = 0;
        info!("subscribed to MarketCreated");

        let mut stream = subscription.into_stream();
        while let Some(log) = stream.next().await {
            if log.removed {
                debug!(block = ?log.block_number, "skipping removed log");
                continue;
            }
            let item = decode_market_created(&log).map_err(SourceError::from);
            if let Ok(event) = &item {
                info!(market = %event.market_id, block = ?event.block_number, "MarketCreated");
            }
            if tx.send(item).await.is_err() {
                return Ok(SessionEnd::ReceiverClosed);
            }
        }

        Ok(SessionEnd::StreamClosed)
    }
}

/// Read the indexed market id out of a `MarketCreated` log.
pub fn decode_market_created(log: &Log) -> Result<MarketCreated, DiscoveryError> {
    let topic0 = log.topic0().ok_or(DiscoveryError::MissingSignature)?;
    if *topic0 != MarketCreatedLog::SIGNATURE_HASH {
        return Err(DiscoveryError::WrongSignature(*topic0));
    }
    let id_topic = log.topics().get(1).ok_or(DiscoveryError::MissingMarketId)?;

    Ok(MarketCreated {
        market_id: MarketId(U256::from_be_bytes(id_topic.0)),
        block_number: log.block_number,
        tx_hash: log.transaction_hash,
    })
}
