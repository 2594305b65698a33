use alloy::network::ReceiptResponse;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chain::contracts::IMarket;
use crate::chain::NonceAllocator;
use crate::error::SubmissionError;
use crate::keeper::{OutcomeCode, Submission, Submitter};

/// Signs and broadcasts resolve + distribute from the keeper wallet.
///
/// `provider` must carry the keeper's wallet filler; nonces are set here
/// explicitly from the shared allocator, so the provider's nonce filler
/// never runs for these calls.
pub struct ChainSubmitter {
    provider: DynProvider,
    keeper: Address,
    nonces: Arc<NonceAllocator>,
    await_resolve_receipt: bool,
}

/// Nonces for one resolve/distribute submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoncePair {
    pub resolve: u64,
    pub distribute: u64,
}

impl ChainSubmitter {
    pub fn new(provider: DynProvider, keeper: Address, nonces: Arc<NonceAllocator>) -> Self {
        Self {
            provider,
            keeper,
            nonces,
            await_resolve_receipt: false,
        }
    }

    /// Wait for resolve to be mined successfully before sending distribute.
    pub fn await_resolve_receipt(mut self, wait: bool) -> Self {
        self.await_resolve_receipt = wait;
        self
    }
}

/// Reserve a consecutive pair and run `send` with it while holding the
/// allocator. Other submissions wait until `send` returns. On failure the
/// counter is reset so the next submission re-reads the pending count.
pub(crate) async fn send_with_nonces<F, Fut, E, S, SFut, T>(
    nonces: &NonceAllocator,
    fetch: F,
    send: S,
) -> Result<T, SubmissionError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<u64, E>>,
    E: std::error::Error + Send + Sync + 'static,
    S: FnOnce(NoncePair) -> SFut,
    SFut: Future<Output = Result<T, SubmissionError>>,
{
    let mut lease = nonces.lease().await;
    let first = lease
        .reserve(2, fetch)
        .await
        .map_err(|e| SubmissionError::Nonce(Box::new(e)))?;

    let result = send(NoncePair {
        resolve: first,
        distribute: first + 1,
    })
    .await;
    if result.is_err() {
        lease.reset();
    }
    result
}

#[async_trait]
impl Submitter for ChainSubmitter {
    async fn submit(&self, contract: Address, code: OutcomeCode) -> Result<Submission, SubmissionError> {
        let market = IMarket::new(contract, self.provider.clone());
        let provider = self.provider.clone();
        let keeper = self.keeper;

        let fetch = move || async move { provider.get_transaction_count(keeper).pending().await };
        send_with_nonces(&self.nonces, fetch, |nonces| self.send_pair(&market, code, nonces)).await
    }
}

impl ChainSubmitter {
    /// Broadcast resolve then distribute with the given nonces.
    async fn send_pair(
        &self,
        market: &IMarket::IMarketInstance<DynProvider>,
        code: OutcomeCode,
        nonces: NoncePair,
    ) -> Result<Submission, SubmissionError> {
        let contract = *market.address();
        let resolve = market
            .resolve(code.as_u8())
            .nonce(nonces.resolve)
            .send()
            .await
            .map_err(|e| SubmissionError::Broadcast {
                call: "resolve",
                source: Box::new(e),
            })?;
        let resolve_tx = *resolve.tx_hash();
        info!(contract = %contract, code = code.as_u8(), nonce = nonces.resolve, tx = %resolve_tx, "resolve sent");

        if self.await_resolve_receipt {
            let receipt = resolve.get_receipt().await.map_err(|e| SubmissionError::Receipt {
                tx: resolve_tx,
                source: Box::new(e),
            })?;
            if !receipt.status() {
                warn!(contract = %contract, tx = %resolve_tx, "resolve reverted, not distributing");
                return Err(SubmissionError::Reverted { tx: resolve_tx });
            }
        }

        let distribute = market
            .distribute()
            .nonce(nonces.distribute)
            .send()
            .await
            .map_err(|e| SubmissionError::DistributeFailed {
                resolve_tx,
                source: Box::new(e),
            })?;
        let distribute_tx = *distribute.tx_hash();
        info!(contract = %contract, nonce = nonces.distribute, tx = %distribute_tx, "distribute sent");

        Ok(Submission {
            resolve_tx,
            distribute_tx,
        })
    }
}
