use alloy::primitives::{TxHash, B256};
use thiserror::Error;

use crate::events::MarketId;
use crate::state::Phase;

/// Boxed cause from alloy / reqwest, kept as the error source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A creation log that could not be turned into a `MarketCreated`.
#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("log has no topics")]
    MissingSignature,
    #[error("unexpected event signature {0}")]
    WrongSignature(B256),
    #[error("log has no indexed market id")]
    MissingMarketId,
}

/// Items yielded by an event source besides a decoded event.
#[derive(Error, Debug)]
pub enum SourceError {
    /// One bad log. Dropped, the source keeps going.
    #[error("undecodable market creation event: {0}")]
    Discovery(#[from] DiscoveryError),
    /// The source can no longer deliver events.
    #[error("event source failed: {0}")]
    Transport(String),
}

#[derive(Error, Debug)]
pub enum DetailFetchError {
    #[error("market details call failed: {0}")]
    Call(#[source] BoxError),
    #[error("inconsistent market details: {0}")]
    Inconsistent(String),
}

#[derive(Error, Debug)]
pub enum ClockError {
    #[error("failed to read latest block: {0}")]
    Rpc(#[source] BoxError),
    #[error("node returned no latest block")]
    MissingBlock,
}

/// Hard oracle failure. An answer that is merely unclear is a
/// `Verdict::Indeterminate`, not an error.
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("oracle response malformed: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum SubmissionError {
    #[error("nonce allocation failed: {0}")]
    Nonce(#[source] BoxError),
    #[error("{call} broadcast failed: {source}")]
    Broadcast {
        call: &'static str,
        #[source]
        source: BoxError,
    },
    #[error("resolve {resolve_tx} was sent but distribute failed: {source}")]
    DistributeFailed {
        resolve_tx: TxHash,
        #[source]
        source: BoxError,
    },
    #[error("receipt for resolve {tx} unavailable: {source}")]
    Receipt {
        tx: TxHash,
        #[source]
        source: BoxError,
    },
    #[error("resolve {tx} reverted")]
    Reverted { tx: TxHash },
}

#[derive(Error, Debug)]
pub enum PhaseError {
    #[error("market {0} is not tracked")]
    Unknown(MarketId),
    #[error("market {id} cannot move from {from} to {to}")]
    Backward { id: MarketId, from: Phase, to: Phase },
    #[error("market {id} is already {phase}")]
    Terminal { id: MarketId, phase: Phase },
}

/// Why a lifecycle ended in `Failed`.
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error(transparent)]
    DetailFetch(#[from] DetailFetchError),
    #[error("deadline scheduling failed: {0}")]
    Clock(#[from] ClockError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error("oracle answer was indeterminate and policy is to fail")]
    Indeterminate,
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error(transparent)]
    Phase(#[from] PhaseError),
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("event source failed: {0}")]
    EventSource(String),
}
