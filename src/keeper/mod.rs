//! Market lifecycle coordination.
//!
//! The coordinator takes creation events from an [`EventSource`] and runs one
//! lifecycle task per new market: fetch details, wait for the deadline in
//! chain time, ask the oracle, submit resolve + distribute. Collaborators are
//! injected as trait objects so the live chain/oracle adapters and test fakes
//! plug in the same way.

mod coordinator;
mod lifecycle;
mod resolution;
mod scheduler;

pub use coordinator::{Coordinator, CoordinatorSettings, RunReport};
pub use resolution::{IndeterminatePolicy, OutcomeCode, Submission, Verdict};
pub use scheduler::DeadlineScheduler;

use alloy::primitives::Address;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{ClockError, DetailFetchError, OracleError, SourceError, SubmissionError};
use crate::events::{MarketCreated, MarketId};
use crate::state::MarketDetails;

/// Stream of market creation notifications.
#[async_trait]
pub trait EventSource: Send {
    /// Next event. `Ok(None)` means the stream ended cleanly.
    ///
    /// Must be cancel safe: the coordinator races it against shutdown.
    async fn next_event(&mut self) -> Result<Option<MarketCreated>, SourceError>;
}

#[async_trait]
impl EventSource for mpsc::Receiver<Result<MarketCreated, SourceError>> {
    async fn next_event(&mut self) -> Result<Option<MarketCreated>, SourceError> {
        match self.recv().await {
            Some(Ok(event)) => Ok(Some(event)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }
}

#[async_trait]
pub trait DetailFetcher: Send + Sync {
    async fn fetch(&self, id: MarketId) -> Result<MarketDetails, DetailFetchError>;
}

/// Source of chain time (latest block timestamp, unix seconds).
#[async_trait]
pub trait ChainClock: Send + Sync {
    async fn now(&self) -> Result<u64, ClockError>;
}

#[async_trait]
pub trait Oracle: Send + Sync {
    async fn ask(&self, question: &str) -> Result<Verdict, OracleError>;
}

/// Sends `resolve(code)` then `distribute()` to a market contract.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, contract: Address, code: OutcomeCode) -> Result<Submission, SubmissionError>;
}
