use alloy::primitives::{TxHash, U256};
use chrono::{DateTime, Utc};
use std::fmt;

use crate::state::Phase;

/// Market identifier assigned by the factory contract (uint256 on chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarketId(pub U256);

impl MarketId {
    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl From<u64> for MarketId {
    fn from(id: u64) -> Self {
        MarketId(U256::from(id))
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A decoded `MarketCreated` log from the factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketCreated {
    pub market_id: MarketId,
    /// Block the log was mined in, when the node reports it.
    pub block_number: Option<u64>,
    pub tx_hash: Option<TxHash>,
}

impl MarketCreated {
    pub fn new(market_id: impl Into<MarketId>) -> Self {
        Self {
            market_id: market_id.into(),
            block_number: None,
            tx_hash: None,
        }
    }
}

/// Progress report for one market, emitted on every phase change.
#[derive(Debug, Clone)]
pub struct StatusEvent {
    pub market_id: MarketId,
    pub phase: Phase,
    /// Error text for `Failed`, tx hash for `Resolved`, otherwise a short note.
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(market_id: MarketId, phase: Phase, detail: Option<String>) -> Self {
        Self {
            market_id,
            phase,
            detail,
            at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }
}
