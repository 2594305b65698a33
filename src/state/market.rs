use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use std::fmt;

use crate::error::PhaseError;
use crate::events::MarketId;
use crate::keeper::Submission;

/// Where a market is in its lifecycle. Declaration order is the only
/// allowed direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Discovered,
    DetailsFetched,
    AwaitingDeadline,
    AwaitingOracle,
    Resolving,
    Resolved,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Resolved | Phase::Failed)
    }

    pub const ALL: [Phase; 7] = [
        Phase::Discovered,
        Phase::DetailsFetched,
        Phase::AwaitingDeadline,
        Phase::AwaitingOracle,
        Phase::Resolving,
        Phase::Resolved,
        Phase::Failed,
    ];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Discovered => write!(f, "DISCOVERED"),
            Phase::DetailsFetched => write!(f, "DETAILS_FETCHED"),
            Phase::AwaitingDeadline => write!(f, "AWAITING_DEADLINE"),
            Phase::AwaitingOracle => write!(f, "AWAITING_ORACLE"),
            Phase::Resolving => write!(f, "RESOLVING"),
            Phase::Resolved => write!(f, "RESOLVED"),
            Phase::Failed => write!(f, "FAILED"),
        }
    }
}

/// Immutable market metadata read from the factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDetails {
    /// The market's own contract (target of resolve/distribute).
    pub contract_address: Address,
    pub question: String,
    /// Chain time (unix seconds) after which resolution is allowed.
    pub deadline: u64,
}

/// Working state for one tracked market.
#[derive(Debug, Clone)]
pub struct MarketRecord {
    pub id: MarketId,
    pub contract_address: Option<Address>,
    pub question: Option<String>,
    pub deadline: Option<u64>,
    pub phase: Phase,
    /// Only set in `Failed`.
    pub last_error: Option<String>,
    /// Only set in `Resolved`.
    pub submission: Option<Submission>,
    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MarketRecord {
    pub fn new(id: MarketId) -> Self {
        let now = Utc::now();
        Self {
            id,
            contract_address: None,
            question: None,
            deadline: None,
            phase: Phase::Discovered,
            last_error: None,
            submission: None,
            discovered_at: now,
            updated_at: now,
        }
    }

    /// Move to `next`. Rejects repeats, reversals and anything after a
    /// terminal phase.
    pub fn advance(&mut self, next: Phase) -> Result<Phase, PhaseError> {
        let from = self.phase;
        if from.is_terminal() {
            return Err(PhaseError::Terminal { id: self.id, phase: from });
        }
        if next <= from {
            return Err(PhaseError::Backward { id: self.id, from, to: next });
        }
        self.phase = next;
        self.updated_at = Utc::now();
        Ok(from)
    }

    /// Populate details and move to `DetailsFetched`. Details are set once.
    pub fn set_details(&mut self, details: &MarketDetails) -> Result<Phase, PhaseError> {
        let from = self.advance(Phase::DetailsFetched)?;
        self.contract_address = Some(details.contract_address);
        self.question = Some(details.question.clone());
        self.deadline = Some(details.deadline);
        Ok(from)
    }

    pub fn fail(&mut self, error: String) -> Result<Phase, PhaseError> {
        let from = self.advance(Phase::Failed)?;
        self.last_error = Some(error);
        Ok(from)
    }

    pub fn resolve(&mut self, submission: Submission) -> Result<Phase, PhaseError> {
        let from = self.advance(Phase::Resolved)?;
        self.submission = Some(submission);
        Ok(from)
    }
}
